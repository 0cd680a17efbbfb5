// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stratus API helpers.
//!
//! This crate contains the types and functions that make calls to the Stratus
//! infrastructure API reliable: errors, retry and backoff policies, the
//! retrying and rate-limiting transports, and a generic polling loop.
//!
//! Most operations in the Stratus API are asynchronous: creating, resizing, or
//! powering a resource returns immediately, and the provider completes the
//! work in the background. The [polling] module provides the loop used to
//! wait for such work, the `stratus-waiter` crate specializes it to resource
//! states.
//!
//! # Example
//! ```
//! # use stratus_gax::transport::*;
//! # use std::time::Duration;
//! # async fn sample(raw: impl Transport + 'static) -> anyhow::Result<()> {
//! let transport = raw
//!     .with_backoff(
//!         BackoffTransport::builder()
//!             .with_max_attempts(5)
//!             .with_wait_min(Duration::from_millis(500))
//!             .with_wait_max(Duration::from_secs(10)),
//!     )?
//!     .with_rate_limit(RateLimitSpec::new(10))?;
//! let response = transport
//!     .send(Request::new(http::Method::GET, "/v1/servers/s-123"))
//!     .await?
//!     .error_for_status()?;
//! println!("{:?}", response.json::<serde_json::Value>()?);
//! # Ok(()) }
//! ```

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions making calls to the service.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types.
pub mod error;

pub mod backoff_policy;
pub mod exponential_backoff;
pub mod polling;
pub mod retry_loop_internal;
pub mod retry_policy;
pub mod retry_result;
pub mod transport;
