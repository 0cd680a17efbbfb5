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

//! The outbound call path.
//!
//! A [Transport] sends one [Request] and returns the [Response]. The raw
//! transport (see the `stratus-gax-internal` crate) makes the network call,
//! the types in this module decorate it:
//!
//! * [BackoffTransport] retries connection failures and transient status
//!   codes with exponential backoff.
//! * [RateLimitedTransport] caps the rate of requests.
//!
//! The decorators are composed as `RateLimitedTransport -> BackoffTransport ->
//! raw transport`, [TransportExt] makes this convenient:
//!
//! ```
//! # use stratus_gax::transport::*;
//! # fn sample(raw: impl Transport) -> anyhow::Result<()> {
//! let transport = raw
//!     .with_backoff(BackoffTransport::builder().with_max_attempts(3))?
//!     .with_rate_limit(RateLimitSpec::new(20).with_burst(5))?;
//! # Ok(()) }
//! ```

use crate::Result;

mod backoff;
pub mod rate_limit;
mod request;
mod response;

pub use backoff::{BackoffTransport, BackoffTransportBuilder};
pub use rate_limit::{RateLimitSpec, RateLimitedTransport, RateLimiter};
pub use request::{Body, Request};
pub use response::Response;

/// Sends requests to the service.
///
/// Implementations return `Err` only when no complete response was received,
/// every HTTP status code, successful or not, is returned as a [Response].
pub trait Transport: Send + Sync + std::fmt::Debug {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Extension trait to compose [Transport] decorators.
pub trait TransportExt: Transport + Sized {
    /// Retries transient failures from this transport.
    fn with_backoff(
        self,
        builder: BackoffTransportBuilder,
    ) -> std::result::Result<BackoffTransport<Self>, crate::exponential_backoff::Error> {
        builder.build(self)
    }

    /// Limits the rate of requests sent through this transport.
    fn with_rate_limit(
        self,
        spec: RateLimitSpec,
    ) -> std::result::Result<RateLimitedTransport<Self>, rate_limit::Error> {
        RateLimitedTransport::new(self, spec)
    }
}

impl<T: Transport> TransportExt for T {}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        self.as_ref().send(request)
    }
}
