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

//! Wait for Stratus resources to reach a desired state.
//!
//! Creating a server, attaching a volume, or powering an instance on returns
//! before the work is done. The provider then moves the resource through a
//! series of transitional states. This crate polls a resource until it
//! reaches one of the states the caller wants, fails, or takes too long.
//!
//! The caller provides a `read` function, typically a `GET` request sent
//! through a rate-limited, retrying transport, and a [WaiterSpec] with the
//! target and pending states.
//!
//! # Example
//! ```
//! # use stratus_waiter::*;
//! # use stratus_waiter::state::*;
//! # use gax::transport::{Request, Transport};
//! # async fn sample(transport: impl Transport) -> gax::Result<()> {
//! let transport = &transport;
//! let read = || async move {
//!     transport
//!         .send(Request::new(http::Method::GET, "/v1/servers/s-123"))
//!         .await?
//!         .error_for_status()?
//!         .json::<StateSnapshot>()
//! };
//! let server = wait(read, WaiterSpec::running()).await?;
//! println!("server is running: {server:?}");
//! # Ok(()) }
//! ```

pub mod options;
pub mod state;
mod waiter;

pub use options::WaiterSpec;
pub use state::{Availability, InstanceRuntimeStatus, ResourceState, StateSnapshot};
pub use waiter::{Waiter, wait};
