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

//! Errors returned by the Stratus client libraries.
//!
//! The client libraries distinguish between errors detected while trying to
//! send a request (e.g. cannot open a connection), errors trying to receive a
//! response (e.g. the connection is dropped before the full response), errors
//! returned by the service itself, and errors detected while waiting for a
//! resource to reach a desired state.
//!
//! # Examples
//!
//! ```
//! use stratus_gax::error::Error;
//! fn handle_error(e: Error) {
//!     if e.is_not_found() {
//!         println!("the resource does not exist (yet?): {e}");
//!     } else if e.is_timeout() {
//!         println!("gave up waiting: {e}");
//!     }
//! }
//! ```

mod core_error;
pub use core_error::*;
