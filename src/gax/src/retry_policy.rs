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

//! Defines traits for retry policies and some common implementations.
//!
//! The client libraries automatically retry requests when they fail due to
//! transient errors. The transport assumes that resending the same method,
//! URL, and body is safe; idempotency is the caller's responsibility.
//!
//! # Example
//! ```
//! # use stratus_gax::retry_policy::*;
//! // Retry connection failures, 423 (Locked), 503 (Unavailable), and 429 (Too
//! // Many Requests), with at most 6 attempts in total.
//! let policy = TransientErrors::new()
//!     .with_status_codes([423, 429, 503])
//!     .with_attempt_limit(6);
//! ```

use crate::error::Error;
use crate::retry_result::RetryResult;
use std::collections::BTreeSet;

/// The status codes retried by default: 423 (Locked) and 503 (Service
/// Unavailable).
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 2] = [
    http::StatusCode::LOCKED.as_u16(),
    http::StatusCode::SERVICE_UNAVAILABLE.as_u16(),
];

/// Determines how errors are handled in the retry loop.
///
/// Implementations of this trait determine if errors may resolve in future
/// attempts, and for how long the retry loop may continue.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Query the retry policy after an error.
    ///
    /// # Parameters
    /// * `loop_start` - when the retry loop started.
    /// * `attempt_count` - the number of attempts. This includes the initial
    ///   attempt, so it is always non-zero.
    /// * `error` - the last error when attempting the request.
    fn on_error(
        &self,
        loop_start: std::time::Instant,
        attempt_count: u32,
        error: Error,
    ) -> RetryResult;

    /// Returns true if a response with this status should be retried.
    ///
    /// The transport converts such responses to errors before calling
    /// `on_error()`.
    fn retryable_status(&self, _status: http::StatusCode) -> bool {
        false
    }
}

/// Extension trait for [RetryPolicy]
pub trait RetryPolicyExt: RetryPolicy + Sized {
    /// Decorate a [RetryPolicy] to limit the number of attempts.
    ///
    /// The policy passes through the results from the inner policy as long as
    /// `attempt_count < maximum_attempts`. Once the maximum number of attempts
    /// is reached, the policy returns [Exhausted][RetryResult::Exhausted] if
    /// the inner policy returns [Continue][RetryResult::Continue], and passes
    /// the inner policy result otherwise.
    ///
    /// # Example
    /// ```
    /// # use stratus_gax::retry_policy::*;
    /// # use stratus_gax::error::Error;
    /// use std::time::Instant;
    /// let policy = TransientErrors::new().with_attempt_limit(3);
    /// assert!(policy.on_error(Instant::now(), 1, transient_error()).is_continue());
    /// assert!(policy.on_error(Instant::now(), 2, transient_error()).is_continue());
    /// assert!(policy.on_error(Instant::now(), 3, transient_error()).is_exhausted());
    ///
    /// fn transient_error() -> Error { Error::io("connection reset") }
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: RetryPolicy> RetryPolicyExt for T {}

/// A retry policy that retries connection failures and transient statuses.
///
/// Network-level errors (no HTTP response was received) are always treated
/// as transient. Responses are transient only if their status code is in the
/// configured set, by default [DEFAULT_RETRYABLE_STATUS_CODES]. Any other
/// error is permanent.
///
/// This policy must be decorated to limit the number of retry attempts.
#[derive(Clone, Debug)]
pub struct TransientErrors {
    status_codes: BTreeSet<u16>,
}

impl TransientErrors {
    /// Creates a policy retrying the default status codes.
    pub fn new() -> Self {
        Self {
            status_codes: BTreeSet::from(DEFAULT_RETRYABLE_STATUS_CODES),
        }
    }

    /// Replaces the set of retryable status codes.
    pub fn with_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.status_codes = codes.into_iter().collect();
        self
    }

    /// The retryable status codes.
    pub fn status_codes(&self) -> &BTreeSet<u16> {
        &self.status_codes
    }
}

impl Default for TransientErrors {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy for TransientErrors {
    fn on_error(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
        error: Error,
    ) -> RetryResult {
        if error.is_network() {
            return RetryResult::Continue(error);
        }
        match error.http_status_code() {
            Some(code) if self.status_codes.contains(&code) => RetryResult::Continue(error),
            _ => RetryResult::Permanent(error),
        }
    }

    fn retryable_status(&self, status: http::StatusCode) -> bool {
        self.status_codes.contains(&status.as_u16())
    }
}

/// A retry policy decorator that limits the number of attempts.
///
/// # Parameters
/// * `P` - the inner retry policy.
#[derive(Clone, Debug)]
pub struct LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl<P> LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    /// Creates a new instance, with a custom inner policy.
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    /// The total number of attempts, including the initial attempt.
    pub fn maximum_attempts(&self) -> u32 {
        self.maximum_attempts
    }
}

impl<P> RetryPolicy for LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    fn on_error(
        &self,
        loop_start: std::time::Instant,
        attempt_count: u32,
        error: Error,
    ) -> RetryResult {
        match self.inner.on_error(loop_start, attempt_count, error) {
            RetryResult::Continue(e) if attempt_count >= self.maximum_attempts => {
                RetryResult::Exhausted(Error::exhausted(e))
            }
            result => result,
        }
    }

    fn retryable_status(&self, status: http::StatusCode) -> bool {
        self.inner.retryable_status(status)
    }
}
