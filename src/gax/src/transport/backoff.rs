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

use super::{Request, Response, Transport};
use crate::Result;
use crate::backoff_policy::BackoffPolicy;
use crate::error::Error;
use crate::exponential_backoff::{self, ExponentialBackoffBuilder};
use crate::retry_loop_internal::{LoopControl, retry_loop};
use crate::retry_policy::{RetryPolicy, RetryPolicyExt, TransientErrors};
use crate::retry_result::RetryResult;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Configures a [BackoffTransport].
///
/// # Example
/// ```
/// # use stratus_gax::transport::BackoffTransport;
/// # use std::time::Duration;
/// let builder = BackoffTransport::builder()
///     .with_max_attempts(5)
///     .with_wait_min(Duration::from_millis(250))
///     .with_wait_max(Duration::from_secs(8))
///     .with_retryable_status_codes([423, 429, 503]);
/// ```
#[derive(Clone, Debug)]
pub struct BackoffTransportBuilder {
    max_attempts: u32,
    wait_min: Duration,
    wait_max: Duration,
    retryable_status_codes: BTreeSet<u16>,
}

impl BackoffTransportBuilder {
    /// Creates a builder with the default configuration: 4 retries, waiting
    /// between 1 and 30 seconds, retrying 423 (Locked) and 503 (Service
    /// Unavailable).
    pub fn new() -> Self {
        Self {
            max_attempts: 4,
            wait_min: Duration::from_secs(1),
            wait_max: Duration::from_secs(30),
            retryable_status_codes: BTreeSet::from(
                crate::retry_policy::DEFAULT_RETRYABLE_STATUS_CODES,
            ),
        }
    }

    /// The number of retries after the first attempt.
    pub fn with_max_attempts(mut self, v: u32) -> Self {
        self.max_attempts = v;
        self
    }

    /// The delay before the first retry.
    pub fn with_wait_min<V: Into<Duration>>(mut self, v: V) -> Self {
        self.wait_min = v.into();
        self
    }

    /// The largest delay between two attempts.
    pub fn with_wait_max<V: Into<Duration>>(mut self, v: V) -> Self {
        self.wait_max = v.into();
        self
    }

    /// Replaces the status codes that trigger a retry.
    pub fn with_retryable_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Wraps `inner` with the configured retry and backoff policies.
    pub fn build<T: Transport>(
        self,
        inner: T,
    ) -> std::result::Result<BackoffTransport<T>, exponential_backoff::Error> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(self.wait_min)
            .with_maximum_delay(self.wait_max)
            .with_scaling(2.0)
            .build()?;
        let retry = TransientErrors::new()
            .with_status_codes(self.retryable_status_codes)
            .with_attempt_limit(self.max_attempts.saturating_add(1));
        Ok(BackoffTransport::custom(inner, retry, backoff))
    }
}

impl Default for BackoffTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A transport that retries transient failures with exponential backoff.
///
/// Connection failures and responses with a retryable status code are retried
/// until the retry policy is exhausted. Responses with any other status, and
/// any other error, are returned immediately.
///
/// The transport stops retrying when the request's cancellation token fires or
/// its deadline passes, returning a *cancelled* or *timeout* error.
///
/// Requests with a streaming body cannot be replayed. They are sent once, and
/// a failure that would be retried is returned as an *exhausted* error.
#[derive(Clone, Debug)]
pub struct BackoffTransport<T> {
    inner: T,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
}

impl BackoffTransport<()> {
    /// Returns a builder with the default configuration.
    pub fn builder() -> BackoffTransportBuilder {
        BackoffTransportBuilder::new()
    }
}

impl<T: Transport> BackoffTransport<T> {
    /// Wraps `inner` with custom retry and backoff policies.
    ///
    /// The retry policy decides which errors are retried and for how long,
    /// responses are retried if [RetryPolicy::retryable_status] returns true.
    pub fn custom<R, B>(inner: T, retry_policy: R, backoff_policy: B) -> Self
    where
        R: RetryPolicy + 'static,
        B: BackoffPolicy + 'static,
    {
        Self {
            inner,
            retry_policy: Arc::new(retry_policy),
            backoff_policy: Arc::new(backoff_policy),
        }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn attempt(&self, request: Request) -> Result<Response> {
        let response = self.inner.send(request).await?;
        if self.retry_policy.retryable_status(response.status()) {
            return Err(Error::from(response));
        }
        Ok(response)
    }

    async fn send_once(&self, request: Request) -> Result<Response> {
        let loop_start = tokio::time::Instant::now().into_std();
        let error = match self.attempt(request).await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        match self.retry_policy.on_error(loop_start, 1, error) {
            RetryResult::Continue(e) => {
                tracing::warn!(error = %e, "cannot retry a request with a streaming body");
                Err(Error::exhausted(e))
            }
            RetryResult::Permanent(e) | RetryResult::Exhausted(e) => Err(e),
        }
    }
}

impl<T: Transport> Transport for BackoffTransport<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        if request.try_clone().is_none() {
            return self.send_once(request).await;
        }
        let control = LoopControl {
            cancellation: request.cancellation().cloned(),
            deadline: request.deadline(),
        };
        let inner = |request: Option<Request>| async move {
            match request {
                Some(r) => self.attempt(r).await,
                None => Err(Error::other("request body cannot be replayed")),
            }
        };
        let result = retry_loop(
            || inner(request.try_clone()),
            tokio::time::sleep,
            control,
            self.retry_policy.clone(),
            self.backoff_policy.clone(),
        )
        .await;
        match &result {
            Err(e) if e.is_exhausted() || e.is_cancelled() || e.is_timeout() => {
                tracing::warn!(method = %request.method(), url = request.url(), error = %e, "giving up on request");
            }
            _ => {}
        }
        result
    }
}
