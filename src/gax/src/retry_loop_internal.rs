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

//! The retry loop shared by the retrying transports.
//!
//! Applications should have no need to call these functions directly, they
//! are public so other crates in this workspace can reuse them.

use super::Result;
use super::backoff_policy::BackoffPolicy;
use super::error::Error;
use super::retry_policy::RetryPolicy;
use super::retry_result::RetryResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Controls when the retry loop must stop, regardless of the retry policy.
#[derive(Clone, Debug, Default)]
pub struct LoopControl {
    /// Stop before the next backoff if this token is cancelled.
    pub cancellation: Option<CancellationToken>,
    /// Stop before the next backoff if this deadline has passed.
    pub deadline: Option<Instant>,
}

/// Runs the retry loop for a given function.
///
/// This functions calls an inner function as long as (1) the retry policy has
/// not expired, (2) the inner function has not returned a successful request,
/// and (3) the caller has not cancelled the loop nor has its deadline expired.
///
/// In between calls the function waits the amount of time prescribed by the
/// backoff policy, using `sleep` to implement any sleep.
pub async fn retry_loop<F, Fut, S, SF, Response>(
    inner: F,
    sleep: S,
    control: LoopControl,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Response>> + Send,
    S: Fn(Duration) -> SF + Send,
    SF: Future<Output = ()> + Send,
{
    retry_loop_with_callback(
        inner,
        sleep,
        control,
        retry_policy,
        backoff_policy,
        |_, _, _| {},
    )
    .await
}

/// Runs the retry loop for a given function with a callback for retries.
///
/// The `on_retry` callback is called before sleeping, with the attempt count,
/// the error, and the delay.
pub async fn retry_loop_with_callback<F, Fut, S, SF, OnRetry, Response>(
    mut inner: F,
    sleep: S,
    control: LoopControl,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
    mut on_retry: OnRetry,
) -> Result<Response>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Response>> + Send,
    S: Fn(Duration) -> SF + Send,
    SF: Future<Output = ()> + Send,
    OnRetry: FnMut(u32, &Error, Duration) + Send,
{
    let loop_start = Instant::now().into_std();
    let mut attempt_count = 0_u32;
    loop {
        attempt_count += 1;
        let error = match inner().await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        let error = match retry_policy.on_error(loop_start, attempt_count, error) {
            RetryResult::Permanent(e) | RetryResult::Exhausted(e) => return Err(e),
            RetryResult::Continue(e) => e,
        };
        let delay = backoff_policy.on_failure(loop_start, attempt_count);
        let error = check_control(&control, error)?;
        on_retry(attempt_count, &error, delay);
        tracing::debug!(attempt_count, ?delay, error = %error, "retrying request");
        sleep_with_control(&sleep, &control, delay, error).await?;
    }
}

// Returns the error back if the loop may continue, or the terminal error
// otherwise.
fn check_control(control: &LoopControl, error: Error) -> Result<Error> {
    if control
        .cancellation
        .as_ref()
        .is_some_and(|t| t.is_cancelled())
    {
        return Err(Error::cancelled(error));
    }
    if control.deadline.is_some_and(|d| d <= Instant::now()) {
        return Err(Error::timeout(error));
    }
    Ok(error)
}

// Sleeps for `delay`, truncated to the deadline. Returns the terminal error if
// the loop must stop.
async fn sleep_with_control<S, SF>(
    sleep: &S,
    control: &LoopControl,
    delay: Duration,
    error: Error,
) -> Result<()>
where
    S: Fn(Duration) -> SF + Send,
    SF: Future<Output = ()> + Send,
{
    let (delay, truncated) = match control.deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            (std::cmp::min(delay, remaining), remaining <= delay)
        }
        None => (delay, false),
    };
    let cancelled = async {
        match &control.cancellation {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        biased;
        _ = cancelled => Err(Error::cancelled(error)),
        _ = sleep(delay) => {
            if truncated {
                return Err(Error::timeout(error));
            }
            Ok(())
        }
    }
}
