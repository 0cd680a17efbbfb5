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
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// The error type for rate limiter creation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the requests per second ({0}) should be greater than zero")]
    InvalidRate(u32),
    #[error("the burst ({0}) should be greater than zero")]
    InvalidBurst(u32),
}

/// Configures a [RateLimiter].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitSpec {
    requests_per_second: u32,
    burst: u32,
}

impl RateLimitSpec {
    /// Allows `requests_per_second` requests, without bursts.
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
            burst: 1,
        }
    }

    /// Allows up to `burst` requests without waiting, as long as the average
    /// rate stays below `requests_per_second`.
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

/// A token bucket limiting the rate of requests.
///
/// This implements the generic cell rate algorithm: the limiter tracks the
/// theoretical arrival time of the next request, and each request pushes it
/// forward by one emission interval. Requests arriving earlier than the
/// theoretical arrival time minus the burst tolerance wait.
///
/// # Example
/// ```
/// # use stratus_gax::transport::{RateLimiter, RateLimitSpec};
/// # tokio_test_block_on(async {
/// let limiter = RateLimiter::new(RateLimitSpec::new(5).with_burst(2))?;
/// limiter.acquire().await;
/// # Ok::<(), stratus_gax::transport::rate_limit::Error>(()) });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    tolerance: Duration,
    next: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(spec: RateLimitSpec) -> std::result::Result<Self, Error> {
        if spec.requests_per_second == 0 {
            return Err(Error::InvalidRate(spec.requests_per_second));
        }
        if spec.burst == 0 {
            return Err(Error::InvalidBurst(spec.burst));
        }
        let interval = Duration::from_secs(1) / spec.requests_per_second;
        Ok(Self {
            interval,
            tolerance: interval * (spec.burst - 1),
            next: Mutex::new(None),
        })
    }

    /// Waits until the limiter grants a slot.
    pub async fn acquire(&self) {
        let ready = self.reserve(Instant::now());
        if ready > Instant::now() {
            tracing::debug!(delay = ?(ready - Instant::now()), "rate limited");
            tokio::time::sleep_until(ready).await;
        }
    }

    // Reserves the next slot, returning when it may be used.
    fn reserve(&self, now: Instant) -> Instant {
        let mut guard = self.next.lock().expect("rate limiter lock is poisoned");
        let tat = guard.map_or(now, |t| std::cmp::max(t, now));
        *guard = Some(tat + self.interval);
        tat.checked_sub(self.tolerance)
            .map_or(now, |t| std::cmp::max(t, now))
    }
}

/// A transport that caps the rate of requests sent to the inner transport.
///
/// All clones of this transport share the same limiter.
#[derive(Clone, Debug)]
pub struct RateLimitedTransport<T> {
    inner: T,
    limiter: Arc<RateLimiter>,
}

impl<T: Transport> RateLimitedTransport<T> {
    pub fn new(inner: T, spec: RateLimitSpec) -> std::result::Result<Self, Error> {
        Ok(Self::with_limiter(inner, Arc::new(RateLimiter::new(spec)?)))
    }

    /// Wraps `inner` using an existing limiter.
    ///
    /// Use this to share one limiter between several transports.
    pub fn with_limiter(inner: T, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

impl<T: Transport> Transport for RateLimitedTransport<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        self.limiter.acquire().await;
        self.inner.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error as CoreError;
    use crate::transport::TransportExt;
    use crate::transport::tests::MockTransport;
    use http::{Method, StatusCode};
    use test_case::test_case;

    #[test]
    fn spec() {
        let spec = RateLimitSpec::new(10);
        assert_eq!(spec.requests_per_second(), 10);
        assert_eq!(spec.burst(), 1);
        let spec = spec.with_burst(3);
        assert_eq!(spec.burst(), 3);
    }

    #[test]
    fn errors() {
        let got = RateLimiter::new(RateLimitSpec::new(0));
        assert!(matches!(got, Err(Error::InvalidRate(0))), "{got:?}");
        let got = RateLimiter::new(RateLimitSpec::new(1).with_burst(0));
        assert!(matches!(got, Err(Error::InvalidBurst(0))), "{got:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn reserve_without_burst() -> anyhow::Result<()> {
        let limiter = RateLimiter::new(RateLimitSpec::new(4))?;
        let now = Instant::now();
        let got = (0..4).map(|_| limiter.reserve(now) - now).collect::<Vec<_>>();
        let want = [0, 250, 500, 750].map(Duration::from_millis);
        assert_eq!(got, want);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn reserve_with_burst() -> anyhow::Result<()> {
        let limiter = RateLimiter::new(RateLimitSpec::new(2).with_burst(3))?;
        let now = Instant::now();
        let got = (0..5).map(|_| limiter.reserve(now) - now).collect::<Vec<_>>();
        let want = [0, 0, 0, 500, 1000].map(Duration::from_millis);
        assert_eq!(got, want);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_limiter_does_not_accumulate() -> anyhow::Result<()> {
        let limiter = RateLimiter::new(RateLimitSpec::new(1))?;
        let start = Instant::now();
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        let now = Instant::now();
        assert_eq!(limiter.reserve(now), now);
        assert_eq!(limiter.reserve(now), now + Duration::from_secs(1));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        Ok(())
    }

    #[test_case(1, 1, 0)]
    #[test_case(5, 1, 4)]
    #[test_case(5, 2, 2)]
    #[test_case(7, 2, 3)]
    #[test_case(6, 5, 1)]
    #[tokio::test(start_paused = true)]
    async fn throughput(calls: u32, rps: u32, want_secs: u64) -> anyhow::Result<()> {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(calls as usize)
            .returning(|_| Box::pin(async { Ok(Response::new(StatusCode::OK)) }));
        let transport = mock.with_rate_limit(RateLimitSpec::new(rps))?;
        let start = Instant::now();
        for _ in 0..calls {
            transport
                .send(Request::new(Method::GET, "/v1/servers"))
                .await?;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(want_secs), "{elapsed:?}");
        assert!(
            elapsed < Duration::from_secs(want_secs) + Duration::from_secs(1),
            "{elapsed:?}"
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_limiter() -> anyhow::Result<()> {
        #[derive(Clone, Debug)]
        struct Ok200;
        impl Transport for Ok200 {
            async fn send(&self, _request: Request) -> Result<Response> {
                Ok(Response::new(StatusCode::OK))
            }
        }

        let transport = RateLimitedTransport::new(Ok200, RateLimitSpec::new(1))?;
        let clone = transport.clone();
        assert!(Arc::ptr_eq(transport.limiter(), clone.limiter()));
        let start = Instant::now();
        let (a, b) = tokio::join!(
            transport.send(Request::new(Method::GET, "/a")),
            clone.send(Request::new(Method::GET, "/b")),
        );
        a?;
        b?;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test]
    async fn errors_pass_through() -> anyhow::Result<()> {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .once()
            .returning(|_| Box::pin(async { Err(CoreError::io("connection refused")) }));
        let transport = mock.with_rate_limit(RateLimitSpec::new(100))?;
        let err = transport
            .send(Request::new(Method::GET, "/v1/servers"))
            .await
            .unwrap_err();
        assert!(err.is_io(), "{err:?}");
        Ok(())
    }
}
