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

//! Repeat a probe until it reports completion.
//!
//! Many operations in the Stratus API complete in the background. The caller
//! must periodically query the service until the work is done. This module
//! provides the loop to do so in two forms:
//!
//! * [poll] runs the loop in a background task, and returns a [Polling]
//!   handle. The handle is a [Stream] of [PollEvent]s, with one progress event
//!   per pending probe and exactly one terminal event. The handle is also a
//!   [Future] resolving to the outcome.
//! * [poll_until_done] runs the loop inline, in the caller's task.
//!
//! # Example
//! ```
//! # use stratus_gax::polling::*;
//! # use stratus_gax::Result;
//! use futures::StreamExt;
//! use std::time::Duration;
//! # async fn sample() -> Result<()> {
//! let mut count = 0;
//! let probe = move || {
//!     count += 1;
//!     let status = if count < 3 { PollStatus::Pending } else { PollStatus::Done(count) };
//!     async move { Ok(status) }
//! };
//! let options = PollingOptions::new().with_interval(Duration::from_millis(10));
//! let mut polling = poll(probe, options);
//! while let Some(event) = polling.next().await {
//!     match event {
//!         PollEvent::Progress(tick) => println!("still waiting after {tick} probes"),
//!         PollEvent::Completed(value) => println!("done: {value}"),
//!         PollEvent::Failed(e) => return Err(e),
//!     }
//! }
//! # Ok(()) }
//! ```

use crate::Result;
use crate::error::Error;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// The result of a single probe.
#[derive(Clone, Debug, PartialEq)]
pub enum PollStatus<T> {
    /// The work is done, stop polling.
    Done(T),
    /// The work is still in progress.
    Pending,
}

/// An event published by a [Polling] instance.
#[derive(Debug)]
pub enum PollEvent<T> {
    /// The probe reported pending work, the value is the number of pending
    /// probes so far.
    Progress(u32),
    /// The probe reported completion.
    Completed(T),
    /// The probe failed, the loop timed out, or polling was cancelled.
    Failed(Error),
}

impl<T> PollEvent<T> {
    /// Returns true for the events that end a stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Controls the polling loop.
///
/// # Example
/// ```
/// # use stratus_gax::polling::PollingOptions;
/// # use std::time::Duration;
/// let options = PollingOptions::new()
///     .with_interval(Duration::from_secs(2))
///     .with_timeout(Duration::from_secs(600));
/// assert_eq!(options.interval(), Duration::from_secs(2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollingOptions {
    interval: Duration,
    timeout: Duration,
}

impl PollingOptions {
    /// Probes every 5 seconds, for at most 20 minutes.
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(20 * 60),
        }
    }

    /// The time between the start of two consecutive probes.
    pub fn with_interval<V: Into<Duration>>(mut self, v: V) -> Self {
        self.interval = v.into();
        self
    }

    /// The maximum time for the complete loop.
    ///
    /// A timeout too large to represent, such as [Duration::MAX], never
    /// expires.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = v.into();
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts polling in a background task.
///
/// The probe is called immediately, and then once every
/// [interval][PollingOptions::interval] until it returns an error, it returns
/// [PollStatus::Done], or the [timeout][PollingOptions::timeout] expires. At
/// most one probe runs at a time.
///
/// Dropping the returned [Polling] stops the background task.
///
/// # Panics
/// If called outside a tokio runtime.
pub fn poll<P, Fut, T>(probe: P, options: PollingOptions) -> Polling<T>
where
    P: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<PollStatus<T>>> + Send + 'static,
    T: Send + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let cancelled = token.clone();
    tokio::spawn(async move {
        let progress = sender.clone();
        let work = poll_loop(probe, options, move |tick| {
            // The receiver may be gone, the select below stops the loop then.
            let _ = progress.send(PollEvent::Progress(tick));
        });
        let event = tokio::select! {
            biased;
            _ = cancelled.cancelled() => PollEvent::Failed(Error::cancelled("polling was cancelled")),
            result = work => match result {
                Ok(v) => PollEvent::Completed(v),
                Err(e) => PollEvent::Failed(e),
            },
        };
        let _ = sender.send(event);
    });
    Polling {
        receiver,
        _guard: token.clone().drop_guard(),
        token,
        finished: false,
    }
}

/// Polls in the caller's task until the probe reports completion.
///
/// This is the same loop as [poll], without progress events.
pub async fn poll_until_done<P, Fut, T>(probe: P, options: PollingOptions) -> Result<T>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    poll_loop(probe, options, |_| {}).await
}

async fn poll_loop<P, Fut, T, F>(mut probe: P, options: PollingOptions, mut on_progress: F) -> Result<T>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
    F: FnMut(u32),
{
    let deadline = Instant::now().checked_add(options.timeout);
    let work = async {
        let mut pending = 0_u32;
        loop {
            let tick_start = Instant::now();
            match probe().await? {
                PollStatus::Done(v) => return Ok(v),
                PollStatus::Pending => {
                    pending = pending.saturating_add(1);
                    tracing::debug!(pending, "polling in progress");
                    on_progress(pending);
                }
            }
            match tick_start.checked_add(options.interval) {
                Some(next) => tokio::time::sleep_until(next).await,
                None => std::future::pending::<()>().await,
            }
        }
    };
    // A timeout too large to represent never expires.
    let Some(deadline) = deadline else {
        return work.await;
    };
    match tokio::time::timeout_at(deadline, work).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?options.timeout, "polling timed out");
            Err(Error::timeout(format!(
                "polling did not complete within {:?}",
                options.timeout
            )))
        }
    }
}

/// A handle to a polling loop running in the background.
///
/// As a [Stream] this yields zero or more [PollEvent::Progress] events, then
/// exactly one terminal event, then ends. As a [Future] it resolves to the
/// value or error in the terminal event.
pub struct Polling<T> {
    receiver: mpsc::UnboundedReceiver<PollEvent<T>>,
    token: CancellationToken,
    _guard: DropGuard,
    finished: bool,
}

impl<T> Polling<T> {
    /// Stops the background task.
    ///
    /// Unless the loop already finished, the stream yields a
    /// [PollEvent::Failed] event with a *cancelled* error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the terminal event was received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<T> std::fmt::Debug for Polling<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polling")
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T> Stream for Polling<T> {
    type Item = PollEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let event = match ready!(self.receiver.poll_recv(cx)) {
            Some(event) => event,
            // The task ended without a terminal event, it must have panicked.
            None => PollEvent::Failed(Error::other("the polling task terminated unexpectedly")),
        };
        if event.is_terminal() {
            self.finished = true;
        }
        Poll::Ready(Some(event))
    }
}

impl<T> Future for Polling<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            match ready!(self.as_mut().poll_next(cx)) {
                Some(PollEvent::Progress(_)) => continue,
                Some(PollEvent::Completed(v)) => return Poll::Ready(Ok(v)),
                Some(PollEvent::Failed(e)) => return Poll::Ready(Err(e)),
                None => {
                    return Poll::Ready(Err(Error::other(
                        "the polling loop already reported its outcome",
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Probe = Box<dyn FnMut() -> std::future::Ready<Result<PollStatus<u32>>> + Send>;

    // A probe returning `Pending` for the first `pending` calls, and the call
    // count afterwards.
    fn counting_probe(pending: u32) -> (Probe, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let probe = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if n > pending {
                PollStatus::Done(n)
            } else {
                PollStatus::Pending
            };
            std::future::ready(Ok(status))
        };
        (Box::new(probe), count)
    }

    fn options() -> PollingOptions {
        PollingOptions::new()
            .with_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(10))
    }

    #[test]
    fn options_defaults() {
        let o = PollingOptions::default();
        assert_eq!(o.interval(), Duration::from_secs(5));
        assert_eq!(o.timeout(), Duration::from_secs(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_completes() -> anyhow::Result<()> {
        let (probe, count) = counting_probe(3);
        let start = Instant::now();
        let polling = poll(probe, options());
        let events = polling.collect::<Vec<_>>().await;
        assert_eq!(events.len(), 4, "{events:?}");
        for (i, e) in events.iter().take(3).enumerate() {
            assert!(matches!(e, PollEvent::Progress(n) if *n as usize == i + 1), "{e:?}");
        }
        assert!(
            matches!(events.last(), Some(PollEvent::Completed(4))),
            "{events:?}"
        );
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn future_completes() -> anyhow::Result<()> {
        let (probe, _) = counting_probe(2);
        let got = poll(probe, options()).await?;
        assert_eq!(got, 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_completion() -> anyhow::Result<()> {
        let (probe, _) = counting_probe(0);
        let start = Instant::now();
        let mut polling = poll(probe, options());
        let event = polling.next().await;
        assert!(matches!(event, Some(PollEvent::Completed(1))), "{event:?}");
        assert!(polling.is_finished());
        assert!(polling.next().await.is_none());
        assert_eq!(start.elapsed(), Duration::ZERO);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timeout() -> anyhow::Result<()> {
        let (probe, _) = counting_probe(u32::MAX);
        let start = Instant::now();
        let events = poll(probe, options()).collect::<Vec<_>>().await;
        let (last, progress) = events.split_last().expect("at least one event");
        assert!(
            matches!(last, PollEvent::Failed(e) if e.is_timeout()),
            "{last:?}"
        );
        assert!(progress.len() >= 10, "{progress:?}");
        assert!(progress.iter().all(|e| !e.is_terminal()), "{progress:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error() -> anyhow::Result<()> {
        let mut count = 0;
        let probe = move || {
            count += 1;
            let result = if count < 2 {
                Ok(PollStatus::<u32>::Pending)
            } else {
                Err(Error::http(
                    403,
                    http::HeaderMap::new(),
                    bytes::Bytes::from_static(b"forbidden"),
                ))
            };
            std::future::ready(result)
        };
        let start = Instant::now();
        let err = poll(probe, options()).await.unwrap_err();
        assert_eq!(err.http_status_code(), Some(403), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancel() -> anyhow::Result<()> {
        let (probe, count) = counting_probe(u32::MAX);
        let mut polling = poll(probe, options());
        let event = polling.next().await;
        assert!(matches!(event, Some(PollEvent::Progress(1))), "{event:?}");
        polling.cancel();
        let event = polling.next().await;
        assert!(
            matches!(&event, Some(PollEvent::Failed(e)) if e.is_cancelled()),
            "{event:?}"
        );
        assert!(polling.next().await.is_none());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_task() -> anyhow::Result<()> {
        let (probe, count) = counting_probe(u32::MAX);
        let mut polling = poll(probe, options());
        let event = polling.next().await;
        assert!(matches!(event, Some(PollEvent::Progress(1))), "{event:?}");
        drop(polling);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn until_done() -> anyhow::Result<()> {
        let (probe, count) = counting_probe(3);
        let start = Instant::now();
        let got = poll_until_done(probe, options()).await?;
        assert_eq!(got, 4);
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn until_done_timeout() -> anyhow::Result<()> {
        let (probe, _) = counting_probe(u32::MAX);
        let start = Instant::now();
        let err = poll_until_done(probe, options()).await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout() -> anyhow::Result<()> {
        let options = options().with_timeout(Duration::MAX);
        let (probe, _) = counting_probe(2);
        let start = Instant::now();
        let got = poll_until_done(probe, options).await?;
        assert_eq!(got, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let (probe, _) = counting_probe(1);
        let got = poll(probe, options).await?;
        assert_eq!(got, 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_interval() -> anyhow::Result<()> {
        let options = options().with_interval(Duration::MAX);
        let (probe, count) = counting_probe(u32::MAX);
        let start = Instant::now();
        let err = poll_until_done(probe, options).await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_keeps_cadence() -> anyhow::Result<()> {
        let mut count = 0;
        let probe = move || {
            count += 1;
            let n = count;
            async move {
                tokio::time::sleep(Duration::from_millis(400)).await;
                Ok(if n < 3 {
                    PollStatus::Pending
                } else {
                    PollStatus::Done(n)
                })
            }
        };
        let start = Instant::now();
        let got = poll_until_done(probe, options()).await?;
        assert_eq!(got, 3);
        // Probes start at 0s, 1s and 2s, the last one takes 400ms.
        assert_eq!(start.elapsed(), Duration::from_millis(2400));
        Ok(())
    }

    #[test]
    fn send_sync() {
        static_assertions::assert_impl_all!(Polling<u32>: Send, Sync, Unpin);
    }
}
