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

use crate::options::WaiterSpec;
use crate::state::ResourceState;
use gax::Result;
use gax::error::Error;
use gax::polling::{PollStatus, Polling, PollingOptions, poll, poll_until_done};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Waits until a resource reaches one of the target states in a [WaiterSpec].
///
/// Each tick calls `read`, and classifies the result:
///
/// * A *not found* error is treated as pending, up to
///   [not_found_retry_budget][WaiterSpec::not_found_retry_budget] consecutive
///   times. Any other error ends the wait.
/// * A [failed][ResourceState::is_failed] resource ends the wait with a
///   *resource failed* error.
/// * If every axis reported by the resource and constrained by the
///   [WaiterSpec] is in its target set, the wait succeeds with the resource.
/// * If every such axis is in its target or pending set, the wait continues.
/// * Otherwise the wait ends with an *unrecognized state* error.
///
/// # Example
/// ```
/// # use stratus_waiter::*;
/// # use stratus_waiter::state::*;
/// # async fn sample() -> gax::Result<()> {
/// let read = || async { Ok::<_, gax::error::Error>(StateSnapshot::from(Availability::Available)) };
/// let snapshot = Waiter::new(read, WaiterSpec::available()).wait().await?;
/// assert_eq!(snapshot.availability(), Some(Availability::Available));
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Waiter<F> {
    read: F,
    spec: WaiterSpec,
}

impl<F, Fut, R> Waiter<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
    R: ResourceState,
{
    pub fn new(read: F, spec: WaiterSpec) -> Self {
        Self { read, spec }
    }

    pub fn spec(&self) -> &WaiterSpec {
        &self.spec
    }

    /// Polls in the caller's task until the resource reaches a target state.
    pub async fn wait(self) -> Result<R> {
        let (mut tick, options) = self.into_tick();
        poll_until_done(move || tick.next(), options).await
    }

    /// Polls in a background task, reporting progress as a stream.
    ///
    /// See [Polling] for the events. Dropping the returned value stops the
    /// wait.
    ///
    /// # Panics
    /// If called outside a tokio runtime.
    pub fn wait_stream(self) -> Polling<R>
    where
        F: Send + 'static,
        Fut: Send + 'static,
        R: Send + 'static,
    {
        let (mut tick, options) = self.into_tick();
        poll(move || tick.next(), options)
    }

    fn into_tick(self) -> (Tick<F>, PollingOptions) {
        let options = self.spec.polling_options();
        let tick = Tick {
            read: self.read,
            classifier: Arc::new(Classifier::new(self.spec)),
        };
        (tick, options)
    }
}

// Reads the resource once and classifies the result.
struct Tick<F> {
    read: F,
    classifier: Arc<Classifier>,
}

impl<F, Fut, R> Tick<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
    R: ResourceState,
{
    fn next(&mut self) -> impl Future<Output = Result<PollStatus<R>>> + use<F, Fut, R> {
        let read = (self.read)();
        let classifier = self.classifier.clone();
        async move { classifier.classify(read.await) }
    }
}

/// Waits for the resource returned by `read` to reach a target state in `spec`.
///
/// # Example
/// ```
/// # use stratus_waiter::*;
/// # use stratus_waiter::state::*;
/// # async fn sample() -> gax::Result<()> {
/// let read = || async { Ok::<_, gax::error::Error>(StateSnapshot::from(InstanceRuntimeStatus::Down)) };
/// let snapshot = wait(read, WaiterSpec::stopped()).await?;
/// assert_eq!(snapshot.instance_status(), Some(InstanceRuntimeStatus::Down));
/// # Ok(()) }
/// ```
pub async fn wait<F, Fut, R>(read: F, spec: WaiterSpec) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
    R: ResourceState,
{
    Waiter::new(read, spec).wait().await
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AxisState {
    NotApplicable,
    Target,
    Pending,
    Unrecognized,
}

fn axis_state<T: Ord>(value: Option<T>, target: &BTreeSet<T>, pending: &BTreeSet<T>) -> AxisState {
    if target.is_empty() && pending.is_empty() {
        return AxisState::NotApplicable;
    }
    match value {
        None => AxisState::NotApplicable,
        Some(v) if target.contains(&v) => AxisState::Target,
        Some(v) if pending.contains(&v) => AxisState::Pending,
        Some(_) => AxisState::Unrecognized,
    }
}

fn unrecognized<T: Display>(axis: &str, value: Option<T>) -> Error {
    let value = value.map(|v| v.to_string()).unwrap_or_default();
    Error::unrecognized_state(format!(
        "{axis} `{value}` is neither a target nor a pending state"
    ))
}

// The per-wait state, shared with each probe future. Probes run one at a
// time.
#[derive(Debug)]
struct Classifier {
    spec: WaiterSpec,
    not_found: AtomicU32,
    tick: AtomicU32,
}

impl Classifier {
    fn new(spec: WaiterSpec) -> Self {
        Self {
            spec,
            not_found: AtomicU32::new(0),
            tick: AtomicU32::new(0),
        }
    }

    fn classify<R: ResourceState>(&self, result: Result<R>) -> Result<PollStatus<R>> {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let resource = match result {
            Ok(r) => r,
            Err(e) if e.is_not_found() => return self.on_not_found(tick, e),
            Err(e) => {
                tracing::warn!(tick, error = %e, "cannot read the resource state");
                return Err(e);
            }
        };
        self.not_found.store(0, Ordering::Relaxed);

        let availability = resource.availability();
        let instance_status = resource.instance_status();
        if resource.is_failed() {
            tracing::warn!(tick, ?availability, ?instance_status, "resource failed");
            let availability = availability.map(|a| a.to_string()).unwrap_or_default();
            return Err(Error::resource_failed(format!(
                "the resource is in a failed state, availability=`{availability}`"
            )));
        }

        let a = axis_state(
            availability,
            self.spec.target_availability(),
            self.spec.pending_availability(),
        );
        let s = axis_state(
            instance_status,
            self.spec.target_instance_status(),
            self.spec.pending_instance_status(),
        );
        if a == AxisState::Unrecognized || s == AxisState::Unrecognized {
            tracing::warn!(tick, ?availability, ?instance_status, "unrecognized resource state");
            if a == AxisState::Unrecognized {
                return Err(unrecognized("availability", availability));
            }
            return Err(unrecognized("instance status", instance_status));
        }
        if a == AxisState::Pending || s == AxisState::Pending {
            tracing::debug!(tick, ?availability, ?instance_status, "resource not ready");
            return Ok(PollStatus::Pending);
        }
        tracing::debug!(tick, ?availability, ?instance_status, "resource ready");
        Ok(PollStatus::Done(resource))
    }

    fn on_not_found<R>(&self, tick: u32, error: Error) -> Result<PollStatus<R>> {
        let budget = self.spec.not_found_retry_budget();
        let count = self.not_found.load(Ordering::Relaxed);
        if count < budget {
            self.not_found.store(count + 1, Ordering::Relaxed);
            tracing::debug!(tick, not_found = count + 1, budget, "resource not found yet");
            return Ok(PollStatus::Pending);
        }
        tracing::warn!(tick, budget, error = %error, "resource not found");
        Err(error)
    }
}
