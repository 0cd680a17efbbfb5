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

//! Configure what a waiter waits for.

use crate::state::{Availability, InstanceRuntimeStatus};
use gax::polling::PollingOptions;
use std::collections::BTreeSet;
use std::time::Duration;

/// The error type for [WaiterSpec] creation.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("availability {0} is both a target and a pending state")]
    OverlappingAvailability(Availability),
    #[error("instance status {0} is both a target and a pending state")]
    OverlappingInstanceStatus(InstanceRuntimeStatus),
    #[error("the spec must have a target state on at least one axis")]
    NoTarget,
    #[error("the poll interval should be greater than zero")]
    InvalidPollInterval,
}

/// The states that end a wait, and the states that keep it going.
///
/// Each axis has a set of target states and a set of pending states. A
/// snapshot is done when every reported, constrained axis is in its target
/// set. Any state outside both sets ends the wait with an error.
///
/// # Example
/// ```
/// # use stratus_waiter::options::WaiterSpec;
/// # use stratus_waiter::state::Availability;
/// # use std::time::Duration;
/// let spec = WaiterSpec::builder()
///     .with_target_availability([Availability::Available])
///     .with_pending_availability([Availability::Uploading])
///     .with_timeout(Duration::from_secs(300))
///     .build()?;
/// assert_eq!(spec.not_found_retry_budget(), 3);
/// # Ok::<(), stratus_waiter::options::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaiterSpec {
    target_availability: BTreeSet<Availability>,
    pending_availability: BTreeSet<Availability>,
    target_instance_status: BTreeSet<InstanceRuntimeStatus>,
    pending_instance_status: BTreeSet<InstanceRuntimeStatus>,
    not_found_retry_budget: u32,
    poll_interval: Duration,
    timeout: Duration,
}

const DEFAULT_NOT_FOUND_RETRY_BUDGET: u32 = 3;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const TRANSITIONAL_AVAILABILITY: [Availability; 3] = [
    Availability::Uploading,
    Availability::Migrating,
    Availability::Transferring,
];

impl WaiterSpec {
    pub fn builder() -> WaiterSpecBuilder {
        WaiterSpecBuilder::default()
    }

    /// Waits for a resource to become [Available][Availability::Available].
    pub fn available() -> Self {
        Self::from_sets(
            [Availability::Available],
            TRANSITIONAL_AVAILABILITY,
            [],
            [],
        )
    }

    /// Waits for an available instance to be [Up][InstanceRuntimeStatus::Up].
    pub fn running() -> Self {
        Self::from_sets(
            [Availability::Available],
            TRANSITIONAL_AVAILABILITY,
            [InstanceRuntimeStatus::Up],
            [InstanceRuntimeStatus::Cleaning, InstanceRuntimeStatus::Down],
        )
    }

    /// Waits for an instance to be [Down][InstanceRuntimeStatus::Down].
    pub fn stopped() -> Self {
        Self::from_sets(
            [],
            [],
            [InstanceRuntimeStatus::Down],
            [InstanceRuntimeStatus::Up, InstanceRuntimeStatus::Cleaning],
        )
    }

    // Only used with sets known to be disjoint.
    fn from_sets<const A: usize, const B: usize, const C: usize, const D: usize>(
        target_availability: [Availability; A],
        pending_availability: [Availability; B],
        target_instance_status: [InstanceRuntimeStatus; C],
        pending_instance_status: [InstanceRuntimeStatus; D],
    ) -> Self {
        Self {
            target_availability: target_availability.into(),
            pending_availability: pending_availability.into(),
            target_instance_status: target_instance_status.into(),
            pending_instance_status: pending_instance_status.into(),
            not_found_retry_budget: DEFAULT_NOT_FOUND_RETRY_BUDGET,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Changes the polling cadence of an existing spec.
    pub fn with_poll_interval<V: Into<Duration>>(mut self, v: V) -> Result<Self, Error> {
        let v = v.into();
        if v.is_zero() {
            return Err(Error::InvalidPollInterval);
        }
        self.poll_interval = v;
        Ok(self)
    }

    /// Changes the timeout of an existing spec.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = v.into();
        self
    }

    /// Changes the number of consecutive *not found* errors tolerated.
    pub fn with_not_found_retry_budget(mut self, v: u32) -> Self {
        self.not_found_retry_budget = v;
        self
    }

    pub fn target_availability(&self) -> &BTreeSet<Availability> {
        &self.target_availability
    }

    pub fn pending_availability(&self) -> &BTreeSet<Availability> {
        &self.pending_availability
    }

    pub fn target_instance_status(&self) -> &BTreeSet<InstanceRuntimeStatus> {
        &self.target_instance_status
    }

    pub fn pending_instance_status(&self) -> &BTreeSet<InstanceRuntimeStatus> {
        &self.pending_instance_status
    }

    pub fn not_found_retry_budget(&self) -> u32 {
        self.not_found_retry_budget
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn polling_options(&self) -> PollingOptions {
        PollingOptions::new()
            .with_interval(self.poll_interval)
            .with_timeout(self.timeout)
    }
}

/// A builder for [WaiterSpec].
#[derive(Clone, Debug)]
pub struct WaiterSpecBuilder {
    target_availability: BTreeSet<Availability>,
    pending_availability: BTreeSet<Availability>,
    target_instance_status: BTreeSet<InstanceRuntimeStatus>,
    pending_instance_status: BTreeSet<InstanceRuntimeStatus>,
    not_found_retry_budget: u32,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for WaiterSpecBuilder {
    fn default() -> Self {
        Self {
            target_availability: BTreeSet::new(),
            pending_availability: BTreeSet::new(),
            target_instance_status: BTreeSet::new(),
            pending_instance_status: BTreeSet::new(),
            not_found_retry_budget: DEFAULT_NOT_FOUND_RETRY_BUDGET,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WaiterSpecBuilder {
    pub fn with_target_availability<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = Availability>,
    {
        self.target_availability = v.into_iter().collect();
        self
    }

    pub fn with_pending_availability<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = Availability>,
    {
        self.pending_availability = v.into_iter().collect();
        self
    }

    pub fn with_target_instance_status<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = InstanceRuntimeStatus>,
    {
        self.target_instance_status = v.into_iter().collect();
        self
    }

    pub fn with_pending_instance_status<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = InstanceRuntimeStatus>,
    {
        self.pending_instance_status = v.into_iter().collect();
        self
    }

    /// The number of consecutive *not found* errors treated as pending.
    ///
    /// Newly created resources may not be visible immediately. Defaults to 3.
    pub fn with_not_found_retry_budget(mut self, v: u32) -> Self {
        self.not_found_retry_budget = v;
        self
    }

    /// The time between the start of two consecutive reads. Defaults to 5
    /// seconds.
    pub fn with_poll_interval<V: Into<Duration>>(mut self, v: V) -> Self {
        self.poll_interval = v.into();
        self
    }

    /// The maximum time to wait. Defaults to 20 minutes.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = v.into();
        self
    }

    pub fn build(self) -> Result<WaiterSpec, Error> {
        if let Some(a) = self
            .target_availability
            .intersection(&self.pending_availability)
            .next()
        {
            return Err(Error::OverlappingAvailability(*a));
        }
        if let Some(s) = self
            .target_instance_status
            .intersection(&self.pending_instance_status)
            .next()
        {
            return Err(Error::OverlappingInstanceStatus(*s));
        }
        if self.target_availability.is_empty() && self.target_instance_status.is_empty() {
            return Err(Error::NoTarget);
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidPollInterval);
        }
        Ok(WaiterSpec {
            target_availability: self.target_availability,
            pending_availability: self.pending_availability,
            target_instance_status: self.target_instance_status,
            pending_instance_status: self.pending_instance_status,
            not_found_retry_budget: self.not_found_retry_budget,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}
