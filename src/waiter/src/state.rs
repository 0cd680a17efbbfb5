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

//! The two axes describing the state of a resource.
//!
//! The provider reports the state of a resource on two independent axes:
//! [Availability] says whether the resource can be used at all, and
//! [InstanceRuntimeStatus] says whether a compute instance is running. Both
//! values change asynchronously, driven by the provider.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// The availability of a resource.
///
/// Names the provider does not document yet parse as
/// [Unknown][Availability::Unknown].
///
/// # Example
/// ```
/// # use stratus_waiter::state::Availability;
/// let a: Availability = "migrating".parse().unwrap();
/// assert_eq!(a, Availability::Migrating);
/// let a: Availability = "hibernating".parse().unwrap();
/// assert_eq!(a, Availability::Unknown);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Availability {
    Available,
    Uploading,
    Failed,
    Migrating,
    Transferring,
    Discontinued,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Availability {
    /// The name used by the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Uploading => "uploading",
            Self::Failed => "failed",
            Self::Migrating => "migrating",
            Self::Transferring => "transferring",
            Self::Discontinued => "discontinued",
        }
    }
}

impl FromStr for Availability {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = match s {
            "available" => Self::Available,
            "uploading" => Self::Uploading,
            "failed" => Self::Failed,
            "migrating" => Self::Migrating,
            "transferring" => Self::Transferring,
            "discontinued" => Self::Discontinued,
            _ => Self::Unknown,
        };
        Ok(v)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The runtime status of a compute instance.
///
/// Unrecognized names parse as [Unknown][InstanceRuntimeStatus::Unknown].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum InstanceRuntimeStatus {
    Up,
    Cleaning,
    Down,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstanceRuntimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Up => "up",
            Self::Cleaning => "cleaning",
            Self::Down => "down",
        }
    }
}

impl FromStr for InstanceRuntimeStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = match s {
            "up" => Self::Up,
            "cleaning" => Self::Cleaning,
            "down" => Self::Down,
            _ => Self::Unknown,
        };
        Ok(v)
    }
}

impl std::fmt::Display for InstanceRuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource whose state can be awaited.
///
/// Implement this trait for the resource types returned by the service, so the
/// waiter can return them directly. Either axis may be absent: a volume has no
/// instance status, for example.
pub trait ResourceState {
    fn availability(&self) -> Option<Availability>;

    fn instance_status(&self) -> Option<InstanceRuntimeStatus>;

    /// Returns true if the resource reached a failed state.
    fn is_failed(&self) -> bool {
        self.availability() == Some(Availability::Failed)
    }
}

/// The state of a resource at one point in time.
///
/// # Example
/// ```
/// # use stratus_waiter::state::*;
/// let snapshot: StateSnapshot = serde_json::from_str(
///     r#"{"availability": "available", "instanceStatus": "up"}"#,
/// )?;
/// assert_eq!(snapshot.availability(), Some(Availability::Available));
/// assert_eq!(snapshot.instance_status(), Some(InstanceRuntimeStatus::Up));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    availability: Option<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_status: Option<InstanceRuntimeStatus>,
}

impl StateSnapshot {
    /// A snapshot reporting neither axis.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_availability(mut self, v: Availability) -> Self {
        self.availability = Some(v);
        self
    }

    pub fn with_instance_status(mut self, v: InstanceRuntimeStatus) -> Self {
        self.instance_status = Some(v);
        self
    }
}

impl ResourceState for StateSnapshot {
    fn availability(&self) -> Option<Availability> {
        self.availability
    }

    fn instance_status(&self) -> Option<InstanceRuntimeStatus> {
        self.instance_status
    }
}

impl From<Availability> for StateSnapshot {
    fn from(value: Availability) -> Self {
        Self::new().with_availability(value)
    }
}

impl From<InstanceRuntimeStatus> for StateSnapshot {
    fn from(value: InstanceRuntimeStatus) -> Self {
        Self::new().with_instance_status(value)
    }
}
