//! Core types for fleet autoscaling.
//!
//! - [`FleetState`]: replica counts of a fleet as observed by the controller
//! - [`BufferSize`] / [`BufferPolicy`]: how much spare capacity to keep
//! - [`FleetAutoscaler`]: an autoscaler resource bound to one fleet
//! - [`AutoscalerStatus`]: the last published decision of an autoscaler

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AutoscalerError, Result};

/// Observed replica counts of a fleet.
///
/// Callers are expected to pass states where `allocated_replicas` does not
/// exceed `status_replicas` or `spec_replicas`; the policy engine does not
/// clamp violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetState {
    /// Fleet name.
    pub name: String,
    /// Fleet namespace.
    pub namespace: String,
    /// Desired replica count declared on the fleet.
    #[serde(default)]
    pub spec_replicas: u32,
    /// Replicas that currently exist.
    #[serde(default)]
    pub status_replicas: u32,
    /// Replicas ready to be allocated.
    #[serde(default)]
    pub ready_replicas: u32,
    /// Replicas in active use.
    #[serde(default)]
    pub allocated_replicas: u32,
    /// Replicas held in reserve.
    #[serde(default)]
    pub reserved_replicas: u32,
}

impl FleetState {
    /// Creates an empty fleet state with the given identity.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Sets the allocated replica count.
    #[must_use]
    pub const fn with_allocated(mut self, allocated: u32) -> Self {
        self.allocated_replicas = allocated;
        self
    }

    /// Sets the current (status) replica count.
    #[must_use]
    pub const fn with_replicas(mut self, replicas: u32) -> Self {
        self.status_replicas = replicas;
        self
    }

    /// Sets the declared (spec) replica count.
    #[must_use]
    pub const fn with_spec_replicas(mut self, replicas: u32) -> Self {
        self.spec_replicas = replicas;
        self
    }

    /// Sets the ready replica count.
    #[must_use]
    pub const fn with_ready(mut self, ready: u32) -> Self {
        self.ready_replicas = ready;
        self
    }
}

/// Amount of spare capacity a buffer policy keeps.
///
/// Serialized the way operators write it: an integer for an absolute count,
/// or a string ending in `%` for a percentage of the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBufferSize", into = "RawBufferSize")]
pub enum BufferSize {
    /// Keep this many non-allocated replicas.
    Count(u32),
    /// Keep this percentage (0 inclusive to 100 exclusive) of the fleet non-allocated.
    Percentage(f64),
}

impl BufferSize {
    /// Creates a percentage buffer size, validating its range.
    ///
    /// # Errors
    ///
    /// Returns error if the percentage is not finite or outside `[0, 100)`.
    pub fn percentage(percent: f64) -> Result<Self> {
        let size = Self::Percentage(percent);
        size.validate()?;
        Ok(size)
    }

    /// Checks that a percentage lies in `[0, 100)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBufferSize` for out-of-range percentages.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Count(_) => Ok(()),
            Self::Percentage(p) if p.is_finite() && (0.0..100.0).contains(p) => Ok(()),
            Self::Percentage(p) => Err(AutoscalerError::InvalidBufferSize {
                value: format!("{p}%"),
                reason: "percentage must be at least 0 and below 100".into(),
            }),
        }
    }

    /// Returns true for percentage buffers.
    #[must_use]
    pub const fn is_percentage(&self) -> bool {
        matches!(self, Self::Percentage(_))
    }

    /// Returns the numeric value (count or percent).
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Count(n) => f64::from(*n),
            Self::Percentage(p) => *p,
        }
    }
}

impl fmt::Display for BufferSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Percentage(p) => write!(f, "{p}%"),
        }
    }
}

impl FromStr for BufferSize {
    type Err = AutoscalerError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = |reason: &str| AutoscalerError::InvalidBufferSize {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(number) = trimmed.strip_suffix('%') {
            let percent: f64 = number
                .trim()
                .parse()
                .map_err(|_| invalid("percentage is not a number"))?;
            return Self::percentage(percent).map_err(|_| {
                invalid("percentage must be at least 0 and below 100")
            });
        }

        trimmed
            .parse::<u32>()
            .map(Self::Count)
            .map_err(|_| invalid("expected a non-negative integer or a percentage such as '10%'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawBufferSize {
    Int(u32),
    Str(String),
}

impl TryFrom<RawBufferSize> for BufferSize {
    type Error = AutoscalerError;

    fn try_from(raw: RawBufferSize) -> Result<Self> {
        match raw {
            RawBufferSize::Int(n) => Ok(Self::Count(n)),
            RawBufferSize::Str(s) => s.parse(),
        }
    }
}

impl From<BufferSize> for RawBufferSize {
    fn from(size: BufferSize) -> Self {
        match size {
            BufferSize::Count(n) => Self::Int(n),
            BufferSize::Percentage(_) => Self::Str(size.to_string()),
        }
    }
}

/// A buffer autoscaling policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferPolicy {
    /// Spare capacity to maintain.
    pub buffer_size: BufferSize,
    /// Never recommend fewer replicas than this.
    #[serde(default)]
    pub min_replicas: u32,
    /// Never recommend more replicas than this.
    pub max_replicas: u32,
}

impl BufferPolicy {
    /// Creates a new buffer policy.
    #[must_use]
    pub const fn new(buffer_size: BufferSize, min_replicas: u32, max_replicas: u32) -> Self {
        Self {
            buffer_size,
            min_replicas,
            max_replicas,
        }
    }

    /// Validates this policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if `min_replicas > max_replicas` or the buffer
    /// size is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.min_replicas > self.max_replicas {
            return Err(AutoscalerError::InvalidPolicy {
                reason: format!(
                    "min_replicas ({}) cannot exceed max_replicas ({})",
                    self.min_replicas, self.max_replicas
                ),
            });
        }

        self.buffer_size
            .validate()
            .map_err(|e| AutoscalerError::InvalidPolicy {
                reason: e.to_string(),
            })
    }
}

/// Status published by a fleet autoscaler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalerStatus {
    /// Replicas the fleet currently has.
    pub current_replicas: u32,
    /// Replicas the autoscaler wants the fleet to have.
    pub desired_replicas: u32,
    /// Whether the autoscaler could compute a decision.
    pub able_to_scale: bool,
    /// Whether the decision was clamped by the policy limits.
    pub scaling_limited: bool,
}

/// An autoscaler resource targeting a single fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetAutoscaler {
    /// Autoscaler name.
    pub name: String,
    /// Autoscaler namespace.
    pub namespace: String,
    /// Name of the fleet being scaled.
    pub fleet_name: String,
    /// Buffer policy, when one is configured.
    #[serde(default)]
    pub buffer: Option<BufferPolicy>,
    /// Last published status.
    #[serde(default)]
    pub status: AutoscalerStatus,
    /// Set once the resource is pending deletion.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl FleetAutoscaler {
    /// Creates an autoscaler for the given fleet with no policy.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        fleet_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            fleet_name: fleet_name.into(),
            buffer: None,
            status: AutoscalerStatus::default(),
            deletion_timestamp: None,
        }
    }

    /// Attaches a buffer policy.
    #[must_use]
    pub const fn with_buffer(mut self, policy: BufferPolicy) -> Self {
        self.buffer = Some(policy);
        self
    }

    /// Replaces the status.
    #[must_use]
    pub const fn with_status(mut self, status: AutoscalerStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns true once the resource is pending deletion.
    #[must_use]
    pub const fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}
