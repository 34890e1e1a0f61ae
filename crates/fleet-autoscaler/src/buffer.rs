//! Buffer policy evaluation.
//!
//! A buffer policy keeps a fixed amount of non-allocated capacity on top of
//! whatever is currently allocated. The engine is a pure function of the
//! policy and the observed fleet state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AutoscalerError, Result};
use crate::types::{AutoscalerStatus, BufferPolicy, BufferSize, FleetAutoscaler, FleetState};

/// Outcome of applying a buffer policy to a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleDecision {
    /// Replica count the fleet should be scaled to.
    pub target_replicas: u32,
    /// Whether the target was clamped by the policy's limits.
    pub limited: bool,
}

impl ScaleDecision {
    /// A decision that keeps the fleet at its current size.
    #[must_use]
    pub const fn hold(fleet: &FleetState) -> Self {
        Self {
            target_replicas: fleet.status_replicas,
            limited: false,
        }
    }
}

/// Computes the target replica count for a fleet under a buffer policy.
///
/// Count buffers target `allocated + n`. Percentage buffers target the
/// smallest replica count whose non-allocated share is within two percentage
/// points of `p`, or the smallest count holding at least `p` percent spare
/// when no count lands that close.
/// The result is clamped to `[min_replicas, max_replicas]`, and never drops
/// below the fleet's allocated replicas.
///
/// # Errors
///
/// Returns `InvalidPolicy` if `min_replicas > max_replicas` or the buffer size
/// is out of range.
pub fn apply_buffer_policy(policy: &BufferPolicy, fleet: &FleetState) -> Result<ScaleDecision> {
    policy.validate()?;

    let allocated = fleet.allocated_replicas;
    let desired = match policy.buffer_size {
        BufferSize::Count(n) => allocated.saturating_add(n),
        BufferSize::Percentage(p) => percentage_target(allocated, p),
    };

    let (mut target, mut limited) = if desired < policy.min_replicas {
        (policy.min_replicas, true)
    } else if desired > policy.max_replicas {
        (policy.max_replicas, true)
    } else {
        (desired, false)
    };

    // Allocated capacity is never slated for removal, even past max_replicas.
    if target < allocated {
        target = allocated;
        limited = true;
    }

    debug!(
        fleet = %fleet.name,
        buffer = %policy.buffer_size,
        allocated,
        desired,
        target,
        limited,
        "applied buffer policy"
    );

    Ok(ScaleDecision {
        target_replicas: target,
        limited,
    })
}

/// Applies a policy, falling back to holding the fleet at its current size.
///
/// This is the shape the autoscaler controller consumes: a decision is always
/// produced, and an invalid policy additionally reports its error.
#[must_use]
pub fn apply_or_hold(
    policy: &BufferPolicy,
    fleet: &FleetState,
) -> (ScaleDecision, Option<AutoscalerError>) {
    match apply_buffer_policy(policy, fleet) {
        Ok(decision) => (decision, None),
        Err(e) => (ScaleDecision::hold(fleet), Some(e)),
    }
}

/// Derives the next status of an autoscaler from its fleet's state.
///
/// Autoscalers without a buffer policy, or with an invalid one, are reported
/// as unable to scale with the desired count equal to the current count.
#[must_use]
pub fn evaluate(autoscaler: &FleetAutoscaler, fleet: &FleetState) -> AutoscalerStatus {
    let Some(policy) = autoscaler.buffer.as_ref() else {
        debug!(autoscaler = %autoscaler.name, "no buffer policy configured");
        return AutoscalerStatus {
            current_replicas: fleet.status_replicas,
            desired_replicas: fleet.status_replicas,
            able_to_scale: false,
            scaling_limited: false,
        };
    };

    let (decision, error) = apply_or_hold(policy, fleet);
    if let Some(e) = &error {
        debug!(autoscaler = %autoscaler.name, error = %e, "holding fleet size");
    }

    AutoscalerStatus {
        current_replicas: fleet.status_replicas,
        desired_replicas: decision.target_replicas,
        able_to_scale: error.is_none(),
        scaling_limited: decision.limited,
    }
}

/// Allowed distance between the realized buffer fraction and the requested one.
const PERCENTAGE_TOLERANCE: f64 = 0.02;

/// Absorbs float representation error in fraction comparisons.
const EPSILON: f64 = 1e-9;

/// Smallest `t >= allocated` whose buffer fraction `(t - allocated) / t` is
/// within [`PERCENTAGE_TOLERANCE`] of `percent / 100`.
///
/// The fraction grows with `t`, so the first candidate is the lower edge of the
/// tolerance window. When no integer falls inside the window the smallest `t`
/// that is not under-buffered is used instead.
fn percentage_target(allocated: u32, percent: f64) -> u32 {
    if allocated == 0 || percent <= 0.0 {
        return allocated;
    }

    let wanted = percent / 100.0;
    let lowest = f64::from(allocated) / (1.0 - wanted + PERCENTAGE_TOLERANCE);
    let candidate = to_replicas((lowest - EPSILON).ceil()).max(allocated);
    if within_tolerance(allocated, candidate, wanted) {
        return candidate;
    }

    let exact = f64::from(allocated) / (1.0 - wanted);
    to_replicas((exact - EPSILON).ceil()).max(allocated)
}

fn within_tolerance(allocated: u32, target: u32, wanted: f64) -> bool {
    if target == 0 {
        return false;
    }
    let realized = f64::from(target - allocated) / f64::from(target);
    (realized - wanted).abs() <= PERCENTAGE_TOLERANCE + EPSILON
}

fn to_replicas(value: f64) -> u32 {
    if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value as u32
    }
}
