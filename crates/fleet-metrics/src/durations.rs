//! Per-game-server state dwell tracking.
//!
//! For every live game server the tracker remembers when it entered each
//! state it has been seen in. On a transition it returns how long the server
//! stayed in the state it is leaving. Entities are forgotten when they reach
//! the terminal state, when they are deleted, or when a reconciliation pass
//! no longer lists them.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{MetricsError, Result};
use crate::types::GameServerState;

#[derive(Debug, Clone, Copy, Default)]
struct StateSlots([Option<f64>; GameServerState::COUNT]);

impl StateSlots {
    fn entered(state: GameServerState, at: f64) -> Self {
        let mut slots = Self::default();
        slots.0[state.index()] = Some(at);
        slots
    }

    fn get(&self, state: GameServerState) -> Option<f64> {
        self.0[state.index()]
    }

    fn set(&mut self, state: GameServerState, at: f64) {
        self.0[state.index()] = Some(at);
    }

    fn take(&mut self, state: GameServerState) -> Option<f64> {
        self.0[state.index()].take()
    }
}

fn miss(name: &str, state: GameServerState) -> MetricsError {
    MetricsError::DurationLookupMiss {
        key: format!("{name}/{state}"),
    }
}

/// Tracks when each game server entered each of its states.
///
/// Entities are identified by an opaque key; the controller uses
/// [`GameServer::key`](crate::types::GameServer::key).
/// Timestamps are seconds on a caller-supplied monotonic clock. Every method
/// takes `&self`; the map sits behind a single mutex so that the watch path
/// and the reconciliation path can share one tracker.
#[derive(Debug, Default)]
pub struct StateDurationTracker {
    entries: Mutex<HashMap<String, StateSlots>>,
}

impl StateDurationTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transition from `old` to `new` at `elapsed` seconds.
    ///
    /// Returns the dwell time in `old` when it is known, `None` when this is
    /// the first time the entity is seen. A transition into the terminal
    /// state removes the entity.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::DurationLookupMiss`] when the entity is known
    /// but has no entry for `old`, or when it reaches the terminal state
    /// without one.
    pub fn record(
        &self,
        name: &str,
        new: GameServerState,
        old: GameServerState,
        elapsed: f64,
    ) -> Result<Option<f64>> {
        let mut entries = self.entries.lock();

        if new.is_terminal() {
            let entered = entries.remove(name).and_then(|slots| slots.get(old));
            return match entered {
                Some(at) => Ok(Some((elapsed - at).max(0.0))),
                None => Err(miss(name, old)),
            };
        }

        let Some(slots) = entries.get_mut(name) else {
            entries.insert(name.to_string(), StateSlots::entered(new, elapsed));
            trace!(gameserver = name, state = %new, "tracking new gameserver");
            return Ok(None);
        };

        let entered = slots.take(old);
        slots.set(new, elapsed);
        entered
            .map(|at| Some((elapsed - at).max(0.0)))
            .ok_or_else(|| miss(name, old))
    }

    /// Notes that `name` is currently in `state` without overwriting an
    /// existing entry.
    pub fn observe(&self, name: &str, state: GameServerState, elapsed: f64) {
        if state.is_terminal() {
            return;
        }
        let mut entries = self.entries.lock();
        let slots = entries.entry(name.to_string()).or_default();
        if slots.get(state).is_none() {
            slots.set(state, elapsed);
        }
    }

    /// Drops all state for `name`.
    pub fn forget(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Drops every entity not in `live` and returns how many were removed.
    pub fn retain_active(&self, live: &HashSet<&str>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|name, _| live.contains(name.as_str()));
        before - entries.len()
    }

    /// When `name` entered `state`, if tracked.
    #[must_use]
    pub fn entered_at(&self, name: &str, state: GameServerState) -> Option<f64> {
        self.entries
            .lock()
            .get(name)
            .and_then(|slots| slots.get(state))
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no entity is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GameServerState::{Allocated, Creating, Ready, Scheduled, Shutdown};

    #[test]
    fn first_sighting_returns_none() {
        let tracker = StateDurationTracker::new();
        let dwell = tracker.record("gs-1", Ready, Creating, 10.0).expect("record");
        assert_eq!(dwell, None);
        assert_eq!(tracker.entered_at("gs-1", Ready), Some(10.0));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn transition_returns_dwell_in_old_state() {
        let tracker = StateDurationTracker::new();
        tracker.record("gs-1", Ready, Scheduled, 100.0).expect("enter");
        let dwell = tracker
            .record("gs-1", Allocated, Ready, 130.0)
            .expect("transition");
        assert_eq!(dwell, Some(30.0));
        assert_eq!(tracker.entered_at("gs-1", Ready), None);
        assert_eq!(tracker.entered_at("gs-1", Allocated), Some(130.0));
    }

    #[test]
    fn shutdown_reports_dwell_and_removes() {
        let tracker = StateDurationTracker::new();
        tracker.record("gs-1", Allocated, Ready, 5.0).expect("enter");
        let dwell = tracker
            .record("gs-1", Shutdown, Allocated, 65.0)
            .expect("shutdown");
        assert_eq!(dwell, Some(60.0));
        assert!(tracker.is_empty());
    }

    #[test]
    fn repeated_shutdown_is_a_miss() {
        let tracker = StateDurationTracker::new();
        tracker.record("gs-1", Allocated, Ready, 5.0).expect("enter");
        tracker
            .record("gs-1", Shutdown, Allocated, 10.0)
            .expect("shutdown");
        let err = tracker
            .record("gs-1", Shutdown, Allocated, 11.0)
            .expect_err("second shutdown");
        assert!(matches!(
            err,
            MetricsError::DurationLookupMiss { ref key } if key == "gs-1/Allocated"
        ));
        assert!(tracker.is_empty());
    }

    #[test]
    fn known_entity_without_old_slot_is_a_miss() {
        let tracker = StateDurationTracker::new();
        tracker.record("gs-1", Ready, Scheduled, 1.0).expect("enter");
        let err = tracker
            .record("gs-1", Allocated, Scheduled, 2.0)
            .expect_err("miss");
        assert_eq!(err.to_string(), "duration lookup miss: no entry for gs-1/Scheduled");
        assert_eq!(tracker.entered_at("gs-1", Allocated), Some(2.0));
    }

    #[test]
    fn clock_regression_clamps_to_zero() {
        let tracker = StateDurationTracker::new();
        tracker.record("gs-1", Ready, Scheduled, 50.0).expect("enter");
        let dwell = tracker
            .record("gs-1", Allocated, Ready, 40.0)
            .expect("transition");
        assert_eq!(dwell, Some(0.0));
    }

    #[test]
    fn observe_seeds_without_overwriting() {
        let tracker = StateDurationTracker::new();
        tracker.observe("gs-1", Ready, 3.0);
        tracker.observe("gs-1", Ready, 9.0);
        assert_eq!(tracker.entered_at("gs-1", Ready), Some(3.0));

        tracker.observe("gs-2", Shutdown, 3.0);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn forget_and_retain_prune_entities() {
        let tracker = StateDurationTracker::new();
        for name in ["gs-1", "gs-2", "gs-3"] {
            tracker.observe(name, Ready, 0.0);
        }
        assert!(tracker.forget("gs-1"));
        assert!(!tracker.forget("gs-1"));

        let live: HashSet<&str> = std::iter::once("gs-2").collect();
        assert_eq!(tracker.retain_active(&live), 1);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.entered_at("gs-2", Ready), Some(0.0));
    }
}
