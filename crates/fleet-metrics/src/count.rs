//! Game server counts per state and fleet.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::sink::{Measurement, MetricsSink, TagKey, Tags};
use crate::types::{GameServer, GameServerState, NONE_VALUE};

/// Fleet identity used to group counts. Absent parts are `"none"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FleetKey {
    /// Owning fleet name.
    pub fleet_name: String,
    /// Namespace.
    pub namespace: String,
}

impl FleetKey {
    /// Builds a key, substituting `"none"` for empty parts.
    #[must_use]
    pub fn new(fleet_name: &str, namespace: &str) -> Self {
        let or_none = |s: &str| {
            if s.is_empty() {
                NONE_VALUE.to_string()
            } else {
                s.to_string()
            }
        };
        Self {
            fleet_name: or_none(fleet_name),
            namespace: or_none(namespace),
        }
    }

    /// Key for a game server's owning fleet.
    #[must_use]
    pub fn of(gs: &GameServer) -> Self {
        Self::new(gs.fleet_or_none(), &gs.namespace)
    }
}

/// Counts of game servers grouped by `(state, fleet)`.
///
/// The table is rebuilt from a full snapshot on every reconciliation tick.
/// Categories that empty out stay in the table at zero so they are published
/// as zero, unless the sink can delete them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameServerCount {
    counts: BTreeMap<(FleetKey, GameServerState), u64>,
}

impl GameServerCount {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to a category.
    pub fn increment(&mut self, key: FleetKey, state: GameServerState) {
        *self.counts.entry((key, state)).or_insert(0) += 1;
    }

    /// Sets every known category to zero.
    pub fn reset(&mut self) {
        self.counts.values_mut().for_each(|count| *count = 0);
    }

    /// Resets, then counts every game server in `snapshot`.
    pub fn increment_for_snapshot(&mut self, snapshot: &[GameServer]) {
        self.reset();
        for gs in snapshot {
            self.increment(FleetKey::of(gs), gs.state);
        }
    }

    /// Count for one category, zero if never seen.
    #[must_use]
    pub fn get(&self, key: &FleetKey, state: GameServerState) -> u64 {
        self.counts
            .get(&(key.clone(), state))
            .copied()
            .unwrap_or_default()
    }

    /// Iterates over categories in `(fleet, state)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&FleetKey, GameServerState, u64)> {
        self.counts
            .iter()
            .map(|((key, state), count)| (key, *state, *count))
    }

    /// Number of categories in the table, including zeroed ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no category has ever been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Publishes every category to `sink`.
    ///
    /// Zeroed categories are deleted from the sink and dropped from the
    /// table when the sink supports deletion, and published as zero
    /// otherwise. A category whose deletion fails stays in the table so the
    /// next tick retries it. Every category is attempted even when some fail.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated.
    #[allow(clippy::cast_precision_loss)] // Counts are far below 2^52
    pub fn record(&mut self, sink: &dyn MetricsSink) -> Result<()> {
        let deleting = sink.supports_deletion();
        let mut errors = Vec::new();
        let mut emptied = Vec::new();

        for ((key, state), count) in &self.counts {
            let tags = Tags::new()
                .with(TagKey::Type, state.as_str())
                .with(TagKey::FleetName, key.fleet_name.as_str())
                .with(TagKey::Namespace, key.namespace.as_str());

            if deleting && *count == 0 {
                match sink.delete(Measurement::GameServerCount, &tags) {
                    Ok(()) => emptied.push((key.clone(), *state)),
                    Err(e) => errors.push(e),
                }
            } else if let Err(e) = sink.record(Measurement::GameServerCount, &tags, *count as f64) {
                errors.push(e);
            }
        }

        for category in emptied {
            self.counts.remove(&category);
        }
        debug!(categories = self.counts.len(), "published gameserver counts");
        MetricsError::aggregate(errors)
    }
}
