//! Node occupancy derived from a game server and node snapshot.

use std::collections::{BTreeMap, HashMap};

use crate::error::{MetricsError, Result};
use crate::sink::{Measurement, MetricsSink, TagKey, Tags};
use crate::types::{GameServer, Node};

/// How many eligible nodes host game servers, and how many each hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOccupancy {
    /// Eligible nodes hosting no game server.
    pub empty: usize,
    /// Eligible nodes hosting at least one game server.
    pub occupied: usize,
    /// Game servers per eligible node, zero included.
    pub per_node: BTreeMap<String, u64>,
}

impl NodeOccupancy {
    /// Joins game servers to nodes by node name.
    ///
    /// Nodes carrying a taint whose key starts with `system_prefix` are
    /// excluded, as are game servers on nodes that are not listed.
    #[must_use]
    pub fn compute(gameservers: &[GameServer], nodes: &[Node], system_prefix: &str) -> Self {
        let mut hosted: HashMap<&str, u64> = HashMap::new();
        for gs in gameservers {
            if let Some(node) = gs.node_name.as_deref().filter(|n| !n.is_empty()) {
                *hosted.entry(node).or_insert(0) += 1;
            }
        }

        let per_node: BTreeMap<String, u64> = nodes
            .iter()
            .filter(|node| !node.is_system(system_prefix))
            .map(|node| {
                let count = hosted.get(node.name.as_str()).copied().unwrap_or(0);
                (node.name.clone(), count)
            })
            .collect();

        let occupied = per_node.values().filter(|count| **count > 0).count();
        Self {
            empty: per_node.len() - occupied,
            occupied,
            per_node,
        }
    }

    /// Number of eligible nodes.
    #[must_use]
    pub fn eligible(&self) -> usize {
        self.per_node.len()
    }

    /// Publishes node counts tagged by emptiness and one per-node sample
    /// for every eligible node.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated.
    #[allow(clippy::cast_precision_loss)] // Node and game server counts are far below 2^52
    pub fn record(&self, sink: &dyn MetricsSink) -> Result<()> {
        let mut errors = Vec::new();

        for (empty, count) in [("true", self.empty), ("false", self.occupied)] {
            let tags = Tags::new().with(TagKey::Empty, empty);
            if let Err(e) = sink.record(Measurement::NodeCount, &tags, count as f64) {
                errors.push(e);
            }
        }

        let untagged = Tags::new();
        for count in self.per_node.values() {
            if let Err(e) = sink.record(Measurement::GameServersPerNode, &untagged, *count as f64) {
                errors.push(e);
            }
        }

        MetricsError::aggregate(errors)
    }
}
