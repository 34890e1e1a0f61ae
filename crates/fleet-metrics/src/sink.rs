//! The metrics sink interface and an in-memory implementation.
//!
//! The controller publishes every number through [`MetricsSink`], a
//! tag-dimensioned recording interface. Sinks that cannot delete a series
//! report `supports_deletion() == false`; callers then republish emptied
//! series as zero instead of removing them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{MetricsError, Result};

/// How a measurement aggregates recorded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    /// Last value wins.
    Gauge,
    /// Values are summed.
    Counter,
    /// Each value is a sample of a distribution.
    Distribution,
}

/// Every series the controller publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Measurement {
    /// Fleet replicas by type (total, allocated, ready, desired).
    FleetReplicas,
    /// Replicas the autoscaler observed on its fleet.
    AutoscalerCurrentReplicas,
    /// Replicas the autoscaler wants.
    AutoscalerDesiredReplicas,
    /// 1 when the autoscaler can scale.
    AutoscalerAbleToScale,
    /// 1 when the autoscaler's decision was clamped.
    AutoscalerLimited,
    /// Buffer policy min/max replica limits.
    AutoscalerBufferLimits,
    /// Buffer policy size, tagged as count or percentage.
    AutoscalerBufferSize,
    /// Game servers per state and fleet.
    GameServerCount,
    /// Game server state transitions per new state and fleet.
    GameServerStateTransitions,
    /// Seconds from creation until a game server became ready.
    GameServerReadyDuration,
    /// Seconds a game server spent in a state before leaving it.
    GameServerStateDuration,
    /// Eligible nodes, tagged by whether they host no game servers.
    NodeCount,
    /// Game servers hosted per eligible node.
    GameServersPerNode,
}

impl Measurement {
    /// Every measurement.
    pub const ALL: [Self; 13] = [
        Self::FleetReplicas,
        Self::AutoscalerCurrentReplicas,
        Self::AutoscalerDesiredReplicas,
        Self::AutoscalerAbleToScale,
        Self::AutoscalerLimited,
        Self::AutoscalerBufferLimits,
        Self::AutoscalerBufferSize,
        Self::GameServerCount,
        Self::GameServerStateTransitions,
        Self::GameServerReadyDuration,
        Self::GameServerStateDuration,
        Self::NodeCount,
        Self::GameServersPerNode,
    ];

    /// Series name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FleetReplicas => "fleets_replicas_count",
            Self::AutoscalerCurrentReplicas => "fleet_autoscalers_current_replicas_count",
            Self::AutoscalerDesiredReplicas => "fleet_autoscalers_desired_replicas_count",
            Self::AutoscalerAbleToScale => "fleet_autoscalers_able_to_scale",
            Self::AutoscalerLimited => "fleet_autoscalers_limited",
            Self::AutoscalerBufferLimits => "fleet_autoscalers_buffer_limits",
            Self::AutoscalerBufferSize => "fleet_autoscalers_buffer_size",
            Self::GameServerCount => "gameservers_count",
            Self::GameServerStateTransitions => "gameserver_state_transitions",
            Self::GameServerReadyDuration => "gameserver_ready_duration_seconds",
            Self::GameServerStateDuration => "gameserver_state_duration_seconds",
            Self::NodeCount => "nodes_count",
            Self::GameServersPerNode => "gameservers_node_count",
        }
    }

    /// Series description.
    #[must_use]
    pub const fn help(&self) -> &'static str {
        match self {
            Self::FleetReplicas => "The number of replicas per fleet",
            Self::AutoscalerCurrentReplicas => "The current replicas count as seen by autoscalers",
            Self::AutoscalerDesiredReplicas => "The desired replicas count as seen by autoscalers",
            Self::AutoscalerAbleToScale => "The fleet autoscaler can access the fleet to scale",
            Self::AutoscalerLimited => "The fleet autoscaler is capped",
            Self::AutoscalerBufferLimits => "The limits of buffer based fleet autoscalers",
            Self::AutoscalerBufferSize => "The buffer size of fleet autoscalers",
            Self::GameServerCount => "The number of gameservers per state and fleet",
            Self::GameServerStateTransitions => "The total of gameserver state transitions",
            Self::GameServerReadyDuration => "Seconds taken by a gameserver to become ready",
            Self::GameServerStateDuration => "Seconds a gameserver spent in a state",
            Self::NodeCount => "The count of nodes, empty or hosting gameservers",
            Self::GameServersPerNode => "The number of gameservers per node",
        }
    }

    /// Aggregation kind.
    #[must_use]
    pub const fn kind(&self) -> MeasurementKind {
        match self {
            Self::GameServerStateTransitions => MeasurementKind::Counter,
            Self::GameServerReadyDuration
            | Self::GameServerStateDuration
            | Self::GameServersPerNode => MeasurementKind::Distribution,
            _ => MeasurementKind::Gauge,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tag dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKey {
    /// Sub-type of the measurement (state, replica type, limit type).
    Type,
    /// Resource name.
    Name,
    /// Owning fleet name.
    FleetName,
    /// Namespace.
    Namespace,
    /// Node occupancy flag.
    Empty,
}

impl TagKey {
    /// Tag name as published.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Name => "name",
            Self::FleetName => "fleet_name",
            Self::Namespace => "namespace",
            Self::Empty => "empty",
        }
    }
}

/// An ordered set of tag values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tags(BTreeMap<TagKey, String>);

impl Tags {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tag and returns self for chaining.
    #[must_use]
    pub fn with(mut self, key: TagKey, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    /// Returns the value of a tag.
    #[must_use]
    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Iterates over tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no tags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Destination for published measurements.
pub trait MetricsSink: Send + Sync {
    /// Records one value for a measurement under the given tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the recording.
    fn record(&self, measurement: Measurement, tags: &Tags, value: f64) -> Result<()>;

    /// Whether previously published series can be deleted.
    fn supports_deletion(&self) -> bool {
        false
    }

    /// Deletes a previously published series.
    ///
    /// # Errors
    ///
    /// The default implementation always fails; sinks that return `true`
    /// from [`supports_deletion`](Self::supports_deletion) override it.
    fn delete(&self, measurement: Measurement, _tags: &Tags) -> Result<()> {
        Err(MetricsError::Record {
            measurement: measurement.to_string(),
            reason: "sink does not support deleting series".to_string(),
        })
    }
}

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn record(&self, measurement: Measurement, tags: &Tags, value: f64) -> Result<()> {
        (**self).record(measurement, tags, value)
    }

    fn supports_deletion(&self) -> bool {
        (**self).supports_deletion()
    }

    fn delete(&self, measurement: Measurement, tags: &Tags) -> Result<()> {
        (**self).delete(measurement, tags)
    }
}

/// A recorded series value.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    /// Last recorded gauge value.
    Gauge(f64),
    /// Running counter total.
    Counter(f64),
    /// All recorded samples.
    Distribution(Vec<f64>),
}

/// In-memory sink for tests and offline replays.
#[derive(Debug, Default)]
pub struct InMemorySink {
    series: RwLock<HashMap<(Measurement, Tags), SeriesValue>>,
    supports_deletion: bool,
    rejected: RwLock<Vec<Measurement>>,
}

impl InMemorySink {
    /// Creates a sink that cannot delete series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that can delete series.
    #[must_use]
    pub fn with_deletion() -> Self {
        Self {
            supports_deletion: true,
            ..Self::default()
        }
    }

    /// Makes every future recording of `measurement` fail.
    pub fn reject(&self, measurement: Measurement) {
        self.rejected.write().push(measurement);
    }

    fn check_accepted(&self, measurement: Measurement) -> Result<()> {
        if self.rejected.read().contains(&measurement) {
            return Err(MetricsError::Record {
                measurement: measurement.to_string(),
                reason: "rejected by sink".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the last value of a gauge series.
    #[must_use]
    pub fn gauge(&self, measurement: Measurement, tags: &Tags) -> Option<f64> {
        match self.series.read().get(&(measurement, tags.clone())) {
            Some(SeriesValue::Gauge(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the total of a counter series.
    #[must_use]
    pub fn counter(&self, measurement: Measurement, tags: &Tags) -> Option<f64> {
        match self.series.read().get(&(measurement, tags.clone())) {
            Some(SeriesValue::Counter(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the samples of a distribution series.
    #[must_use]
    pub fn samples(&self, measurement: Measurement, tags: &Tags) -> Vec<f64> {
        match self.series.read().get(&(measurement, tags.clone())) {
            Some(SeriesValue::Distribution(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns every series of a measurement, ordered by tags.
    #[must_use]
    pub fn series(&self, measurement: Measurement) -> Vec<(Tags, SeriesValue)> {
        let mut found: Vec<_> = self
            .series
            .read()
            .iter()
            .filter(|((m, _), _)| *m == measurement)
            .map(|((_, tags), value)| (tags.clone(), value.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    /// Number of distinct series recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }
}

impl MetricsSink for InMemorySink {
    fn record(&self, measurement: Measurement, tags: &Tags, value: f64) -> Result<()> {
        self.check_accepted(measurement)?;

        let mut series = self.series.write();
        let key = (measurement, tags.clone());
        match measurement.kind() {
            MeasurementKind::Gauge => {
                series.insert(key, SeriesValue::Gauge(value));
            }
            MeasurementKind::Counter => {
                let current = series.entry(key).or_insert(SeriesValue::Counter(0.0));
                if let SeriesValue::Counter(total) = current {
                    *total += value;
                }
            }
            MeasurementKind::Distribution => {
                let current = series
                    .entry(key)
                    .or_insert_with(|| SeriesValue::Distribution(Vec::new()));
                if let SeriesValue::Distribution(samples) = current {
                    samples.push(value);
                }
            }
        }
        Ok(())
    }

    fn supports_deletion(&self) -> bool {
        self.supports_deletion
    }

    fn delete(&self, measurement: Measurement, tags: &Tags) -> Result<()> {
        if !self.supports_deletion {
            return Err(MetricsError::Record {
                measurement: measurement.to_string(),
                reason: "sink does not support deleting series".to_string(),
            });
        }
        self.check_accepted(measurement)?;
        self.series.write().remove(&(measurement, tags.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(state: &str) -> Tags {
        Tags::new()
            .with(TagKey::Type, state)
            .with(TagKey::FleetName, "fleet-1")
    }

    #[test]
    fn measurement_names_are_unique() {
        let mut names: Vec<_> = Measurement::ALL.iter().map(Measurement::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Measurement::ALL.len());
    }

    mod kind_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(Measurement::GameServerCount, MeasurementKind::Gauge ; "gameserver count is a gauge")]
        #[test_case(Measurement::FleetReplicas, MeasurementKind::Gauge ; "fleet replicas is a gauge")]
        #[test_case(Measurement::GameServerStateTransitions, MeasurementKind::Counter ; "transitions are counted")]
        #[test_case(Measurement::GameServerStateDuration, MeasurementKind::Distribution ; "dwell is a distribution")]
        #[test_case(Measurement::GameServerReadyDuration, MeasurementKind::Distribution ; "ready age is a distribution")]
        #[test_case(Measurement::GameServersPerNode, MeasurementKind::Distribution ; "per node is a distribution")]
        fn measurement_kind(measurement: Measurement, kind: MeasurementKind) {
            assert_eq!(measurement.kind(), kind);
        }

        #[test_case(TagKey::Type, "type")]
        #[test_case(TagKey::FleetName, "fleet_name")]
        #[test_case(TagKey::Empty, "empty")]
        fn tag_names(key: TagKey, name: &str) {
            assert_eq!(key.as_str(), name);
        }
    }

    #[test]
    fn tags_are_ordered_by_key() {
        let t = Tags::new()
            .with(TagKey::Namespace, "default")
            .with(TagKey::Type, "Ready");
        let keys: Vec<_> = t.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["type", "namespace"]);
        assert_eq!(t.get(TagKey::Type), Some("Ready"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn gauge_keeps_last_value() {
        let sink = InMemorySink::new();
        sink.record(Measurement::GameServerCount, &tags("Ready"), 3.0)
            .expect("record");
        sink.record(Measurement::GameServerCount, &tags("Ready"), 1.0)
            .expect("record");
        assert_eq!(sink.gauge(Measurement::GameServerCount, &tags("Ready")), Some(1.0));
    }

    #[test]
    fn counter_sums_values() {
        let sink = InMemorySink::new();
        for _ in 0..3 {
            sink.record(Measurement::GameServerStateTransitions, &tags("Ready"), 1.0)
                .expect("record");
        }
        assert_eq!(
            sink.counter(Measurement::GameServerStateTransitions, &tags("Ready")),
            Some(3.0)
        );
    }

    #[test]
    fn distribution_keeps_samples() {
        let sink = InMemorySink::new();
        sink.record(Measurement::GameServerStateDuration, &tags("Ready"), 1.5)
            .expect("record");
        sink.record(Measurement::GameServerStateDuration, &tags("Ready"), 2.5)
            .expect("record");
        assert_eq!(
            sink.samples(Measurement::GameServerStateDuration, &tags("Ready")),
            vec![1.5, 2.5]
        );
    }

    #[test]
    fn deletion_requires_capability() {
        let plain = InMemorySink::new();
        plain.record(Measurement::GameServerCount, &tags("Ready"), 1.0)
            .expect("record");
        assert!(!plain.supports_deletion());
        assert!(plain.delete(Measurement::GameServerCount, &tags("Ready")).is_err());

        let deleting = InMemorySink::with_deletion();
        deleting
            .record(Measurement::GameServerCount, &tags("Ready"), 1.0)
            .expect("record");
        deleting
            .delete(Measurement::GameServerCount, &tags("Ready"))
            .expect("delete");
        assert!(deleting.is_empty());
    }

    #[test]
    fn rejected_measurements_fail() {
        let sink = InMemorySink::new();
        sink.reject(Measurement::NodeCount);
        assert!(sink.record(Measurement::NodeCount, &Tags::new(), 1.0).is_err());
        assert!(sink.record(Measurement::GameServerCount, &Tags::new(), 1.0).is_ok());
    }

    #[test]
    fn arc_sink_delegates() {
        let sink = Arc::new(InMemorySink::with_deletion());
        let shared: Arc<InMemorySink> = Arc::clone(&sink);
        shared
            .record(Measurement::NodeCount, &Tags::new(), 4.0)
            .expect("record");
        assert!(MetricsSink::supports_deletion(&shared));
        assert_eq!(sink.gauge(Measurement::NodeCount, &Tags::new()), Some(4.0));
    }
}
