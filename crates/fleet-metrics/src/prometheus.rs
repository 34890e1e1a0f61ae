//! Prometheus exposition for the controller's measurements.
//!
//! [`PrometheusSink`] owns an explicit registry with every [`Measurement`]
//! registered at construction. It is passed to the controller like any other
//! [`MetricsSink`] and supports deleting series.
//!
//! # Example
//!
//! ```rust
//! use fleet_metrics::prometheus::PrometheusSink;
//! use fleet_metrics::sink::{Measurement, MetricsSink, TagKey, Tags};
//!
//! let sink = PrometheusSink::new();
//! let tags = Tags::new().with(TagKey::Type, "Ready").with(TagKey::FleetName, "fleet-1");
//! sink.record(Measurement::GameServerCount, &tags, 3.0).unwrap();
//!
//! let output = sink.encode();
//! assert!(output.contains("gamefleet_gameservers_count"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::error::Result;
use crate::sink::{Measurement, MeasurementKind, MetricsSink, Tags};

/// Prefix applied to every registered series.
pub const METRIC_PREFIX: &str = "gamefleet";

type Labels = Vec<(String, String)>;

/// Dwell and readiness durations: 1s to about 68 minutes.
fn duration_histogram() -> Histogram {
    Histogram::new(exponential_buckets(1.0, 2.0, 13))
}

/// Per-node game server counts.
fn node_count_histogram() -> Histogram {
    Histogram::new(
        [0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 10.5, 20.5, 50.5, 100.5].into_iter(),
    )
}

#[derive(Clone)]
enum Instrument {
    Gauge(Family<Labels, Gauge<f64, AtomicU64>>),
    Counter(Family<Labels, Counter<f64, AtomicU64>>),
    Histogram(Family<Labels, Histogram>),
}

impl Instrument {
    fn for_measurement(measurement: Measurement) -> Self {
        match measurement.kind() {
            MeasurementKind::Gauge => Self::Gauge(Family::default()),
            MeasurementKind::Counter => Self::Counter(Family::default()),
            MeasurementKind::Distribution => {
                let family = if measurement == Measurement::GameServersPerNode {
                    Family::<Labels, Histogram>::new_with_constructor(node_count_histogram)
                } else {
                    Family::<Labels, Histogram>::new_with_constructor(duration_histogram)
                };
                Self::Histogram(family)
            }
        }
    }

    fn register(&self, registry: &mut Registry, measurement: Measurement) {
        let (name, help) = (measurement.name(), measurement.help());
        match self {
            Self::Gauge(family) => registry.register(name, help, family.clone()),
            Self::Counter(family) => registry.register(name, help, family.clone()),
            Self::Histogram(family) => registry.register(name, help, family.clone()),
        }
    }

    fn remove(&self, labels: &Labels) -> bool {
        match self {
            Self::Gauge(family) => family.remove(labels),
            Self::Counter(family) => family.remove(labels),
            Self::Histogram(family) => family.remove(labels),
        }
    }
}

/// A [`MetricsSink`] backed by a Prometheus registry.
#[derive(Clone)]
pub struct PrometheusSink {
    registry: Arc<RwLock<Registry>>,
    instruments: Arc<HashMap<Measurement, Instrument>>,
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink")
            .field("measurements", &self.instruments.len())
            .finish_non_exhaustive()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusSink {
    /// Creates a registry with every measurement registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(METRIC_PREFIX);
        let mut instruments = HashMap::with_capacity(Measurement::ALL.len());

        for measurement in Measurement::ALL {
            let instrument = Instrument::for_measurement(measurement);
            instrument.register(&mut registry, measurement);
            instruments.insert(measurement, instrument);
        }

        Self {
            registry: Arc::new(RwLock::new(registry)),
            instruments: Arc::new(instruments),
        }
    }

    /// Encodes all series in Prometheus text format.
    #[must_use]
    pub fn encode(&self) -> String {
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            tracing::error!("failed to encode prometheus metrics");
            return String::new();
        }
        buffer
    }

    /// Returns the Content-Type header value for the text format.
    #[must_use]
    pub const fn content_type() -> &'static str {
        "text/plain; version=0.0.4; charset=utf-8"
    }

    fn labels(tags: &Tags) -> Labels {
        tags.iter()
            .map(|(key, value)| (key.as_str().to_string(), value.to_string()))
            .collect()
    }
}

impl MetricsSink for PrometheusSink {
    fn record(&self, measurement: Measurement, tags: &Tags, value: f64) -> Result<()> {
        let Some(instrument) = self.instruments.get(&measurement) else {
            return Ok(());
        };
        let labels = Self::labels(tags);
        match instrument {
            Instrument::Gauge(family) => {
                family.get_or_create(&labels).set(value);
            }
            Instrument::Counter(family) => {
                family.get_or_create(&labels).inc_by(value);
            }
            Instrument::Histogram(family) => {
                family.get_or_create(&labels).observe(value);
            }
        }
        Ok(())
    }

    fn supports_deletion(&self) -> bool {
        true
    }

    fn delete(&self, measurement: Measurement, tags: &Tags) -> Result<()> {
        if let Some(instrument) = self.instruments.get(&measurement) {
            instrument.remove(&Self::labels(tags));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TagKey;

    fn ready_tags() -> Tags {
        Tags::new()
            .with(TagKey::Type, "Ready")
            .with(TagKey::FleetName, "fleet-1")
            .with(TagKey::Namespace, "default")
    }

    #[test]
    fn registers_every_measurement() {
        let sink = PrometheusSink::new();
        for measurement in Measurement::ALL {
            sink.record(measurement, &ready_tags(), 1.0).expect("record");
        }
        let output = sink.encode();
        for measurement in Measurement::ALL {
            let name = format!("{METRIC_PREFIX}_{}", measurement.name());
            assert!(output.contains(&name), "missing {name}");
        }
    }

    #[test]
    fn counters_are_exposed_with_total_suffix() {
        let sink = PrometheusSink::new();
        sink.record(Measurement::GameServerStateTransitions, &ready_tags(), 1.0)
            .expect("record");
        let output = sink.encode();
        assert!(output.contains("gamefleet_gameserver_state_transitions_total"));
    }

    #[test]
    fn gauge_series_carries_labels() {
        let sink = PrometheusSink::new();
        sink.record(Measurement::GameServerCount, &ready_tags(), 7.0)
            .expect("record");
        let output = sink.encode();
        assert!(output.contains("type=\"Ready\""));
        assert!(output.contains("fleet_name=\"fleet-1\""));
        assert!(output.contains("namespace=\"default\""));
    }

    #[test]
    fn deleted_series_disappear() {
        let sink = PrometheusSink::new();
        assert!(sink.supports_deletion());
        sink.record(Measurement::GameServerCount, &ready_tags(), 7.0)
            .expect("record");
        sink.delete(Measurement::GameServerCount, &ready_tags())
            .expect("delete");
        let output = sink.encode();
        assert!(!output.contains("fleet_name=\"fleet-1\""));
    }

    #[test]
    fn clones_share_the_registry() {
        let sink = PrometheusSink::default();
        let clone = sink.clone();
        clone
            .record(Measurement::NodeCount, &Tags::new().with(TagKey::Empty, "true"), 2.0)
            .expect("record");
        assert!(sink.encode().contains("empty=\"true\""));
    }

    #[test]
    fn content_type_is_text_format() {
        let ct = PrometheusSink::content_type();
        assert!(ct.contains("text/plain"));
        assert!(ct.contains("0.0.4"));
    }
}
