//! Error types for the fleet-metrics crate.

use thiserror::Error;

/// Errors that can occur while deriving or publishing fleet metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// No dwell entry exists for the state being left.
    #[error("duration lookup miss: no entry for {key}")]
    DurationLookupMiss {
        /// The `name/state` key that was looked up.
        key: String,
    },

    /// Listing a snapshot of resources failed.
    #[error("failed listing {resource}: {reason}")]
    Listing {
        /// The resource type being listed.
        resource: String,
        /// The reason listing failed.
        reason: String,
    },

    /// The sink rejected a recording.
    #[error("failed recording {measurement}: {reason}")]
    Record {
        /// The measurement being recorded.
        measurement: String,
        /// The reason the sink rejected it.
        reason: String,
    },

    /// Several recordings failed during one reconciliation tick.
    #[error("{} recording error(s), first: {}", .0.len(), first_message(.0))]
    Aggregate(Vec<MetricsError>),

    /// Watched resources never reported an initial synchronization.
    #[error("failed to wait for caches to sync: {pending} stream(s) not synced")]
    CacheSyncFailed {
        /// Number of streams still unsynchronized when the stop signal fired.
        pending: usize,
    },

    /// Invalid controller configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

fn first_message(errors: &[MetricsError]) -> String {
    errors
        .first()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}

impl MetricsError {
    /// Folds a list of errors into a single result, `Ok` when empty.
    ///
    /// # Errors
    ///
    /// Returns the single error unchanged, or `Aggregate` for several.
    pub fn aggregate(mut errors: Vec<Self>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Aggregate(errors)),
        }
    }
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
