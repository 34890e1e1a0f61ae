//! Reactive metrics for game-server fleets.
//!
//! This crate turns fleet, autoscaler, game server and node notifications
//! into published measurements:
//!
//! - **Event paths**: fleet and autoscaler status is recorded on every change;
//!   game server state changes are counted and their per-state dwell time is
//!   tracked by [`StateDurationTracker`].
//! - **Reconciliation**: every resync interval a full snapshot is listed and
//!   [`GameServerCount`] and [`NodeOccupancy`] are rebuilt from it.
//! - **Sinks**: everything goes through [`MetricsSink`]; [`PrometheusSink`]
//!   renders the text exposition, [`InMemorySink`] keeps values for tests.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use fleet_metrics::{
//!     ControllerConfig, GameServer, GameServerState, MetricsController, Notification,
//!     PrometheusSink, ResourceCache, ResourceEvent,
//! };
//!
//! let cache = Arc::new(ResourceCache::new());
//! let sink = PrometheusSink::new();
//! let controller =
//!     MetricsController::new(Arc::clone(&cache), sink.clone(), ControllerConfig::default()).unwrap();
//!
//! let gs = GameServer::new("gs-1", "default", GameServerState::Ready, Utc::now()).in_fleet("fleet-1");
//! let added = Notification::GameServer(ResourceEvent::Added { object: gs });
//! cache.apply(&added);
//! controller.handle(&added);
//!
//! controller.collect().unwrap();
//! assert!(sink.encode().contains("gamefleet_gameservers_count"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod controller;
pub mod count;
pub mod durations;
pub mod error;
pub mod occupancy;
pub mod prometheus;
pub mod sink;
pub mod types;

pub use cache::ResourceCache;
pub use config::ControllerConfig;
pub use controller::{HasSynced, MetricsController, ResourceLister};
pub use count::{FleetKey, GameServerCount};
pub use durations::StateDurationTracker;
pub use error::{MetricsError, Result};
pub use occupancy::NodeOccupancy;
pub use prometheus::PrometheusSink;
pub use sink::{InMemorySink, Measurement, MeasurementKind, MetricsSink, TagKey, Tags};
pub use types::{
    Fleet, GameServer, GameServerState, Node, Notification, ResourceEvent, ResourceKind, Taint,
};
