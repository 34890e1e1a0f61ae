//! The reactive metrics controller.
//!
//! [`MetricsController`] receives fleet, autoscaler, game server and node
//! notifications and records derived numbers into a [`MetricsSink`]:
//!
//! - fleet and autoscaler changes are recorded directly,
//! - game server state changes feed the [`StateDurationTracker`] first,
//! - a periodic reconciliation tick rebuilds absolute counts from a full
//!   snapshot, independently of the event paths.
//!
//! Nothing here aborts the process. Failures are logged and the next event or
//! tick carries on, except for the initial cache sync in [`run`].
//!
//! [`run`]: MetricsController::run

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_autoscaler::{BufferSize, FleetAutoscaler};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, trace, warn};

use crate::config::ControllerConfig;
use crate::count::GameServerCount;
use crate::durations::StateDurationTracker;
use crate::error::{MetricsError, Result};
use crate::occupancy::NodeOccupancy;
use crate::sink::{Measurement, MetricsSink, TagKey, Tags};
use crate::types::{
    Fleet, GameServer, GameServerState, NONE_VALUE, Node, Notification, ResourceEvent,
};

/// Lists the current snapshot of watched resources.
pub trait ResourceLister: Send + Sync {
    /// Lists every known game server.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Listing`] if the snapshot is unavailable.
    fn list_game_servers(&self) -> Result<Vec<GameServer>>;

    /// Lists every known node.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Listing`] if the snapshot is unavailable.
    fn list_nodes(&self) -> Result<Vec<Node>>;
}

impl<T: ResourceLister + ?Sized> ResourceLister for Arc<T> {
    fn list_game_servers(&self) -> Result<Vec<GameServer>> {
        (**self).list_game_servers()
    }

    fn list_nodes(&self) -> Result<Vec<Node>> {
        (**self).list_nodes()
    }
}

/// Reports whether a watched stream finished its initial listing.
pub trait HasSynced: Send + Sync {
    /// Returns true once the initial listing is complete.
    fn has_synced(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync> HasSynced for F {
    fn has_synced(&self) -> bool {
        self()
    }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { NONE_VALUE } else { value }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn collect_error(errors: &mut Vec<MetricsError>, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(MetricsError::Aggregate(nested)) => errors.extend(nested),
        Err(e) => errors.push(e),
    }
}

/// Turns resource notifications into published measurements.
pub struct MetricsController<L, S> {
    lister: L,
    sink: S,
    config: ControllerConfig,
    collect_lock: Mutex<GameServerCount>,
    durations: StateDurationTracker,
}

impl<L, S> std::fmt::Debug for MetricsController<L, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsController")
            .field("config", &self.config)
            .field("tracked_gameservers", &self.durations.len())
            .finish_non_exhaustive()
    }
}

impl<L: ResourceLister, S: MetricsSink> MetricsController<L, S> {
    /// Creates a controller reading snapshots from `lister` and publishing
    /// into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Config`] if `config` fails validation.
    pub fn new(lister: L, sink: S, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lister,
            sink,
            config,
            collect_lock: Mutex::new(GameServerCount::new()),
            durations: StateDurationTracker::new(),
        })
    }

    /// The configured sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The controller configuration.
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The dwell tracker.
    pub const fn durations(&self) -> &StateDurationTracker {
        &self.durations
    }

    /// Handles one notification at the current time.
    pub fn handle(&self, notification: &Notification) {
        self.handle_at(notification, Utc::now());
    }

    /// Handles one notification as if it arrived at `now`.
    ///
    /// Sink failures are logged; they never stop the stream.
    pub fn handle_at(&self, notification: &Notification, now: DateTime<Utc>) {
        let result = match notification {
            Notification::Fleet(event) => match event {
                ResourceEvent::Added { object } | ResourceEvent::Updated { new: object, .. } => {
                    self.record_fleet_changes(object)
                }
                ResourceEvent::Deleted { object } => self.record_fleet_deletion(object),
            },
            Notification::Autoscaler(event) => match event {
                ResourceEvent::Added { object } => self.record_autoscaler_changes(None, object),
                ResourceEvent::Updated { old, new } => {
                    self.record_autoscaler_changes(Some(old), new)
                }
                ResourceEvent::Deleted { object } => self.record_autoscaler_deletion(object),
            },
            Notification::GameServer(event) => match event {
                ResourceEvent::Added { object } => {
                    self.durations
                        .observe(&object.key(), object.state, object.age_seconds(now));
                    Ok(())
                }
                ResourceEvent::Updated { old, new } => {
                    self.record_game_server_status_changes(old, new, now)
                }
                ResourceEvent::Deleted { object } => {
                    self.durations.forget(&object.key());
                    Ok(())
                }
            },
            Notification::Node(_) => Ok(()),
        };

        if let Err(e) = result {
            warn!(kind = %notification.kind(), error = %e, "failed recording notification");
        }
    }

    /// Records a fleet's replica counts, or zeros once it is being deleted.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated.
    pub fn record_fleet_changes(&self, fleet: &Fleet) -> Result<()> {
        if fleet.is_deleting() {
            return self.record_fleet_deletion(fleet);
        }
        let state = &fleet.state;
        self.record_fleet_replicas(
            &state.name,
            &state.namespace,
            [
                state.status_replicas,
                state.allocated_replicas,
                state.ready_replicas,
                state.spec_replicas,
            ],
        )
    }

    /// Records zero for every replica count of a deleted fleet.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated.
    pub fn record_fleet_deletion(&self, fleet: &Fleet) -> Result<()> {
        self.record_fleet_replicas(&fleet.state.name, &fleet.state.namespace, [0; 4])
    }

    /// Records `[total, allocated, ready, desired]` replicas for a fleet.
    fn record_fleet_replicas(&self, name: &str, namespace: &str, counts: [u32; 4]) -> Result<()> {
        let base = Tags::new()
            .with(TagKey::Name, name)
            .with(TagKey::Namespace, namespace);
        let mut errors = Vec::new();
        for (kind, count) in ["total", "allocated", "ready", "desired"].into_iter().zip(counts) {
            let tags = base.clone().with(TagKey::Type, kind);
            collect_error(
                &mut errors,
                self.sink
                    .record(Measurement::FleetReplicas, &tags, f64::from(count)),
            );
        }
        MetricsError::aggregate(errors)
    }

    /// Records an autoscaler's status and buffer policy.
    ///
    /// When the target fleet changed since `old`, the series attributed to the
    /// old fleet are zeroed first. An autoscaler being deleted records zeros.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated.
    pub fn record_autoscaler_changes(
        &self,
        old: Option<&FleetAutoscaler>,
        autoscaler: &FleetAutoscaler,
    ) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(old) = old.filter(|old| old.fleet_name != autoscaler.fleet_name) {
            debug!(
                autoscaler = %autoscaler.name,
                from = %old.fleet_name,
                to = %autoscaler.fleet_name,
                "autoscaler fleet changed"
            );
            collect_error(&mut errors, self.record_autoscaler_deletion(old));
        }

        if autoscaler.is_deleting() {
            collect_error(&mut errors, self.record_autoscaler_deletion(autoscaler));
            return MetricsError::aggregate(errors);
        }

        let base = Self::autoscaler_tags(autoscaler);
        let status = &autoscaler.status;
        for (measurement, value) in [
            (Measurement::AutoscalerCurrentReplicas, f64::from(status.current_replicas)),
            (Measurement::AutoscalerDesiredReplicas, f64::from(status.desired_replicas)),
            (Measurement::AutoscalerAbleToScale, flag(status.able_to_scale)),
            (Measurement::AutoscalerLimited, flag(status.scaling_limited)),
        ] {
            collect_error(&mut errors, self.sink.record(measurement, &base, value));
        }

        if let Some(policy) = &autoscaler.buffer {
            for (kind, limit) in [("max", policy.max_replicas), ("min", policy.min_replicas)] {
                let tags = base.clone().with(TagKey::Type, kind);
                collect_error(
                    &mut errors,
                    self.sink
                        .record(Measurement::AutoscalerBufferLimits, &tags, f64::from(limit)),
                );
            }
            let tags = base.with(TagKey::Type, Self::buffer_size_type(policy.buffer_size));
            collect_error(
                &mut errors,
                self.sink
                    .record(Measurement::AutoscalerBufferSize, &tags, policy.buffer_size.value()),
            );
        }

        MetricsError::aggregate(errors)
    }

    /// Records zero for an autoscaler's status and, when it has a buffer
    /// policy, for its limits and buffer size.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated.
    pub fn record_autoscaler_deletion(&self, autoscaler: &FleetAutoscaler) -> Result<()> {
        let base = Self::autoscaler_tags(autoscaler);
        let mut errors = Vec::new();

        for measurement in [
            Measurement::AutoscalerCurrentReplicas,
            Measurement::AutoscalerDesiredReplicas,
            Measurement::AutoscalerAbleToScale,
            Measurement::AutoscalerLimited,
        ] {
            collect_error(&mut errors, self.sink.record(measurement, &base, 0.0));
        }

        if let Some(policy) = &autoscaler.buffer {
            for kind in ["max", "min"] {
                let tags = base.clone().with(TagKey::Type, kind);
                collect_error(
                    &mut errors,
                    self.sink.record(Measurement::AutoscalerBufferLimits, &tags, 0.0),
                );
            }
            let tags = base.with(TagKey::Type, Self::buffer_size_type(policy.buffer_size));
            collect_error(
                &mut errors,
                self.sink.record(Measurement::AutoscalerBufferSize, &tags, 0.0),
            );
        }

        MetricsError::aggregate(errors)
    }

    fn autoscaler_tags(autoscaler: &FleetAutoscaler) -> Tags {
        Tags::new()
            .with(TagKey::Name, autoscaler.name.as_str())
            .with(TagKey::FleetName, or_none(&autoscaler.fleet_name))
            .with(TagKey::Namespace, autoscaler.namespace.as_str())
    }

    const fn buffer_size_type(size: BufferSize) -> &'static str {
        match size {
            BufferSize::Count(_) => "count",
            BufferSize::Percentage(_) => "percentage",
        }
    }

    /// Records a game server state change observed at `now`.
    ///
    /// Counts the transition by new state, samples the time to become ready,
    /// and samples how long the server stayed in its previous state. Updates
    /// that do not change state are ignored.
    ///
    /// # Errors
    ///
    /// Returns the sink failures, aggregated. A missing dwell entry is not an
    /// error; that sample is skipped.
    pub fn record_game_server_status_changes(
        &self,
        old: &GameServer,
        new: &GameServer,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if old.state == new.state {
            return Ok(());
        }

        let fleet = new.fleet_or_none();
        let mut errors = Vec::new();

        let tags = Tags::new()
            .with(TagKey::Type, new.state.as_str())
            .with(TagKey::FleetName, fleet)
            .with(TagKey::Namespace, or_none(&new.namespace));
        collect_error(
            &mut errors,
            self.sink
                .record(Measurement::GameServerStateTransitions, &tags, 1.0),
        );

        let age = new.age_seconds(now);
        if new.state == GameServerState::Ready {
            info!(gameserver = %new.name, seconds = age, "time taken to become ready");
            let tags = Tags::new()
                .with(TagKey::Type, new.state.as_str())
                .with(TagKey::FleetName, fleet);
            collect_error(
                &mut errors,
                self.sink
                    .record(Measurement::GameServerReadyDuration, &tags, age),
            );
        }

        match self.durations.record(&new.key(), new.state, old.state, age) {
            Ok(Some(dwell)) => {
                let tags = Tags::new()
                    .with(TagKey::Type, old.state.as_str())
                    .with(TagKey::FleetName, fleet);
                collect_error(
                    &mut errors,
                    self.sink
                        .record(Measurement::GameServerStateDuration, &tags, dwell),
                );
            }
            Ok(None) => trace!(gameserver = %new.name, "first state observed"),
            Err(e) => debug!(error = %e, "skipping state duration sample"),
        }

        MetricsError::aggregate(errors)
    }

    /// Runs one reconciliation tick.
    ///
    /// Lists game servers and nodes, drops dwell entries for game servers no
    /// longer listed, rebuilds the per-state counts and node occupancy, and
    /// publishes them. Nothing is published when either listing fails.
    ///
    /// # Errors
    ///
    /// Returns the listing failure, or every sink failure aggregated.
    pub fn collect(&self) -> Result<()> {
        let mut counts = self.collect_lock.lock();

        let game_servers = self.lister.list_game_servers()?;
        let nodes = self.lister.list_nodes()?;

        let keys: Vec<String> = game_servers.iter().map(GameServer::key).collect();
        let live: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let pruned = self.durations.retain_active(&live);

        let mut errors = Vec::new();
        counts.increment_for_snapshot(&game_servers);
        collect_error(&mut errors, counts.record(&self.sink));

        let occupancy =
            NodeOccupancy::compute(&game_servers, &nodes, &self.config.system_taint_prefix);
        collect_error(&mut errors, occupancy.record(&self.sink));

        debug!(
            gameservers = game_servers.len(),
            nodes = occupancy.eligible(),
            pruned,
            "reconciliation tick complete"
        );
        MetricsError::aggregate(errors)
    }

    /// Waits until every probe reports synced.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::CacheSyncFailed`] if `stop` fires first.
    pub async fn wait_for_cache_sync(
        &self,
        probes: &[Box<dyn HasSynced>],
        stop: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut ticker = interval(self.config.sync_poll_interval());
        let mut stopped = *stop.borrow();

        loop {
            let pending = probes.iter().filter(|p| !p.has_synced()).count();
            if pending == 0 {
                return Ok(());
            }
            if stopped {
                error!(pending, "failed to wait for caches to sync");
                return Err(MetricsError::CacheSyncFailed { pending });
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    stopped = changed.is_err() || *stop.borrow();
                }
            }
        }
    }

    /// Waits for cache sync, then reconciles every resync interval until
    /// `stop` is set.
    ///
    /// The first tick runs immediately. A tick in progress always completes
    /// before the stop signal is observed. A stop already set when sync
    /// completes, or set during a tick, ends the loop without another tick.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::CacheSyncFailed`] if the caches never sync.
    pub async fn run(
        &self,
        probes: Vec<Box<dyn HasSynced>>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("waiting for cache sync");
        self.wait_for_cache_sync(&probes, &mut stop).await?;
        if *stop.borrow_and_update() {
            info!("metrics controller stopped before first tick");
            return Ok(());
        }

        let mut ticker = interval(self.config.resync_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.config.resync_interval(), "metrics controller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.collect() {
                        warn!(error = %e, "reconciliation tick failed");
                    }
                    if *stop.borrow_and_update() {
                        break;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!("metrics controller stopped");
        Ok(())
    }
}

impl<L, S> MetricsController<L, S>
where
    L: ResourceLister + 'static,
    S: MetricsSink + 'static,
{
    /// Spawns a task handling notifications from `rx` in order until the
    /// channel closes or `stop` is set.
    pub fn spawn_watcher(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<Notification>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while !*stop.borrow_and_update() {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(notification) => controller.handle(&notification),
                        None => break,
                    },
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("watcher stopped");
        })
    }
}
