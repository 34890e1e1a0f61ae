//! Resource types observed by the metrics controller.
//!
//! - [`GameServerState`]: lifecycle states of a game server
//! - [`GameServer`]: an individually lifecycled workload instance
//! - [`Fleet`]: a fleet's replica counts plus its deletion marker
//! - [`Node`] / [`Taint`]: cluster machines hosting game servers
//! - [`ResourceEvent`] / [`Notification`]: the typed event stream fed to the controller

use std::fmt;

use chrono::{DateTime, Utc};
use fleet_autoscaler::{FleetAutoscaler, FleetState};
use serde::{Deserialize, Serialize};

/// Placeholder published when a fleet name or namespace is absent.
pub const NONE_VALUE: &str = "none";

/// Lifecycle state of a game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameServerState {
    /// Waiting for a host port to be allocated.
    PortAllocation,
    /// Pod is being created.
    Creating,
    /// Pod is starting.
    Starting,
    /// Pod has been scheduled onto a node.
    Scheduled,
    /// The game server asked to be marked ready.
    RequestReady,
    /// Ready to be allocated.
    Ready,
    /// Shutting down; terminal.
    Shutdown,
    /// Failed.
    Error,
    /// Failed health checking.
    Unhealthy,
    /// Held back from allocation and scale-down.
    Reserved,
    /// In active use.
    Allocated,
}

impl GameServerState {
    /// Number of distinct states.
    pub const COUNT: usize = 11;

    /// Every state, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::PortAllocation,
        Self::Creating,
        Self::Starting,
        Self::Scheduled,
        Self::RequestReady,
        Self::Ready,
        Self::Shutdown,
        Self::Error,
        Self::Unhealthy,
        Self::Reserved,
        Self::Allocated,
    ];

    /// Returns the state name as published in metric tags.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PortAllocation => "PortAllocation",
            Self::Creating => "Creating",
            Self::Starting => "Starting",
            Self::Scheduled => "Scheduled",
            Self::RequestReady => "RequestReady",
            Self::Ready => "Ready",
            Self::Shutdown => "Shutdown",
            Self::Error => "Error",
            Self::Unhealthy => "Unhealthy",
            Self::Reserved => "Reserved",
            Self::Allocated => "Allocated",
        }
    }

    /// Dense index of this state, in `0..COUNT`.
    #[must_use]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

impl fmt::Display for GameServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A game server instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameServer {
    /// Game server name.
    pub name: String,
    /// Game server namespace.
    pub namespace: String,
    /// Owning fleet, if any.
    #[serde(default)]
    pub fleet_name: Option<String>,
    /// Current lifecycle state.
    pub state: GameServerState,
    /// When the game server was created.
    pub creation_timestamp: DateTime<Utc>,
    /// Node hosting the game server, once scheduled.
    #[serde(default)]
    pub node_name: Option<String>,
}

impl GameServer {
    /// Creates a game server created at `creation_timestamp`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        state: GameServerState,
        creation_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            fleet_name: None,
            state,
            creation_timestamp,
            node_name: None,
        }
    }

    /// Sets the owning fleet.
    #[must_use]
    pub fn in_fleet(mut self, fleet: impl Into<String>) -> Self {
        self.fleet_name = Some(fleet.into());
        self
    }

    /// Sets the hosting node.
    #[must_use]
    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    /// Returns a copy in a different state.
    #[must_use]
    pub fn with_state(&self, state: GameServerState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Tracking key, `namespace/name`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Fleet name for tagging, `"none"` when the server belongs to no fleet.
    #[must_use]
    pub fn fleet_or_none(&self) -> &str {
        self.fleet_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(NONE_VALUE)
    }

    /// Seconds elapsed between creation and `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Millisecond ages fit comfortably in f64
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.creation_timestamp).num_milliseconds() as f64 / 1000.0
    }
}

/// A fleet as delivered by the fleet watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    /// Replica counts and identity.
    #[serde(flatten)]
    pub state: FleetState,
    /// Set once the fleet is pending deletion.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl Fleet {
    /// Wraps a fleet state with no deletion marker.
    #[must_use]
    pub const fn new(state: FleetState) -> Self {
        Self {
            state,
            deletion_timestamp: None,
        }
    }

    /// Returns true once the fleet is pending deletion.
    #[must_use]
    pub const fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// A node taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    #[serde(default)]
    pub value: Option<String>,
    /// Taint effect (e.g. `NoSchedule`).
    #[serde(default)]
    pub effect: String,
}

/// A cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name.
    pub name: String,
    /// Taints applied to the node.
    #[serde(default)]
    pub taints: Vec<Taint>,
}

impl Node {
    /// Creates an untainted node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            taints: Vec::new(),
        }
    }

    /// Adds a taint with the given key.
    #[must_use]
    pub fn tainted(mut self, key: impl Into<String>) -> Self {
        self.taints.push(Taint {
            key: key.into(),
            value: None,
            effect: "NoExecute".to_string(),
        });
        self
    }

    /// Returns true if any taint key starts with `prefix`, marking a node
    /// reserved for the orchestrator's own system components.
    #[must_use]
    pub fn is_system(&self, prefix: &str) -> bool {
        self.taints.iter().any(|t| t.key.starts_with(prefix))
    }
}

/// A change to a watched resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResourceEvent<T> {
    /// The resource was first observed.
    Added {
        /// The new resource.
        object: T,
    },
    /// The resource changed.
    Updated {
        /// Previous version.
        old: T,
        /// Current version.
        new: T,
    },
    /// The resource was removed.
    Deleted {
        /// Last known version.
        object: T,
    },
}

/// Watched resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Fleets.
    Fleet,
    /// Fleet autoscalers.
    Autoscaler,
    /// Game servers.
    GameServer,
    /// Nodes.
    Node,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fleet => "fleet",
            Self::Autoscaler => "autoscaler",
            Self::GameServer => "gameserver",
            Self::Node => "node",
        };
        f.write_str(name)
    }
}

/// A notification from one of the watched resource streams.
///
/// Payloads are decoded into this sum type once, at the watch boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "change", rename_all = "snake_case")]
pub enum Notification {
    /// Fleet change.
    Fleet(ResourceEvent<Fleet>),
    /// Fleet autoscaler change.
    Autoscaler(ResourceEvent<FleetAutoscaler>),
    /// Game server change.
    GameServer(ResourceEvent<GameServer>),
    /// Node change.
    Node(ResourceEvent<Node>),
}

impl Notification {
    /// The resource type this notification concerns.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Fleet(_) => ResourceKind::Fleet,
            Self::Autoscaler(_) => ResourceKind::Autoscaler,
            Self::GameServer(_) => ResourceKind::GameServer,
            Self::Node(_) => ResourceKind::Node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    mod state_tests {
        use super::*;

        #[test]
        fn indices_are_dense() {
            for (i, state) in GameServerState::ALL.iter().enumerate() {
                assert_eq!(state.index(), i);
            }
        }

        #[test]
        fn only_shutdown_is_terminal() {
            let terminal: Vec<_> = GameServerState::ALL
                .iter()
                .filter(|s| s.is_terminal())
                .collect();
            assert_eq!(terminal, vec![&GameServerState::Shutdown]);
        }

        #[test]
        fn serializes_as_name() {
            let json = serde_json::to_string(&GameServerState::RequestReady).expect("json");
            assert_eq!(json, "\"RequestReady\"");
            assert_eq!(GameServerState::RequestReady.to_string(), "RequestReady");
        }
    }

    mod game_server_tests {
        use super::*;

        #[test]
        fn fleet_defaults_to_none() {
            let gs = GameServer::new("gs-1", "default", GameServerState::Ready, Utc::now());
            assert_eq!(gs.fleet_or_none(), NONE_VALUE);

            let empty = gs.clone().in_fleet("");
            assert_eq!(empty.fleet_or_none(), NONE_VALUE);

            let owned = gs.in_fleet("fleet-1");
            assert_eq!(owned.fleet_or_none(), "fleet-1");
        }

        #[test]
        fn age_is_measured_from_creation() {
            let created = Utc::now();
            let gs = GameServer::new("gs-1", "default", GameServerState::Ready, created);
            let age = gs.age_seconds(created + Duration::milliseconds(12_500));
            assert!((age - 12.5).abs() < f64::EPSILON);
        }

        #[test]
        fn with_state_keeps_identity() {
            let gs = GameServer::new("gs-1", "default", GameServerState::Ready, Utc::now())
                .in_fleet("fleet-1")
                .on_node("node-a");
            let allocated = gs.with_state(GameServerState::Allocated);
            assert_eq!(allocated.name, "gs-1");
            assert_eq!(allocated.node_name.as_deref(), Some("node-a"));
            assert_eq!(allocated.state, GameServerState::Allocated);
        }
    }

    mod node_tests {
        use super::*;

        #[test]
        fn system_nodes_match_taint_prefix() {
            let system = Node::new("sys-1").tainted("gamefleet.dev/system");
            let worker = Node::new("worker-1").tainted("example.com/gpu");
            assert!(system.is_system("gamefleet.dev/"));
            assert!(!worker.is_system("gamefleet.dev/"));
            assert!(!Node::new("plain").is_system("gamefleet.dev/"));
        }
    }

    mod notification_tests {
        use super::*;

        #[test]
        fn decodes_tagged_notification() {
            let json = r#"{
                "kind": "game_server",
                "change": {
                    "event": "updated",
                    "old": {"name": "gs-1", "namespace": "default", "state": "Ready",
                            "creation_timestamp": "2024-01-15T10:00:00Z"},
                    "new": {"name": "gs-1", "namespace": "default", "state": "Allocated",
                            "creation_timestamp": "2024-01-15T10:00:00Z", "fleet_name": "fleet-1"}
                }
            }"#;
            let notification: Notification = serde_json::from_str(json).expect("decode");
            assert_eq!(notification.kind(), ResourceKind::GameServer);
            match notification {
                Notification::GameServer(ResourceEvent::Updated { old, new }) => {
                    assert_eq!(old.state, GameServerState::Ready);
                    assert_eq!(new.state, GameServerState::Allocated);
                    assert_eq!(new.fleet_name.as_deref(), Some("fleet-1"));
                }
                other => panic!("unexpected notification: {other:?}"),
            }
        }

        #[test]
        fn decodes_fleet_with_flattened_state() {
            let json = r#"{
                "kind": "fleet",
                "change": {"event": "added", "object": {
                    "name": "fleet-1", "namespace": "default",
                    "spec_replicas": 8, "status_replicas": 5, "allocated_replicas": 2
                }}
            }"#;
            let notification: Notification = serde_json::from_str(json).expect("decode");
            match notification {
                Notification::Fleet(ResourceEvent::Added { object }) => {
                    assert_eq!(object.state.name, "fleet-1");
                    assert_eq!(object.state.spec_replicas, 8);
                    assert_eq!(object.state.allocated_replicas, 2);
                    assert!(!object.is_deleting());
                }
                other => panic!("unexpected notification: {other:?}"),
            }
        }

        #[test]
        fn unknown_kind_is_rejected() {
            let json = r#"{"kind": "pod", "change": {"event": "added", "object": {}}}"#;
            assert!(serde_json::from_str::<Notification>(json).is_err());
        }
    }
}
