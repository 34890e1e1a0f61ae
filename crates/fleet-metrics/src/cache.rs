//! An in-memory view of watched game servers and nodes.
//!
//! [`ResourceCache`] applies the same [`Notification`] stream the controller
//! consumes and serves the snapshots that reconciliation lists.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::controller::{HasSynced, ResourceLister};
use crate::error::Result;
use crate::types::{GameServer, Node, Notification, ResourceEvent};

/// Latest known game servers and nodes.
#[derive(Debug, Default)]
pub struct ResourceCache {
    game_servers: RwLock<BTreeMap<(String, String), GameServer>>,
    nodes: RwLock<BTreeMap<String, Node>>,
    synced: AtomicBool,
}

impl ResourceCache {
    /// Creates an empty, unsynced cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one notification. Fleet and autoscaler changes are ignored.
    pub fn apply(&self, notification: &Notification) {
        match notification {
            Notification::GameServer(event) => {
                let mut game_servers = self.game_servers.write();
                match event {
                    ResourceEvent::Added { object } | ResourceEvent::Updated { new: object, .. } => {
                        game_servers.insert(
                            (object.namespace.clone(), object.name.clone()),
                            object.clone(),
                        );
                    }
                    ResourceEvent::Deleted { object } => {
                        game_servers.remove(&(object.namespace.clone(), object.name.clone()));
                    }
                }
            }
            Notification::Node(event) => {
                let mut nodes = self.nodes.write();
                match event {
                    ResourceEvent::Added { object } | ResourceEvent::Updated { new: object, .. } => {
                        nodes.insert(object.name.clone(), object.clone());
                    }
                    ResourceEvent::Deleted { object } => {
                        nodes.remove(&object.name);
                    }
                }
            }
            Notification::Fleet(_) | Notification::Autoscaler(_) => {}
        }
    }

    /// Marks the initial listing as complete.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    /// Returns true once [`mark_synced`](Self::mark_synced) was called.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Number of cached game servers.
    #[must_use]
    pub fn game_server_count(&self) -> usize {
        self.game_servers.read().len()
    }
}

impl ResourceLister for ResourceCache {
    fn list_game_servers(&self) -> Result<Vec<GameServer>> {
        Ok(self.game_servers.read().values().cloned().collect())
    }

    fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.read().values().cloned().collect())
    }
}

impl HasSynced for ResourceCache {
    fn has_synced(&self) -> bool {
        self.is_synced()
    }
}
