//! Broadcast groups: named, dynamic subsets of connections for fan-out.
//!
//! Two kinds of groups exist: the global lobby group, which every connection
//! joins on connect, and one `session:<id>` group per live session. Events
//! are serialized once and fanned out over each recipient's send channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use armada_core::{ConnectionId, SessionId};
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::metrics::WS_BROADCAST_DROPS_TOTAL;
use crate::rpc::types::RpcEvent;

use super::connection::ClientConnection;

/// Name of the group holding every live connection.
pub const GLOBAL_GROUP: &str = "lobby";

/// Group name for a session's members.
#[must_use]
pub fn session_group(session_id: &SessionId) -> String {
    format!("session:{session_id}")
}

/// Connection table plus named broadcast groups.
pub struct GroupRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    groups: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl GroupRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and place it in the global group.
    pub async fn add_connection(&self, connection: Arc<ClientConnection>) {
        let id = connection.id.clone();
        let _ = self
            .connections
            .write()
            .await
            .insert(id.clone(), connection);
        let _ = self
            .groups
            .write()
            .await
            .entry(GLOBAL_GROUP.to_owned())
            .or_default()
            .insert(id);
    }

    /// Drop a connection from the table and from every group.
    pub async fn remove_connection(&self, connection_id: &ConnectionId) {
        let _ = self.connections.write().await.remove(connection_id);
        let mut groups = self.groups.write().await;
        groups.retain(|_, members| {
            let _ = members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// Add a connection to a named group.
    pub async fn join(&self, connection_id: &ConnectionId, group: &str) {
        let _ = self
            .groups
            .write()
            .await
            .entry(group.to_owned())
            .or_default()
            .insert(connection_id.clone());
    }

    /// Remove a connection from a named group.
    pub async fn leave(&self, connection_id: &ConnectionId, group: &str) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            let _ = members.remove(connection_id);
            if members.is_empty() {
                let _ = groups.remove(group);
            }
        }
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of members of a group.
    pub async fn group_size(&self, group: &str) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map_or(0, HashSet::len)
    }

    /// Broadcast an event to every member of a group.
    pub async fn broadcast(&self, group: &str, event: &RpcEvent) {
        self.fan_out(group, None, event).await;
    }

    /// Broadcast an event to every member of a group except `exclude`.
    pub async fn broadcast_others(
        &self,
        group: &str,
        exclude: &ConnectionId,
        event: &RpcEvent,
    ) {
        self.fan_out(group, Some(exclude), event).await;
    }

    async fn fan_out(&self, group: &str, exclude: Option<&ConnectionId>, event: &RpcEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = event.event_type, error = %e, "failed to serialize event");
                return;
            }
        };

        let recipients: Vec<ConnectionId> = {
            let groups = self.groups.read().await;
            match groups.get(group) {
                Some(members) => members
                    .iter()
                    .filter(|id| exclude.map_or(true, |e| e != *id))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        debug!(
            event_type = event.event_type,
            group,
            recipients = recipients.len(),
            "broadcast event"
        );

        let connections = self.connections.read().await;
        for id in recipients {
            let Some(conn) = connections.get(&id) else {
                continue;
            };
            if !conn.send(json.clone()) {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %id, group, "failed to send event to client");
            }
        }
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
