//! RPC handler modules and registration.

pub mod object;
pub mod relay;
pub mod session;
pub mod system;

use crate::rpc::events;
use crate::rpc::registry::MethodRegistry;

/// Register all RPC handlers with the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    // System
    registry.register("system.ping", system::PingHandler);
    registry.register("system.getInfo", system::GetInfoHandler);

    // Session lifecycle
    registry.register("session.create", session::CreateSessionHandler);
    registry.register("session.join", session::JoinSessionHandler);
    registry.register("session.leave", session::LeaveSessionHandler);
    registry.register("session.list", session::ListSessionsHandler);
    registry.register("game.start", session::StartGameHandler);

    // Synchronized objects
    registry.register("object.create", object::CreateObjectHandler);
    registry.register("object.updateBatch", object::UpdateObjectsHandler);
    registry.register("object.delete", object::DeleteObjectHandler);

    // Combat relays — same ordered channel as object updates
    registry.register(
        "combat.reportBulletHit",
        relay::RelayHandler::new(events::BULLET_HIT_REPORTED),
    );
    registry.register(
        "combat.confirmBulletHit",
        relay::RelayHandler::new(events::BULLET_HIT_CONFIRMED),
    );
    registry.register(
        "combat.rejectBulletHit",
        relay::RelayHandler::new(events::BULLET_HIT_REJECTED),
    );
    registry.register(
        "combat.reportShipHit",
        relay::RelayHandler::new(events::SHIP_HIT_REPORTED),
    );
    registry.register(
        "combat.reportScore",
        relay::RelayHandler::new(events::SCORE_REPORTED),
    );
}

/// Extract a required parameter from the params object.
pub(crate) fn require_param<'a>(
    params: Option<&'a serde_json::Value>,
    key: &str,
) -> Result<&'a serde_json::Value, crate::rpc::errors::RpcError> {
    params
        .and_then(|p| p.get(key))
        .ok_or_else(|| crate::rpc::errors::RpcError::InvalidParams {
            message: format!("Missing required parameter: {key}"),
        })
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(
    params: Option<&serde_json::Value>,
    key: &str,
) -> Result<String, crate::rpc::errors::RpcError> {
    require_param(params, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| crate::rpc::errors::RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string"),
        })
}

/// Extract a required number parameter.
pub(crate) fn require_f64_param(
    params: Option<&serde_json::Value>,
    key: &str,
) -> Result<f64, crate::rpc::errors::RpcError> {
    require_param(params, key)?
        .as_f64()
        .ok_or_else(|| crate::rpc::errors::RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a number"),
        })
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use armada_core::{ConnectionId, LobbyOptions};
    use armada_lobby::{ObjectRegistry, SessionRegistry};
    use tokio::sync::mpsc;

    use crate::rpc::context::RpcContext;
    use crate::websocket::connection::ClientConnection;
    use crate::websocket::groups::GroupRegistry;

    /// Build an `RpcContext` over fresh in-memory registries.
    pub fn make_test_context() -> RpcContext {
        make_test_context_with(LobbyOptions::default())
    }

    /// Build an `RpcContext` with custom lobby options.
    pub fn make_test_context_with(options: LobbyOptions) -> RpcContext {
        let sessions = Arc::new(SessionRegistry::new(options));
        let objects = Arc::new(ObjectRegistry::new(sessions.clone()));
        let groups = Arc::new(GroupRegistry::new());
        RpcContext::new(sessions, objects, groups)
    }

    /// Register a live connection and return its outbound receiver, so tests
    /// can observe broadcast events.
    pub async fn attach_connection(
        ctx: &RpcContext,
        id: &str,
    ) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(64);
        let conn = Arc::new(ClientConnection::new(ConnectionId::from(id), tx));
        ctx.groups.add_connection(conn).await;
        rx
    }

    /// Drain everything currently buffered on a receiver into parsed JSON.
    pub fn drain_events(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            events.push(serde_json::from_str(&msg).unwrap());
        }
        events
    }

    /// Event types currently buffered on a receiver, in delivery order.
    pub fn drain_event_types(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<String> {
        drain_events(rx)
            .into_iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}
