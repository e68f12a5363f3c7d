//! Combat relay handlers.
//!
//! These carry game logic between members without touching registry state:
//! validate the caller is in a session, append the reporter's member id, and
//! forward the opaque payload to the session group. They go through the same
//! ordered broadcast channel as object updates.

use armada_core::ConnectionId;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;
use crate::rpc::types::RpcEvent;
use crate::websocket::groups::session_group;

/// Forwards an opaque payload to the caller's session group under a fixed
/// event type.
pub struct RelayHandler {
    event: &'static str,
}

impl RelayHandler {
    /// Relay under the given outgoing event type.
    #[must_use]
    pub fn new(event: &'static str) -> Self {
        Self { event }
    }
}

#[async_trait]
impl MethodHandler for RelayHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let Some(member) = ctx.sessions.member_by_connection(conn) else {
            warn!(conn_id = %conn, event = self.event, "relay from connection without session");
            return Ok(Value::Null);
        };
        let Some(session) = ctx.sessions.session_by_connection(conn) else {
            return Ok(Value::Null);
        };

        let mut payload: Map<String, Value> = params
            .and_then(|p| p.as_object().cloned())
            .unwrap_or_default();
        let _ = payload.insert("reporterId".into(), json!(member.id));

        ctx.groups
            .broadcast(
                &session_group(&session.id),
                &RpcEvent::new(
                    self.event,
                    Some(session.id.to_string()),
                    Some(Value::Object(payload)),
                ),
            )
            .await;

        Ok(Value::Null)
    }
}
