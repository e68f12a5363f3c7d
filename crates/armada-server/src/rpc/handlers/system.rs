//! System handlers: ping and server info.

use armada_core::ConnectionId;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;

/// Liveness probe.
pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    async fn handle(
        &self,
        _conn: &ConnectionId,
        _params: Option<Value>,
        _ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        Ok(json!({
            "pong": true,
            "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }))
    }
}

/// Server identity and live counters.
pub struct GetInfoHandler;

#[async_trait]
impl MethodHandler for GetInfoHandler {
    async fn handle(
        &self,
        _conn: &ConnectionId,
        _params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        Ok(json!({
            "name": "armada",
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeSecs": ctx.server_start_time.elapsed().as_secs(),
            "connections": ctx.groups.connection_count().await,
            "activeSessions": ctx.sessions.active_count(),
            "maxSessions": ctx.sessions.options().max_sessions,
        }))
    }
}
