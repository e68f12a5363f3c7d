//! WebSocket message dispatch — parses incoming text as `RpcRequest` and
//! routes through the `MethodRegistry`.

use armada_core::ConnectionId;

use crate::rpc::context::RpcContext;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Handle an incoming WebSocket text message.
///
/// Parses the message as an `RpcRequest`, dispatches to the registry on
/// behalf of `conn`, and returns the serialized `RpcResponse` JSON.
pub async fn handle_message(
    message: &str,
    registry: &MethodRegistry,
    conn: &ConnectionId,
    ctx: &RpcContext,
) -> String {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(r) => r,
        Err(e) => {
            let resp =
                RpcResponse::error("unknown", "INVALID_PARAMS", format!("Invalid JSON: {e}"));
            return serde_json::to_string(&resp).unwrap_or_default();
        }
    };

    let response = registry.dispatch(request, conn, ctx).await;
    serde_json::to_string(&response).unwrap_or_default()
}
