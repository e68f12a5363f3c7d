//! Per-connection WebSocket loop — handles a single client from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::Duration;

use armada_core::ConnectionId;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::handlers::session::run_leave_flow;
use crate::rpc::registry::MethodRegistry;

use super::connection::ClientConnection;
use super::handler::handle_message;
use super::heartbeat::{run_heartbeat, HeartbeatResult};

/// Run the WebSocket loop for a connected client.
///
/// 1. Registers the connection (joining the global group) and greets it
/// 2. Dispatches incoming text/binary frames as RPC requests
/// 3. Forwards outbound events and responses via the send channel
/// 4. On disconnect — clean or not — runs the full leave flow, then drops
///    the connection from every group
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    config: ServerConfig,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(256);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    ctx.groups.add_connection(connection.clone()).await;

    let greeting = serde_json::json!({
        "type": "connection.established",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "data": { "connectionId": conn_id },
    });
    if let Ok(json) = serde_json::to_string(&greeting) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    // Outbound forwarder (send_rx → WebSocket).
    let outbound = tokio::spawn(async move {
        while let Some(msg) = send_rx.recv().await {
            if ws_tx.send(Message::Text((*msg).clone().into())).await.is_err() {
                break;
            }
        }
    });

    // Liveness watchdog.
    let heartbeat_cancel = CancellationToken::new();
    let mut heartbeat = tokio::spawn(run_heartbeat(
        connection.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
        Duration::from_secs(config.heartbeat_timeout_secs),
        heartbeat_cancel.clone(),
    ));

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else {
                    debug!("socket closed by peer");
                    break;
                };
                connection.mark_alive();

                let text = match msg {
                    Message::Text(ref t) => Some(t.to_string()),
                    Message::Binary(ref data) => match std::str::from_utf8(data) {
                        Ok(s) => Some(s.to_owned()),
                        Err(_) => {
                            info!(len = data.len(), "received non-UTF8 binary frame");
                            None
                        }
                    },
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => None,
                };

                let Some(text) = text else { continue };

                let response = handle_message(&text, &registry, &conn_id, &ctx).await;
                if !connection.send(Arc::new(response)) {
                    info!("failed to enqueue response (channel full or closed)");
                }
            }
            result = &mut heartbeat => {
                if matches!(result, Ok(HeartbeatResult::TimedOut)) {
                    warn!("heartbeat timed out, closing connection");
                }
                break;
            }
        }
    }

    // Cleanup. The leave flow is idempotent, so a client-initiated leave
    // followed by this disconnect path emits nothing twice, and it must run
    // to completion even on error paths so no index entry is orphaned.
    info!("client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    heartbeat_cancel.cancel();
    heartbeat.abort();
    let _ = run_leave_flow(&conn_id, &ctx).await;
    outbound.abort();
    ctx.groups.remove_connection(&conn_id).await;
}
