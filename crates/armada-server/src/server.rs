//! `ArmadaServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use armada_core::ConnectionId;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, instrument};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::rpc::context::RpcContext;
use crate::rpc::registry::MethodRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_ws_session;

/// Generates UUIDv7 request IDs.
#[derive(Clone)]
struct UuidV7RequestId;

impl MakeRequestId for UuidV7RequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        axum::http::HeaderValue::from_str(&id)
            .ok()
            .map(RequestId::new)
    }
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// RPC context shared across handlers (owns the group registry).
    pub rpc_context: Arc<RpcContext>,
    /// Server configuration.
    pub config: ServerConfig,
    /// Prometheus metrics handle for rendering.
    pub metrics_handle: Arc<PrometheusHandle>,
}

/// The main armada server.
pub struct ArmadaServer {
    config: ServerConfig,
    registry: Arc<MethodRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    rpc_context: Arc<RpcContext>,
    metrics_handle: Arc<PrometheusHandle>,
    start_time: Instant,
}

impl ArmadaServer {
    /// Create a new server.
    pub fn new(
        config: ServerConfig,
        registry: MethodRegistry,
        rpc_context: RpcContext,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            rpc_context: Arc::new(rpc_context),
            metrics_handle: Arc::new(metrics_handle),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            registry: self.registry.clone(),
            rpc_context: self.rpc_context.clone(),
            config: self.config.clone(),
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_upgrade_handler))
            .with_state(state)
            // Outermost layers execute first on request, last on response.
            .layer(CatchPanicLayer::new())
            .layer(CompressionLayer::new())
            .layer(RequestBodyLimitLayer::new(64 * 1024))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(30),
            ))
            .layer(SetRequestIdLayer::x_request_id(UuidV7RequestId))
            .layer(PropagateRequestIdLayer::x_request_id())
    }

    /// Bind to a TCP port and start serving. Returns the bound address and a
    /// join handle for the server task.
    #[instrument(skip_all, fields(host = %self.config.host, port = self.config.port))]
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        let methods = self.registry.methods().len();
        info!(addr = %bound_addr, methods, "server started");

        let router = self.router();
        let shutdown_token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("server shutdown initiated");
                })
                .await;
            info!("server shutdown complete");
        });

        Ok((bound_addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Get the RPC context.
    pub fn rpc_context(&self) -> &Arc<RpcContext> {
        &self.rpc_context
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.rpc_context.groups.connection_count().await;
    let sessions = state.rpc_context.sessions.active_count();
    let max_sessions = state.rpc_context.sessions.options().max_sessions;
    Json(health::health_check(
        state.start_time,
        connections,
        sessions,
        max_sessions,
    ))
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// GET /ws — WebSocket upgrade handler.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let current = state.rpc_context.groups.connection_count().await;
    if current >= state.config.max_connections {
        tracing::warn!(
            current,
            max = state.config.max_connections,
            "connection limit reached, rejecting WebSocket upgrade"
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let conn_id = ConnectionId::new();
    let registry = state.registry;
    let ctx = state.rpc_context;
    let config = state.config;
    let max_message_size = config.max_message_size;

    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, conn_id, registry, ctx, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_core::LobbyOptions;
    use armada_lobby::{ObjectRegistry, SessionRegistry};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::rpc::handlers::register_all;
    use crate::websocket::groups::GroupRegistry;

    fn make_rpc_context() -> RpcContext {
        let sessions = Arc::new(SessionRegistry::new(LobbyOptions::default()));
        let objects = Arc::new(ObjectRegistry::new(sessions.clone()));
        RpcContext::new(sessions, objects, Arc::new(GroupRegistry::new()))
    }

    fn make_metrics_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    fn make_server() -> ArmadaServer {
        let mut registry = MethodRegistry::new();
        register_all(&mut registry);
        ArmadaServer::new(
            ServerConfig::default(),
            registry,
            make_rpc_context(),
            make_metrics_handle(),
        )
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
    }

    #[test]
    fn registry_has_lobby_methods() {
        let server = make_server();
        assert!(server.registry().has_method("session.create"));
        assert!(server.registry().has_method("object.updateBatch"));
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["active_sessions"], 0);
    }

    #[tokio::test]
    async fn ws_endpoint_requires_upgrade() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn server_listen_binds_ephemeral_port() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();

        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn server_graceful_shutdown() {
        let server = make_server();
        let (_, handle) = server.listen().await.unwrap();

        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }

    #[tokio::test]
    async fn health_while_running() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.shutdown().shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
