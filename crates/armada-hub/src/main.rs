//! # armada-hub
//!
//! Lobby server binary — wires the registries to the WebSocket gateway and
//! runs until interrupted.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use armada_core::LobbyOptions;
use armada_lobby::{ObjectRegistry, SessionRegistry};
use armada_server::config::ServerConfig;
use armada_server::rpc::context::RpcContext;
use armada_server::rpc::handlers::register_all;
use armada_server::rpc::registry::MethodRegistry;
use armada_server::server::ArmadaServer;
use armada_server::websocket::groups::GroupRegistry;

/// Armada lobby server.
#[derive(Parser, Debug)]
#[command(name = "armada-hub", about = "Real-time multiplayer lobby server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "9870")]
    port: u16,

    /// Maximum concurrently active sessions.
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Maximum members per session.
    #[arg(long)]
    max_members: Option<usize>,

    /// Hand all orphaned session objects to one survivor instead of
    /// spreading them round-robin.
    #[arg(long)]
    no_distribute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let metrics_handle = armada_server::metrics::install_recorder();

    let mut options = LobbyOptions::default();
    if let Some(max_sessions) = args.max_sessions {
        options.max_sessions = max_sessions;
    }
    if let Some(max_members) = args.max_members {
        options.max_members_per_session = max_members;
    }
    if args.no_distribute {
        options.distribute_orphaned_objects = false;
    }
    info!(
        max_sessions = options.max_sessions,
        max_members = options.max_members_per_session,
        distribute_orphans = options.distribute_orphaned_objects,
        "lobby options"
    );

    let sessions = Arc::new(SessionRegistry::new(options));
    let objects = Arc::new(ObjectRegistry::new(sessions.clone()));
    let groups = Arc::new(GroupRegistry::new());
    let rpc_context = RpcContext::new(sessions, objects, groups);

    let mut registry = MethodRegistry::new();
    register_all(&mut registry);

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };
    let server = ArmadaServer::new(config, registry, rpc_context, metrics_handle);
    let (addr, handle) = server.listen().await?;
    info!(%addr, "armada hub listening");

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    server.shutdown().graceful_shutdown(vec![handle], None).await;

    Ok(())
}
