//! # armada-server
//!
//! The transport-facing half of the armada lobby server:
//!
//! - Axum HTTP endpoints (`/health`, `/metrics`) and the `/ws` WebSocket
//!   gateway
//! - Per-connection lifecycle: greeting, heartbeat, message dispatch,
//!   disconnect cleanup (running the full leave flow)
//! - Broadcast groups (the global lobby group plus one group per session)
//! - RPC method registry and the lobby handlers
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;
