//! WebSocket gateway: connection state, broadcast groups, heartbeat,
//! message dispatch, and the per-connection session loop.

pub mod connection;
pub mod groups;
pub mod handler;
pub mod heartbeat;
pub mod session;
