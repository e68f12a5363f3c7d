//! RPC dependency-injection context.

use std::sync::Arc;
use std::time::Instant;

use armada_lobby::{ObjectRegistry, SessionRegistry};

use crate::websocket::groups::GroupRegistry;

/// Shared context passed to every RPC handler.
pub struct RpcContext {
    /// Session lifecycle and membership.
    pub sessions: Arc<SessionRegistry>,
    /// Synchronized object storage.
    pub objects: Arc<ObjectRegistry>,
    /// Broadcast groups over the live connections.
    pub groups: Arc<GroupRegistry>,
    /// When the server started (for uptime reporting).
    pub server_start_time: Instant,
}

impl RpcContext {
    /// Bundle the shared services.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionRegistry>,
        objects: Arc<ObjectRegistry>,
        groups: Arc<GroupRegistry>,
    ) -> Self {
        Self {
            sessions,
            objects,
            groups,
            server_start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::rpc::handlers::test_helpers::make_test_context;

    #[test]
    fn context_starts_empty() {
        let ctx = make_test_context();
        assert_eq!(ctx.sessions.active_count(), 0);
    }

    #[test]
    fn context_has_start_time() {
        let ctx = make_test_context();
        assert!(ctx.server_start_time.elapsed().as_secs() < 5);
    }

    #[tokio::test]
    async fn context_groups_start_empty() {
        let ctx = make_test_context();
        assert_eq!(ctx.groups.connection_count().await, 0);
    }

    #[test]
    fn registries_are_wired_together() {
        let ctx = make_test_context();
        let conn = armada_core::ConnectionId::from("c1");
        let (session, member) = ctx.sessions.create_session(&conn, 1.0).unwrap();
        // The object registry validates membership against the same session
        // registry instance.
        let obj = ctx.objects.create_object(
            &session.id,
            &member.id,
            armada_lobby::ObjectScope::PerSession,
            None,
            None,
        );
        assert!(obj.is_some());
    }
}
