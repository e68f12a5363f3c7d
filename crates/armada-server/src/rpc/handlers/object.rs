//! Object handlers: create, batch update, delete.
//!
//! The caller's session is resolved through the connection index; objects of
//! other sessions are unreachable by construction. Mutations broadcast to
//! the session group after the registry has committed, so per-group delivery
//! order matches commit order.

use armada_core::{ConnectionId, MemberId, ObjectId};
use armada_lobby::{ObjectPatch, ObjectScope, SyncObject};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::events;
use crate::rpc::handlers::{require_param, require_string_param};
use crate::rpc::registry::MethodHandler;
use crate::rpc::types::RpcEvent;
use crate::websocket::groups::session_group;

fn data_param(params: Option<&Value>, key: &str) -> Option<Map<String, Value>> {
    params
        .and_then(|p| p.get(key))
        .and_then(Value::as_object)
        .cloned()
}

/// Create a synchronized object in the caller's session.
pub struct CreateObjectHandler;

#[async_trait]
impl MethodHandler for CreateObjectHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let scope_name = require_string_param(params.as_ref(), "scope")?;
        let scope = ObjectScope::parse(&scope_name).ok_or_else(|| RpcError::InvalidParams {
            message: format!("Unknown scope '{scope_name}'"),
        })?;
        let data = data_param(params.as_ref(), "data");
        let owner = params
            .as_ref()
            .and_then(|p| p.get("ownerId"))
            .and_then(Value::as_str)
            .map(MemberId::from);

        let Some(member) = ctx.sessions.member_by_connection(conn) else {
            warn!(conn_id = %conn, "object create from connection without session");
            return Ok(Value::Null);
        };
        let Some(session) = ctx.sessions.session_by_connection(conn) else {
            return Ok(Value::Null);
        };

        let Some(object) = ctx
            .objects
            .create_object(&session.id, &member.id, scope, data, owner)
        else {
            return Ok(Value::Null);
        };

        let group = session_group(&session.id);
        ctx.groups
            .broadcast(
                &group,
                &RpcEvent::new(
                    events::OBJECT_CREATED,
                    Some(session.id.to_string()),
                    Some(object.wire()),
                ),
            )
            .await;

        // First of its type → signal the 0 → 1 transition.
        if let Some(kind) = object.type_key() {
            if ctx.objects.count_by_type(&session.id, kind) == 1 {
                ctx.groups
                    .broadcast(
                        &group,
                        &RpcEvent::new(
                            events::OBJECT_TYPE_RESTORED,
                            Some(session.id.to_string()),
                            Some(json!({"type": kind})),
                        ),
                    )
                    .await;
            }
        }

        Ok(object.wire())
    }
}

/// Apply a batch of independent object patches.
pub struct UpdateObjectsHandler;

#[async_trait]
impl MethodHandler for UpdateObjectsHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let updates = require_param(params.as_ref(), "updates")?
            .as_array()
            .cloned()
            .ok_or_else(|| RpcError::InvalidParams {
                message: "Parameter 'updates' must be an array".into(),
            })?;

        let Some(session) = ctx.sessions.session_by_connection(conn) else {
            warn!(conn_id = %conn, "object update from connection without session");
            return Ok(Value::Null);
        };

        let patches: Vec<ObjectPatch> = updates
            .iter()
            .filter_map(|update| {
                let object_id = update.get("objectId").and_then(Value::as_str)?;
                Some(ObjectPatch {
                    object_id: ObjectId::from(object_id),
                    data: update
                        .get("data")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                    expected_version: update.get("expectedVersion").and_then(Value::as_u64),
                })
            })
            .collect();

        let updated = ctx.objects.update_objects(&session.id, patches);
        let wire: Vec<Value> = updated.iter().map(SyncObject::wire).collect();

        if !wire.is_empty() {
            ctx.groups
                .broadcast(
                    &session_group(&session.id),
                    &RpcEvent::new(
                        events::OBJECTS_UPDATED,
                        Some(session.id.to_string()),
                        Some(Value::Array(wire.clone())),
                    ),
                )
                .await;
        }

        Ok(Value::Array(wire))
    }
}

/// Delete an object from the caller's session.
pub struct DeleteObjectHandler;

#[async_trait]
impl MethodHandler for DeleteObjectHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let object_id = ObjectId::from(require_string_param(params.as_ref(), "objectId")?);

        let Some(session) = ctx.sessions.session_by_connection(conn) else {
            warn!(conn_id = %conn, "object delete from connection without session");
            return Ok(json!(false));
        };

        let Some(object) = ctx.objects.delete_object(&session.id, &object_id) else {
            return Ok(json!(false));
        };

        let group = session_group(&session.id);
        ctx.groups
            .broadcast(
                &group,
                &RpcEvent::new(
                    events::OBJECT_DELETED,
                    Some(session.id.to_string()),
                    Some(json!({"objectId": object.id})),
                ),
            )
            .await;

        // Last of its type → signal the 1 → 0 transition.
        if let Some(kind) = object.type_key() {
            if ctx.objects.count_by_type(&session.id, kind) == 0 {
                ctx.groups
                    .broadcast(
                        &group,
                        &RpcEvent::new(
                            events::OBJECT_TYPE_EMPTY,
                            Some(session.id.to_string()),
                            Some(json!({"type": kind})),
                        ),
                    )
                    .await;
            }
        }

        Ok(json!(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handlers::session::CreateSessionHandler;
    use crate::rpc::handlers::test_helpers::{
        attach_connection, drain_event_types, drain_events, make_test_context,
    };

    fn conn(n: u32) -> ConnectionId {
        ConnectionId::from(format!("conn-{n}"))
    }

    async fn setup_session(ctx: &RpcContext) -> Value {
        CreateSessionHandler
            .handle(&conn(1), Some(json!({"aspectRatio": 1.0})), ctx)
            .await
            .unwrap()
    }

    async fn create_object(ctx: &RpcContext, params: Value) -> Value {
        CreateObjectHandler
            .handle(&conn(1), Some(params), ctx)
            .await
            .unwrap()
    }

    // ── object.create ───────────────────────────────────────────────

    #[tokio::test]
    async fn create_returns_object_info() {
        let ctx = make_test_context();
        let created = setup_session(&ctx).await;

        let object = create_object(
            &ctx,
            json!({"scope": "perMember", "data": {"type": "ship", "x": 1.0}}),
        )
        .await;

        assert!(object["id"].is_string());
        assert_eq!(object["sessionId"], created["sessionId"]);
        assert_eq!(object["creatorId"], created["memberId"]);
        assert_eq!(object["ownerId"], created["memberId"]);
        assert_eq!(object["scope"], "perMember");
        assert_eq!(object["version"], 1);
        assert_eq!(object["data"]["type"], "ship");
    }

    #[tokio::test]
    async fn create_without_session_returns_null() {
        let ctx = make_test_context();
        let object = create_object(&ctx, json!({"scope": "perMember"})).await;
        assert!(object.is_null());
    }

    #[tokio::test]
    async fn create_rejects_unknown_scope() {
        let ctx = make_test_context();
        let _ = setup_session(&ctx).await;
        let err = CreateObjectHandler
            .handle(&conn(1), Some(json!({"scope": "global"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn first_of_type_emits_restored_signal() {
        let ctx = make_test_context();
        let mut rx = attach_connection(&ctx, "conn-1").await;
        let _ = setup_session(&ctx).await;
        let _ = drain_events(&mut rx);

        let _ = create_object(&ctx, json!({"scope": "perSession", "data": {"type": "asteroid"}}))
            .await;
        assert_eq!(
            drain_event_types(&mut rx),
            vec!["object.created", "object.typeRestored"]
        );

        // The second of the same type does not re-signal.
        let _ = create_object(&ctx, json!({"scope": "perSession", "data": {"type": "asteroid"}}))
            .await;
        assert_eq!(drain_event_types(&mut rx), vec!["object.created"]);
    }

    #[tokio::test]
    async fn untyped_object_emits_no_type_signal() {
        let ctx = make_test_context();
        let mut rx = attach_connection(&ctx, "conn-1").await;
        let _ = setup_session(&ctx).await;
        let _ = drain_events(&mut rx);

        let _ = create_object(&ctx, json!({"scope": "perSession"})).await;
        assert_eq!(drain_event_types(&mut rx), vec!["object.created"]);
    }

    // ── object.updateBatch ──────────────────────────────────────────

    #[tokio::test]
    async fn batch_update_applies_and_broadcasts() {
        let ctx = make_test_context();
        let mut rx = attach_connection(&ctx, "conn-1").await;
        let _ = setup_session(&ctx).await;
        let a = create_object(&ctx, json!({"scope": "perSession", "data": {"x": 0.0}})).await;
        let b = create_object(&ctx, json!({"scope": "perSession", "data": {"x": 0.0}})).await;
        let _ = drain_events(&mut rx);

        let result = UpdateObjectsHandler
            .handle(
                &conn(1),
                Some(json!({"updates": [
                    {"objectId": a["id"], "data": {"x": 1.0}},
                    {"objectId": b["id"], "data": {"x": 2.0}, "expectedVersion": 1},
                ]})),
                &ctx,
            )
            .await
            .unwrap();

        let updated = result.as_array().unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0]["version"], 2);
        assert_eq!(updated[1]["data"]["x"], 2.0);

        let events = drain_events(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "objects.updated");
        assert_eq!(events[0]["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_patches_are_skipped_not_failed() {
        let ctx = make_test_context();
        let mut rx = attach_connection(&ctx, "conn-1").await;
        let _ = setup_session(&ctx).await;
        let a = create_object(&ctx, json!({"scope": "perSession"})).await;
        let b = create_object(&ctx, json!({"scope": "perSession"})).await;
        let _ = drain_events(&mut rx);

        let result = UpdateObjectsHandler
            .handle(
                &conn(1),
                Some(json!({"updates": [
                    {"objectId": a["id"], "data": {"n": 1}, "expectedVersion": 9},
                    {"objectId": b["id"], "data": {"n": 2}},
                ]})),
                &ctx,
            )
            .await
            .unwrap();

        let updated = result.as_array().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["id"], b["id"]);

        let events = drain_events(&mut rx);
        assert_eq!(events[0]["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_emits_nothing() {
        let ctx = make_test_context();
        let mut rx = attach_connection(&ctx, "conn-1").await;
        let _ = setup_session(&ctx).await;
        let _ = drain_events(&mut rx);

        let result = UpdateObjectsHandler
            .handle(&conn(1), Some(json!({"updates": []})), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!([]));
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn batch_update_without_session_returns_null() {
        let ctx = make_test_context();
        let result = UpdateObjectsHandler
            .handle(&conn(9), Some(json!({"updates": []})), &ctx)
            .await
            .unwrap();
        assert!(result.is_null());
    }

    // ── object.delete ───────────────────────────────────────────────

    #[tokio::test]
    async fn delete_returns_true_then_false() {
        let ctx = make_test_context();
        let _ = setup_session(&ctx).await;
        let object = create_object(&ctx, json!({"scope": "perSession"})).await;

        let first = DeleteObjectHandler
            .handle(&conn(1), Some(json!({"objectId": object["id"]})), &ctx)
            .await
            .unwrap();
        assert_eq!(first, json!(true));

        let second = DeleteObjectHandler
            .handle(&conn(1), Some(json!({"objectId": object["id"]})), &ctx)
            .await
            .unwrap();
        assert_eq!(second, json!(false));
    }

    #[tokio::test]
    async fn last_delete_of_type_emits_empty_signal_once() {
        let ctx = make_test_context();
        let mut rx = attach_connection(&ctx, "conn-1").await;
        let _ = setup_session(&ctx).await;
        let a = create_object(&ctx, json!({"scope": "perSession", "data": {"type": "asteroid"}}))
            .await;
        let b = create_object(&ctx, json!({"scope": "perSession", "data": {"type": "asteroid"}}))
            .await;
        let _ = drain_events(&mut rx);

        let _ = DeleteObjectHandler
            .handle(&conn(1), Some(json!({"objectId": a["id"]})), &ctx)
            .await
            .unwrap();
        // One asteroid remains — no empty signal yet.
        assert_eq!(drain_event_types(&mut rx), vec!["object.deleted"]);

        let _ = DeleteObjectHandler
            .handle(&conn(1), Some(json!({"objectId": b["id"]})), &ctx)
            .await
            .unwrap();
        assert_eq!(
            drain_event_types(&mut rx),
            vec!["object.deleted", "object.typeEmpty"]
        );
    }

    #[tokio::test]
    async fn delete_without_session_returns_false() {
        let ctx = make_test_context();
        let result = DeleteObjectHandler
            .handle(&conn(9), Some(json!({"objectId": "o1"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!(false));
    }
}
