//! Session handlers: create, join, leave, list, start game.
//!
//! These terminate the lobby RPCs: they validate the caller through the
//! session registry, mutate state, then fan out the resulting events. Domain
//! refusals return a null/false result with a warn log — the error envelope
//! is reserved for malformed requests.

use armada_core::{ConnectionId, SessionId};
use armada_lobby::{Departure, Member, MemberRole};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::events;
use crate::rpc::handlers::{require_f64_param, require_string_param};
use crate::rpc::registry::MethodHandler;
use crate::rpc::types::RpcEvent;
use crate::websocket::groups::{session_group, GLOBAL_GROUP};

fn member_wire(member: &Member) -> Value {
    json!({
        "memberId": member.id,
        "role": member.role,
        "joinedAt": member.joined_at_wire(),
    })
}

fn sessions_changed() -> RpcEvent {
    RpcEvent::new(events::SESSIONS_CHANGED, None, None)
}

/// Create a session with the caller as authority.
pub struct CreateSessionHandler;

#[async_trait]
impl MethodHandler for CreateSessionHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let aspect_ratio = require_f64_param(params.as_ref(), "aspectRatio")?;

        let (session, member) = match ctx.sessions.create_session(conn, aspect_ratio) {
            Ok(created) => created,
            Err(err) => {
                warn!(conn_id = %conn, error = %err, "session create refused");
                return Ok(Value::Null);
            }
        };

        ctx.groups.join(conn, &session_group(&session.id)).await;
        ctx.groups.broadcast(GLOBAL_GROUP, &sessions_changed()).await;

        Ok(json!({
            "sessionId": session.id,
            "sessionName": session.name,
            "memberId": member.id,
            "role": member.role,
            "aspectRatio": session.aspect_ratio,
        }))
    }
}

/// Join an existing session as a participant.
pub struct JoinSessionHandler;

#[async_trait]
impl MethodHandler for JoinSessionHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let session_id = SessionId::from(require_string_param(params.as_ref(), "sessionId")?);

        let (session, member) = match ctx.sessions.join_session(&session_id, conn) {
            Ok(joined) => joined,
            Err(err) => {
                warn!(conn_id = %conn, session_id = %session_id, error = %err, "session join refused");
                return Ok(Value::Null);
            }
        };

        let group = session_group(&session.id);
        ctx.groups.join(conn, &group).await;
        ctx.groups
            .broadcast_others(
                &group,
                conn,
                &RpcEvent::new(
                    events::MEMBER_JOINED,
                    Some(session.id.to_string()),
                    Some(member_wire(&member)),
                ),
            )
            .await;
        ctx.groups.broadcast(GLOBAL_GROUP, &sessions_changed()).await;

        let members: Vec<Value> = session.members().iter().map(member_wire).collect();
        let objects: Vec<Value> = ctx
            .objects
            .list_session_objects(&session.id)
            .iter()
            .map(armada_lobby::SyncObject::wire)
            .collect();

        Ok(json!({
            "sessionId": session.id,
            "sessionName": session.name,
            "memberId": member.id,
            "role": member.role,
            "members": members,
            "objects": objects,
            "aspectRatio": session.aspect_ratio,
            "gameStarted": session.game_started(),
        }))
    }
}

/// Leave the current session.
pub struct LeaveSessionHandler;

#[async_trait]
impl MethodHandler for LeaveSessionHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        _params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let _ = run_leave_flow(conn, ctx).await;
        Ok(Value::Null)
    }
}

/// The full departure flow, shared by the `session.leave` RPC and the
/// transport disconnect path.
///
/// Removes the member, applies object consequences, drops the caller from
/// the session group, and emits `member.left` → per-type `object.typeEmpty`
/// → `sessions.changed` in that order. Idempotent: a connection that is not
/// in a session returns `None` and emits nothing.
pub(crate) async fn run_leave_flow(conn: &ConnectionId, ctx: &RpcContext) -> Option<Departure> {
    let departure = ctx.sessions.leave_session(conn)?;
    let effects = ctx.objects.handle_member_departure(
        &departure.session_id,
        &departure.member_id,
        &departure.remaining,
    );
    if departure.session_destroyed {
        ctx.objects.drop_session(&departure.session_id);
    }

    let group = session_group(&departure.session_id);
    ctx.groups.leave(conn, &group).await;

    if !departure.session_destroyed {
        let migrations: Vec<Value> = effects
            .migrations
            .iter()
            .map(|m| json!({"objectId": m.object_id, "newOwnerId": m.new_owner}))
            .collect();
        let mut payload = json!({
            "memberId": departure.member_id,
            "deletedObjectIds": effects.deleted_ids,
            "migrations": migrations,
        });
        if let Some(promoted) = &departure.promoted {
            payload["promotedMemberId"] = json!(promoted.member_id);
            payload["promotedRole"] = json!(promoted.role);
        }
        ctx.groups
            .broadcast(
                &group,
                &RpcEvent::new(
                    events::MEMBER_LEFT,
                    Some(departure.session_id.to_string()),
                    Some(payload),
                ),
            )
            .await;

        for kind in &effects.affected_types {
            if ctx.objects.count_by_type(&departure.session_id, kind) == 0 {
                ctx.groups
                    .broadcast(
                        &group,
                        &RpcEvent::new(
                            events::OBJECT_TYPE_EMPTY,
                            Some(departure.session_id.to_string()),
                            Some(json!({"type": kind})),
                        ),
                    )
                    .await;
            }
        }
    }

    ctx.groups.broadcast(GLOBAL_GROUP, &sessions_changed()).await;

    info!(
        conn_id = %conn,
        session_id = %departure.session_id,
        destroyed = departure.session_destroyed,
        deleted_objects = effects.deleted_ids.len(),
        migrated_objects = effects.migrations.len(),
        "leave flow completed"
    );
    Some(departure)
}

/// List active sessions with capacity headroom.
pub struct ListSessionsHandler;

#[async_trait]
impl MethodHandler for ListSessionsHandler {
    async fn handle(
        &self,
        _conn: &ConnectionId,
        _params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        serde_json::to_value(ctx.sessions.list_active()).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// Start the game. Caller must be the session's authority and the game must
/// not already be running.
pub struct StartGameHandler;

#[async_trait]
impl MethodHandler for StartGameHandler {
    async fn handle(
        &self,
        conn: &ConnectionId,
        _params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let Some(session) = ctx.sessions.session_by_connection(conn) else {
            warn!(conn_id = %conn, "game start from connection without session");
            return Ok(json!(false));
        };
        let Some(member) = ctx.sessions.member_by_connection(conn) else {
            return Ok(json!(false));
        };
        if member.role != MemberRole::Authority {
            warn!(
                conn_id = %conn,
                session_id = %session.id,
                "game start refused: caller is not the authority"
            );
            return Ok(json!(false));
        }
        if !session.begin_game() {
            warn!(session_id = %session.id, "game start refused: already started");
            return Ok(json!(false));
        }

        ctx.groups
            .broadcast(
                &session_group(&session.id),
                &RpcEvent::new(
                    events::GAME_STARTED,
                    Some(session.id.to_string()),
                    Some(json!({"sessionId": session.id})),
                ),
            )
            .await;
        ctx.groups.broadcast(GLOBAL_GROUP, &sessions_changed()).await;

        info!(session_id = %session.id, "game started");
        Ok(json!(true))
    }
}
