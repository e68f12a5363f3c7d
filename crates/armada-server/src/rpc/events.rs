//! Outgoing event names.
//!
//! Every server-pushed event type string lives here so handlers and tests
//! agree on the wire names.

/// The active-session list changed; clients re-fetch `session.list`.
/// Carries no payload.
pub const SESSIONS_CHANGED: &str = "sessions.changed";
/// A member joined the session (sent to the other members).
pub const MEMBER_JOINED: &str = "member.joined";
/// A member left; payload carries promotion and object consequences.
pub const MEMBER_LEFT: &str = "member.left";
/// The authority started the game.
pub const GAME_STARTED: &str = "game.started";

/// A synchronized object was created.
pub const OBJECT_CREATED: &str = "object.created";
/// A batch of objects was updated.
pub const OBJECTS_UPDATED: &str = "objects.updated";
/// An object was deleted.
pub const OBJECT_DELETED: &str = "object.deleted";
/// The last object of a type is gone (count transitioned 1 → 0).
pub const OBJECT_TYPE_EMPTY: &str = "object.typeEmpty";
/// The first object of a type appeared (count transitioned 0 → 1).
pub const OBJECT_TYPE_RESTORED: &str = "object.typeRestored";

/// Combat relays — opaque payloads forwarded to the session group with the
/// reporter's member id appended.
pub const BULLET_HIT_REPORTED: &str = "combat.bulletHitReported";
pub const BULLET_HIT_CONFIRMED: &str = "combat.bulletHitConfirmed";
pub const BULLET_HIT_REJECTED: &str = "combat.bulletHitRejected";
pub const SHIP_HIT_REPORTED: &str = "combat.shipHitReported";
pub const SCORE_REPORTED: &str = "combat.scoreReported";
