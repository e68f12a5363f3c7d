//! Session and member state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use armada_core::{ConnectionId, MemberId, SessionId};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// Role of a member inside a session.
///
/// Exactly one member per session holds [`MemberRole::Authority`]; the
/// others defer to it for authoritative game state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberRole {
    Authority,
    Participant,
}

impl MemberRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Participant => "participant",
        }
    }
}

/// A connected member of a session.
#[derive(Clone, Debug)]
pub struct Member {
    /// Member identity, unique across the process.
    pub id: MemberId,
    /// Transport connection used to reach this member.
    pub connection_id: ConnectionId,
    /// Current role. Flips Participant → Authority at most once, on election.
    pub role: MemberRole,
    /// When the member entered the session.
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// Create a member joining now.
    #[must_use]
    pub fn new(connection_id: ConnectionId, role: MemberRole) -> Self {
        Self {
            id: MemberId::new(),
            connection_id,
            role,
            joined_at: Utc::now(),
        }
    }

    /// ISO-8601 join timestamp (millisecond precision, UTC).
    #[must_use]
    pub fn joined_at_wire(&self) -> String {
        self.joined_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// A live session.
///
/// Membership mutates through the registry, never directly; the fields here
/// use interior mutability so a session can be shared behind an `Arc` while
/// individual aspects change independently.
#[derive(Debug)]
pub struct Session {
    /// Session identity.
    pub id: SessionId,
    /// Unique human-readable name.
    pub name: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Aspect ratio, frozen at creation (already clamped).
    pub aspect_ratio: f64,
    game_started: AtomicBool,
    version: AtomicU64,
    members: RwLock<HashMap<MemberId, Member>>,
    /// Serializes authority promotion for this session.
    pub(crate) promotion: Mutex<()>,
}

impl Session {
    /// Create an empty session with version 1.
    #[must_use]
    pub fn new(name: String, aspect_ratio: f64) -> Self {
        Self {
            id: SessionId::new(),
            name,
            created_at: Utc::now(),
            aspect_ratio,
            game_started: AtomicBool::new(false),
            version: AtomicU64::new(1),
            members: RwLock::new(HashMap::new()),
            promotion: Mutex::new(()),
        }
    }

    /// Number of members currently in the session.
    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    /// Snapshot of all members, oldest join first.
    pub fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.members.read().values().cloned().collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        members
    }

    /// Snapshot of member IDs, oldest join first.
    pub fn member_ids(&self) -> Vec<MemberId> {
        self.members().into_iter().map(|m| m.id).collect()
    }

    /// Look up a member by ID.
    pub fn member(&self, id: &MemberId) -> Option<Member> {
        self.members.read().get(id).cloned()
    }

    /// The current authority, if any.
    pub fn authority(&self) -> Option<Member> {
        self.members
            .read()
            .values()
            .find(|m| m.role == MemberRole::Authority)
            .cloned()
    }

    /// Whether the game has been started.
    pub fn game_started(&self) -> bool {
        self.game_started.load(Ordering::Acquire)
    }

    /// Flip the game-started flag.
    ///
    /// Returns `true` exactly once; later calls observe the flag already set
    /// and return `false`.
    pub fn begin_game(&self) -> bool {
        self.game_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current session version. Starts at 1, bumped on authority change.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn insert_member(&self, member: Member) {
        let _ = self.members.write().insert(member.id.clone(), member);
    }

    pub(crate) fn remove_member(&self, id: &MemberId) -> Option<Member> {
        self.members.write().remove(id)
    }

    /// Promote the given member to authority in place.
    pub(crate) fn set_role(&self, id: &MemberId, role: MemberRole) -> bool {
        match self.members.write().get_mut(id) {
            Some(member) => {
                member.role = role;
                true
            }
            None => false,
        }
    }

    /// ISO-8601 creation timestamp (millisecond precision, UTC).
    #[must_use]
    pub fn created_at_wire(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// One row of the active-session listing.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionSummary {
    pub id: SessionId,
    pub name: String,
    pub member_count: usize,
    pub max_members: usize,
    pub created_at: String,
    pub game_started: bool,
}

/// The active-session listing plus capacity headroom.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionList {
    pub sessions: Vec<ActiveSessionSummary>,
    pub max_sessions: usize,
    pub can_create_session: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_member(role: MemberRole) -> Member {
        Member::new(ConnectionId::new(), role)
    }

    #[test]
    fn new_session_is_empty_and_unstarted() {
        let session = Session::new("Mango".into(), 1.5);
        assert_eq!(session.member_count(), 0);
        assert!(!session.game_started());
        assert_eq!(session.version(), 1);
        assert_eq!(session.aspect_ratio, 1.5);
        assert!(session.authority().is_none());
    }

    #[test]
    fn insert_and_remove_member() {
        let session = Session::new("Kiwi".into(), 1.0);
        let member = make_member(MemberRole::Authority);
        let id = member.id.clone();
        session.insert_member(member);
        assert_eq!(session.member_count(), 1);
        assert!(session.member(&id).is_some());

        let removed = session.remove_member(&id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(session.member_count(), 0);
        assert!(session.remove_member(&id).is_none());
    }

    #[test]
    fn authority_lookup() {
        let session = Session::new("Lime".into(), 1.0);
        let auth = make_member(MemberRole::Authority);
        let auth_id = auth.id.clone();
        session.insert_member(auth);
        session.insert_member(make_member(MemberRole::Participant));

        assert_eq!(session.authority().unwrap().id, auth_id);
    }

    #[test]
    fn begin_game_fires_once() {
        let session = Session::new("Fig".into(), 1.0);
        assert!(session.begin_game());
        assert!(!session.begin_game());
        assert!(session.game_started());
    }

    #[test]
    fn bump_version_increments() {
        let session = Session::new("Plum".into(), 1.0);
        assert_eq!(session.bump_version(), 2);
        assert_eq!(session.bump_version(), 3);
        assert_eq!(session.version(), 3);
    }

    #[test]
    fn set_role_promotes() {
        let session = Session::new("Date".into(), 1.0);
        let member = make_member(MemberRole::Participant);
        let id = member.id.clone();
        session.insert_member(member);

        assert!(session.set_role(&id, MemberRole::Authority));
        assert_eq!(session.member(&id).unwrap().role, MemberRole::Authority);
        assert!(!session.set_role(&MemberId::new(), MemberRole::Authority));
    }

    #[test]
    fn members_sorted_by_join_time() {
        let session = Session::new("Pear".into(), 1.0);
        let first = make_member(MemberRole::Authority);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = make_member(MemberRole::Participant);
        let first_id = first.id.clone();
        // Insert out of order.
        session.insert_member(second);
        session.insert_member(first);

        assert_eq!(session.members()[0].id, first_id);
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(MemberRole::Authority.as_str(), "authority");
        assert_eq!(MemberRole::Participant.as_str(), "participant");
        assert_eq!(
            serde_json::to_string(&MemberRole::Authority).unwrap(),
            "\"authority\""
        );
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = ActiveSessionSummary {
            id: SessionId::from("s1"),
            name: "Mango".into(),
            member_count: 2,
            max_members: 4,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            game_started: false,
        };
        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(v["memberCount"], 2);
        assert_eq!(v["maxMembers"], 4);
        assert_eq!(v["gameStarted"], false);
        assert!(v["createdAt"].is_string());
    }
}
