//! Session registry: lifecycle, membership, indexes, authority election.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use armada_core::{clamp_aspect_ratio, ConnectionId, LobbyOptions, MemberId, SessionId};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::names::NamePool;
use crate::session::{ActiveSessionList, ActiveSessionSummary, Member, MemberRole, Session};

/// Why a create or join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The connection is already bound to a member of some session.
    #[error("connection is already in a session")]
    AlreadyInSession,
    /// The active-session cap is reached.
    #[error("maximum number of active sessions reached")]
    CapacityReached,
    /// The target session has no free member slot.
    #[error("session is full")]
    SessionFull,
    /// The target session does not exist.
    #[error("session not found")]
    NotFound,
}

/// A participant promoted to authority during a departure.
#[derive(Debug, Clone)]
pub struct PromotedMember {
    pub member_id: MemberId,
    pub role: MemberRole,
}

/// Outcome of a member leaving its session.
#[derive(Debug, Clone)]
pub struct Departure {
    pub session_id: SessionId,
    pub session_name: String,
    pub member_id: MemberId,
    /// The departing member was the last one; the session is gone.
    pub session_destroyed: bool,
    /// Set when the departing authority's role was handed to a participant.
    pub promoted: Option<PromotedMember>,
    /// Members still in the session after the departure (empty if destroyed).
    pub remaining: Vec<MemberId>,
}

/// Authoritative registry of live sessions and their members.
///
/// Admission checks (create/join/leave) serialize on one mutex so the
/// "connection already bound? capacity left?" observation is linearizable.
/// The session and index maps themselves are independently lockable for
/// read-mostly lookups.
pub struct SessionRegistry {
    options: LobbyOptions,
    names: NamePool,
    admission: Mutex<()>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    connection_index: RwLock<HashMap<ConnectionId, MemberId>>,
    member_index: RwLock<HashMap<MemberId, SessionId>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(options: LobbyOptions) -> Self {
        Self {
            options,
            names: NamePool::new(),
            admission: Mutex::new(()),
            sessions: RwLock::new(HashMap::new()),
            connection_index: RwLock::new(HashMap::new()),
            member_index: RwLock::new(HashMap::new()),
        }
    }

    /// Registry options.
    #[must_use]
    pub fn options(&self) -> &LobbyOptions {
        &self.options
    }

    /// Number of sessions with at least one member.
    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.member_count() > 0)
            .count()
    }

    /// Create a session with the caller as its authority.
    pub fn create_session(
        &self,
        connection_id: &ConnectionId,
        aspect_ratio: f64,
    ) -> Result<(Arc<Session>, Member), RegistryError> {
        let _admit = self.admission.lock();

        if self.connection_index.read().contains_key(connection_id) {
            return Err(RegistryError::AlreadyInSession);
        }
        if self.active_count() >= self.options.max_sessions {
            return Err(RegistryError::CapacityReached);
        }

        let aspect_ratio = clamp_aspect_ratio(aspect_ratio);
        let used: HashSet<String> = self
            .sessions
            .read()
            .values()
            .map(|s| s.name.clone())
            .collect();
        let name = self.names.allocate(&used);

        let session = Arc::new(Session::new(name, aspect_ratio));
        let member = Member::new(connection_id.clone(), MemberRole::Authority);
        session.insert_member(member.clone());

        let _ = self
            .sessions
            .write()
            .insert(session.id.clone(), session.clone());
        let _ = self
            .connection_index
            .write()
            .insert(connection_id.clone(), member.id.clone());
        let _ = self
            .member_index
            .write()
            .insert(member.id.clone(), session.id.clone());

        info!(
            session_id = %session.id,
            session_name = %session.name,
            member_id = %member.id,
            "session created"
        );
        Ok((session, member))
    }

    /// Join an existing session as a participant.
    pub fn join_session(
        &self,
        session_id: &SessionId,
        connection_id: &ConnectionId,
    ) -> Result<(Arc<Session>, Member), RegistryError> {
        let _admit = self.admission.lock();

        if self.connection_index.read().contains_key(connection_id) {
            return Err(RegistryError::AlreadyInSession);
        }
        let session = self
            .sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or(RegistryError::NotFound)?;
        if session.member_count() >= self.options.max_members_per_session {
            return Err(RegistryError::SessionFull);
        }

        let member = Member::new(connection_id.clone(), MemberRole::Participant);
        session.insert_member(member.clone());
        let _ = self
            .connection_index
            .write()
            .insert(connection_id.clone(), member.id.clone());
        let _ = self
            .member_index
            .write()
            .insert(member.id.clone(), session.id.clone());

        info!(
            session_id = %session.id,
            member_id = %member.id,
            members = session.member_count(),
            "member joined"
        );
        Ok((session, member))
    }

    /// Remove the member bound to `connection_id` from its session.
    ///
    /// Elects a new authority when the departing member held the role and
    /// participants remain; destroys the session when it empties. Idempotent:
    /// an unbound connection returns `None` with no side effect, so a
    /// client-initiated leave racing a transport disconnect cleans up once.
    pub fn leave_session(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let _admit = self.admission.lock();

        let member_id = self.connection_index.write().remove(connection_id)?;
        let Some(session_id) = self.member_index.write().remove(&member_id) else {
            warn!(member_id = %member_id, "member missing from member index");
            return None;
        };
        let Some(session) = self.sessions.read().get(&session_id).cloned() else {
            warn!(session_id = %session_id, "indexed session not in registry");
            return None;
        };

        let removed = session.remove_member(&member_id);
        if removed.is_none() {
            warn!(
                session_id = %session_id,
                member_id = %member_id,
                "indexed member not in session member map"
            );
        }
        let was_authority = removed
            .as_ref()
            .is_some_and(|m| m.role == MemberRole::Authority);

        let promoted = if was_authority && session.member_count() > 0 {
            self.promote_replacement(&session)
        } else {
            None
        };

        let remaining = session.member_ids();
        let session_destroyed = remaining.is_empty();
        if session_destroyed {
            let _ = self.sessions.write().remove(&session_id);
            info!(session_id = %session_id, session_name = %session.name, "session destroyed");
        }

        info!(
            session_id = %session_id,
            member_id = %member_id,
            destroyed = session_destroyed,
            promoted = promoted.is_some(),
            "member left"
        );

        Some(Departure {
            session_id,
            session_name: session.name.clone(),
            member_id,
            session_destroyed,
            promoted,
            remaining,
        })
    }

    /// Pick a remaining member uniformly at random and hand it the authority
    /// role, bumping the session version.
    fn promote_replacement(&self, session: &Session) -> Option<PromotedMember> {
        let _guard = session.promotion.lock();
        // Double-check: a concurrent promotion may already have run.
        if session.authority().is_some() {
            return None;
        }
        let candidates = session.member_ids();
        if candidates.is_empty() {
            return None;
        }
        let pick = candidates[rand::rng().random_range(0..candidates.len())].clone();
        if !session.set_role(&pick, MemberRole::Authority) {
            return None;
        }
        let version = session.bump_version();
        debug!(
            session_id = %session.id,
            member_id = %pick,
            version,
            "authority promoted"
        );
        Some(PromotedMember {
            member_id: pick,
            role: MemberRole::Authority,
        })
    }

    /// Look up a session by ID.
    pub fn get_session(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Resolve the member bound to a connection.
    pub fn member_by_connection(&self, connection_id: &ConnectionId) -> Option<Member> {
        let member_id = self.connection_index.read().get(connection_id).cloned()?;
        let session_id = self.member_index.read().get(&member_id).cloned()?;
        self.sessions
            .read()
            .get(&session_id)
            .and_then(|s| s.member(&member_id))
    }

    /// Resolve the session a connection is in.
    pub fn session_by_connection(&self, connection_id: &ConnectionId) -> Option<Arc<Session>> {
        let member_id = self.connection_index.read().get(connection_id).cloned()?;
        let session_id = self.member_index.read().get(&member_id).cloned()?;
        self.sessions.read().get(&session_id).cloned()
    }

    /// Snapshot of non-empty sessions, newest first, plus capacity headroom.
    pub fn list_active(&self) -> ActiveSessionList {
        let mut sessions: Vec<ActiveSessionSummary> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.member_count() > 0)
            .map(|s| ActiveSessionSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                member_count: s.member_count(),
                max_members: self.options.max_members_per_session,
                created_at: s.created_at_wire(),
                game_started: s.game_started(),
            })
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let active = sessions.len();
        ActiveSessionList {
            sessions,
            max_sessions: self.options.max_sessions,
            can_create_session: active < self.options.max_sessions,
        }
    }
}
