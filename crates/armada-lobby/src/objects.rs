//! Per-session object registry.
//!
//! Each session owns an insertion-ordered object map plus a type index
//! (`type → object ids`). Both live under one lock per session, so every
//! observable state has a consistent index, and optimistic version checks
//! are race-free.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use armada_core::{MemberId, ObjectId, SessionId};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::object::{ObjectScope, SyncObject};
use crate::registry::SessionRegistry;

/// One entry of a batch update.
#[derive(Clone, Debug)]
pub struct ObjectPatch {
    pub object_id: ObjectId,
    pub data: Map<String, Value>,
    /// Optimistic concurrency: skip the patch unless the current version
    /// matches.
    pub expected_version: Option<u64>,
}

/// An ownership reassignment performed during departure handling.
#[derive(Clone, Debug)]
pub struct Migration {
    pub object_id: ObjectId,
    pub new_owner: MemberId,
}

/// What a member's departure did to the session's objects.
#[derive(Clone, Debug, Default)]
pub struct DepartureEffects {
    /// Per-member objects removed, in store order.
    pub deleted_ids: Vec<ObjectId>,
    /// Per-session objects reassigned, in store order.
    pub migrations: Vec<Migration>,
    /// Types of deleted objects; candidates for a now-empty signal.
    pub affected_types: Vec<String>,
}

#[derive(Default)]
struct StoreInner {
    objects: IndexMap<ObjectId, SyncObject>,
    by_type: HashMap<String, HashSet<ObjectId>>,
}

impl StoreInner {
    fn index_type(&mut self, object: &SyncObject) {
        if let Some(kind) = object.type_key() {
            let _ = self
                .by_type
                .entry(kind.to_owned())
                .or_default()
                .insert(object.id.clone());
        }
    }

    fn unindex_type(&mut self, kind: Option<&str>, id: &ObjectId) {
        if let Some(kind) = kind {
            if let Some(set) = self.by_type.get_mut(kind) {
                let _ = set.remove(id);
                if set.is_empty() {
                    let _ = self.by_type.remove(kind);
                }
            }
        }
    }
}

struct ObjectStore {
    inner: RwLock<StoreInner>,
}

impl ObjectStore {
    fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }
}

/// Object storage across all sessions.
pub struct ObjectRegistry {
    sessions: Arc<SessionRegistry>,
    distribute_orphans: bool,
    stores: RwLock<HashMap<SessionId, Arc<ObjectStore>>>,
}

impl ObjectRegistry {
    /// Create a registry validating membership against `sessions`.
    #[must_use]
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        let distribute_orphans = sessions.options().distribute_orphaned_objects;
        Self {
            sessions,
            distribute_orphans,
            stores: RwLock::new(HashMap::new()),
        }
    }

    fn store(&self, session_id: &SessionId) -> Option<Arc<ObjectStore>> {
        self.stores.read().get(session_id).cloned()
    }

    fn store_or_create(&self, session_id: &SessionId) -> Arc<ObjectStore> {
        if let Some(store) = self.store(session_id) {
            return store;
        }
        self.stores
            .write()
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(ObjectStore::new()))
            .clone()
    }

    /// Create an object owned by `owner` (defaulting to the creator).
    ///
    /// Returns `None` when the session is gone, the creator is not a member,
    /// or an explicit owner is not a member.
    pub fn create_object(
        &self,
        session_id: &SessionId,
        creator: &MemberId,
        scope: ObjectScope,
        data: Option<Map<String, Value>>,
        owner: Option<MemberId>,
    ) -> Option<SyncObject> {
        let session = self.sessions.get_session(session_id)?;
        if session.member(creator).is_none() {
            warn!(session_id = %session_id, member_id = %creator, "creator is not a member");
            return None;
        }
        if let Some(ref owner) = owner {
            if session.member(owner).is_none() {
                warn!(session_id = %session_id, member_id = %owner, "owner is not a member");
                return None;
            }
        }

        let object = SyncObject::new(
            session_id.clone(),
            creator.clone(),
            owner.unwrap_or_else(|| creator.clone()),
            scope,
            data.unwrap_or_default(),
        );

        let store = self.store_or_create(session_id);
        let mut inner = store.inner.write();
        inner.index_type(&object);
        let _ = inner.objects.insert(object.id.clone(), object.clone());
        debug!(
            session_id = %session_id,
            object_id = %object.id,
            scope = object.scope.as_str(),
            "object created"
        );
        Some(object)
    }

    /// Fetch a snapshot of one object.
    pub fn get_object(&self, session_id: &SessionId, object_id: &ObjectId) -> Option<SyncObject> {
        let store = self.store(session_id)?;
        let inner = store.inner.read();
        inner.objects.get(object_id).cloned()
    }

    /// All objects of a session in creation order.
    pub fn list_session_objects(&self, session_id: &SessionId) -> Vec<SyncObject> {
        match self.store(session_id) {
            Some(store) => store.inner.read().objects.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Apply a shallow patch to one object.
    ///
    /// Returns `None` when the session or object is missing, or when
    /// `expected_version` is supplied and stale — a silent no-op, not an
    /// error.
    pub fn update_object(
        &self,
        session_id: &SessionId,
        object_id: &ObjectId,
        patch: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> Option<SyncObject> {
        let store = self.store(session_id)?;
        let mut inner = store.inner.write();

        let previous_type = {
            let object = inner.objects.get(object_id)?;
            if expected_version.is_some_and(|expected| expected != object.version) {
                debug!(
                    object_id = %object_id,
                    expected = expected_version,
                    current = object.version,
                    "stale object update skipped"
                );
                return None;
            }
            object.type_key().map(ToOwned::to_owned)
        };

        let updated = {
            let object = inner.objects.get_mut(object_id)?;
            object.apply_patch(patch);
            object.clone()
        };

        let current_type = updated.type_key().map(ToOwned::to_owned);
        if previous_type != current_type {
            inner.unindex_type(previous_type.as_deref(), &updated.id);
            inner.index_type(&updated);
        }
        Some(updated)
    }

    /// Apply a batch of patches independently.
    ///
    /// Patches failing their precondition are skipped; the returned sequence
    /// holds the successful updates in input order. There is no transaction
    /// across patches.
    pub fn update_objects(
        &self,
        session_id: &SessionId,
        patches: Vec<ObjectPatch>,
    ) -> Vec<SyncObject> {
        patches
            .into_iter()
            .filter_map(|patch| {
                self.update_object(
                    session_id,
                    &patch.object_id,
                    patch.data,
                    patch.expected_version,
                )
            })
            .collect()
    }

    /// Atomically take an object out of the store.
    ///
    /// Idempotent: a second delete of the same ID returns `None`.
    pub fn delete_object(
        &self,
        session_id: &SessionId,
        object_id: &ObjectId,
    ) -> Option<SyncObject> {
        let store = self.store(session_id)?;
        let mut inner = store.inner.write();
        let object = inner.objects.shift_remove(object_id)?;
        let kind = object.type_key().map(ToOwned::to_owned);
        inner.unindex_type(kind.as_deref(), object_id);
        debug!(session_id = %session_id, object_id = %object_id, "object deleted");
        Some(object)
    }

    /// Number of live objects whose `"type"` equals `kind`.
    pub fn count_by_type(&self, session_id: &SessionId, kind: &str) -> usize {
        match self.store(session_id) {
            Some(store) => store
                .inner
                .read()
                .by_type
                .get(kind)
                .map_or(0, HashSet::len),
            None => 0,
        }
    }

    /// Apply departure consequences to every object owned by the departing
    /// member, in store order.
    ///
    /// Per-member objects are deleted. Per-session objects are reassigned to
    /// the remaining members — round-robin when distribution is enabled and
    /// more than one member remains, otherwise all to the first remaining
    /// member. With nobody left the session is being destroyed and objects
    /// are left for [`ObjectRegistry::drop_session`].
    pub fn handle_member_departure(
        &self,
        session_id: &SessionId,
        departing: &MemberId,
        remaining: &[MemberId],
    ) -> DepartureEffects {
        let mut effects = DepartureEffects::default();
        let Some(store) = self.store(session_id) else {
            return effects;
        };
        let mut inner = store.inner.write();

        let owned: Vec<ObjectId> = inner
            .objects
            .values()
            .filter(|o| &o.owner == departing)
            .map(|o| o.id.clone())
            .collect();

        let mut migrated = 0usize;
        for object_id in owned {
            let scope = match inner.objects.get(&object_id) {
                Some(object) => object.scope,
                None => continue,
            };
            match scope {
                ObjectScope::PerMember => {
                    if let Some(object) = inner.objects.shift_remove(&object_id) {
                        let kind = object.type_key().map(ToOwned::to_owned);
                        inner.unindex_type(kind.as_deref(), &object_id);
                        if let Some(kind) = kind {
                            if !effects.affected_types.contains(&kind) {
                                effects.affected_types.push(kind);
                            }
                        }
                        effects.deleted_ids.push(object_id);
                    }
                }
                ObjectScope::PerSession => {
                    if remaining.is_empty() {
                        continue;
                    }
                    let new_owner = if self.distribute_orphans && remaining.len() > 1 {
                        remaining[migrated % remaining.len()].clone()
                    } else {
                        remaining[0].clone()
                    };
                    migrated += 1;
                    if let Some(object) = inner.objects.get_mut(&object_id) {
                        object.owner = new_owner.clone();
                        object.version += 1;
                        object.updated_at = Utc::now();
                    }
                    effects.migrations.push(Migration {
                        object_id,
                        new_owner,
                    });
                }
            }
        }

        debug!(
            session_id = %session_id,
            member_id = %departing,
            deleted = effects.deleted_ids.len(),
            migrated = effects.migrations.len(),
            "departure applied to objects"
        );
        effects
    }

    /// Discard all object state of a destroyed session.
    pub fn drop_session(&self, session_id: &SessionId) {
        if self.stores.write().remove(session_id).is_some() {
            debug!(session_id = %session_id, "object store dropped");
        }
    }
}
