//! Synchronized object state.

use armada_core::{MemberId, ObjectId, SessionId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifetime binding of an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectScope {
    /// Dies with its owner.
    PerMember,
    /// Outlives its owner; ownership migrates on departure.
    PerSession,
}

impl ObjectScope {
    /// Wire name of the scope.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerMember => "perMember",
            Self::PerSession => "perSession",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "perMember" => Some(Self::PerMember),
            "perSession" => Some(Self::PerSession),
            _ => None,
        }
    }
}

/// A shared object inside a session.
///
/// `data` is opaque to the core except for the `"type"` key, which feeds the
/// per-session type index.
#[derive(Clone, Debug)]
pub struct SyncObject {
    pub id: ObjectId,
    pub session_id: SessionId,
    /// Who created the object. Never changes.
    pub creator: MemberId,
    /// Who currently owns it. Reassigned by departure migration.
    pub owner: MemberId,
    pub scope: ObjectScope,
    pub data: Map<String, Value>,
    /// Starts at 1; incremented on every update and ownership change.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncObject {
    /// Create a fresh object at version 1.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        creator: MemberId,
        owner: MemberId,
        scope: ObjectScope,
        data: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            session_id,
            creator,
            owner,
            scope,
            data,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// The string value of the `"type"` key, if present.
    #[must_use]
    pub fn type_key(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }

    /// Shallow key-wise merge: patch keys overwrite, others are preserved.
    pub(crate) fn apply_patch(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            let _ = self.data.insert(key, value);
        }
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Wire representation.
    #[must_use]
    pub fn wire(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "sessionId": self.session_id,
            "creatorId": self.creator,
            "ownerId": self.owner,
            "scope": self.scope,
            "data": self.data,
            "version": self.version,
            "createdAt": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "updatedAt": self.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_object(data: Map<String, Value>) -> SyncObject {
        SyncObject::new(
            SessionId::new(),
            MemberId::from("creator"),
            MemberId::from("creator"),
            ObjectScope::PerSession,
            data,
        )
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn new_object_starts_at_version_one() {
        let obj = make_object(Map::new());
        assert_eq!(obj.version, 1);
        assert_eq!(obj.created_at, obj.updated_at);
    }

    #[test]
    fn type_key_reads_string_only() {
        let typed = make_object(map(json!({"type": "asteroid"})));
        assert_eq!(typed.type_key(), Some("asteroid"));

        let numeric = make_object(map(json!({"type": 7})));
        assert_eq!(numeric.type_key(), None);

        let untyped = make_object(Map::new());
        assert_eq!(untyped.type_key(), None);
    }

    #[test]
    fn patch_is_shallow_merge() {
        let mut obj = make_object(map(json!({"x": 1.0, "hull": {"hp": 3}})));
        obj.apply_patch(map(json!({"x": 2.5, "y": 4.0})));

        assert_eq!(obj.data["x"], 2.5);
        assert_eq!(obj.data["y"], 4.0);
        // Untouched keys survive, including nested values (no deep merge).
        assert_eq!(obj.data["hull"]["hp"], 3);
        assert_eq!(obj.version, 2);
    }

    #[test]
    fn patch_overwrites_nested_values_wholesale() {
        let mut obj = make_object(map(json!({"hull": {"hp": 3, "shield": 1}})));
        obj.apply_patch(map(json!({"hull": {"hp": 2}})));
        assert_eq!(obj.data["hull"], json!({"hp": 2}));
    }

    #[test]
    fn patch_bumps_version_by_one() {
        let mut obj = make_object(Map::new());
        obj.apply_patch(Map::new());
        obj.apply_patch(map(json!({"a": 1})));
        assert_eq!(obj.version, 3);
    }

    #[test]
    fn scope_wire_names() {
        assert_eq!(ObjectScope::PerMember.as_str(), "perMember");
        assert_eq!(ObjectScope::parse("perSession"), Some(ObjectScope::PerSession));
        assert_eq!(ObjectScope::parse("session"), None);
        assert_eq!(
            serde_json::to_string(&ObjectScope::PerMember).unwrap(),
            "\"perMember\""
        );
    }

    #[test]
    fn wire_shape() {
        let obj = make_object(map(json!({"type": "ship"})));
        let v = obj.wire();
        assert_eq!(v["id"], json!(obj.id.as_str()));
        assert_eq!(v["creatorId"], "creator");
        assert_eq!(v["ownerId"], "creator");
        assert_eq!(v["scope"], "perSession");
        assert_eq!(v["version"], 1);
        assert_eq!(v["data"]["type"], "ship");
        assert!(v["createdAt"].as_str().unwrap().ends_with('Z'));
    }
}
