//! Shared journal model

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-journal member role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Owners and admins may moderate and manage members
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        };
        f.write_str(name)
    }
}

/// Cached summary of the newest entry, shown in journal lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastEntry {
    pub id: String,
    pub snippet: String,
    pub author_id: Option<String>,
    pub created_at: i64,
}

/// A named, shared collection of entries plus membership metadata.
///
/// `roles` is the single source of truth for authority; the owner is derived
/// from it. Legacy documents that only carry an `owner` field (or neither)
/// are normalized on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "JournalDocument")]
pub struct Journal {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Members in join order
    pub members: Vec<String>,
    pub roles: BTreeMap<String, Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_entry: Option<LastEntry>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Journal {
    /// Create a journal owned by `owner_id`
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner_id: &str, now: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            photo_url: None,
            members: vec![owner_id.to_string()],
            roles: BTreeMap::from([(owner_id.to_string(), Role::Owner)]),
            last_entry: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived owner pointer
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|member| self.roles.get(*member) == Some(&Role::Owner))
            .map(String::as_str)
    }

    #[must_use]
    pub fn role_of(&self, member_id: &str) -> Option<Role> {
        self.roles.get(member_id).copied()
    }

    #[must_use]
    pub fn is_member(&self, member_id: &str) -> bool {
        self.roles.contains_key(member_id)
    }

    /// Member ids as a set
    #[must_use]
    pub fn member_ids(&self) -> BTreeSet<&str> {
        self.members.iter().map(String::as_str).collect()
    }

    /// Whether at least one member holds an owner or admin role
    #[must_use]
    pub fn has_privileged_member(&self) -> bool {
        self.roles.values().any(|role| role.is_privileged())
    }
}

/// Wire shape accepted for journals, including legacy fields.
#[derive(Deserialize)]
struct JournalDocument {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default, alias = "memberIds")]
    member_ids: Vec<String>,
    #[serde(default)]
    roles: BTreeMap<String, Role>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    last_entry: Option<LastEntry>,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    updated_at: i64,
}

impl From<JournalDocument> for Journal {
    fn from(doc: JournalDocument) -> Self {
        let mut members = Vec::with_capacity(doc.members.len());
        for member in doc.members.into_iter().chain(doc.member_ids) {
            if !members.contains(&member) {
                members.push(member);
            }
        }

        let mut roles = doc.roles;
        roles.retain(|member, _| members.contains(member));

        if !roles.values().any(|role| *role == Role::Owner) {
            if let Some(owner) = doc.owner.filter(|owner| members.contains(owner)) {
                roles.insert(owner, Role::Owner);
            }
        }
        // a journal always keeps at least one owner or admin
        if !roles.values().any(|role| role.is_privileged()) {
            if let Some(first) = members.first() {
                roles.insert(first.clone(), Role::Owner);
            }
        }
        for member in &members {
            roles.entry(member.clone()).or_insert(Role::Member);
        }

        Self {
            id: doc.id,
            name: doc.name,
            photo_url: doc.photo_url,
            members,
            roles,
            last_entry: doc.last_entry,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_journal_has_owner() {
        let journal = Journal::new("j1", "Family", "ana", 10);
        assert_eq!(journal.owner(), Some("ana"));
        assert_eq!(journal.role_of("ana"), Some(Role::Owner));
        assert!(journal.has_privileged_member());
    }

    #[test]
    fn legacy_owner_field_becomes_role() {
        let json = r#"{"id":"j1","name":"Trip","members":["ana","ben"],"owner":"ben"}"#;
        let journal: Journal = serde_json::from_str(json).unwrap();
        assert_eq!(journal.owner(), Some("ben"));
        assert_eq!(journal.role_of("ana"), Some(Role::Member));
    }

    #[test]
    fn missing_owner_and_roles_defaults_to_first_member() {
        let json = r#"{"id":"j1","members":["ana","ben"]}"#;
        let journal: Journal = serde_json::from_str(json).unwrap();
        assert_eq!(journal.owner(), Some("ana"));
        assert_eq!(journal.role_of("ben"), Some(Role::Member));
    }

    #[test]
    fn roles_map_wins_over_legacy_owner() {
        let json = r#"{
            "id":"j1",
            "members":["ana","ben"],
            "owner":"ana",
            "roles":{"ana":"member","ben":"owner"}
        }"#;
        let journal: Journal = serde_json::from_str(json).unwrap();
        assert_eq!(journal.owner(), Some("ben"));
        assert_eq!(journal.role_of("ana"), Some(Role::Member));
    }

    #[test]
    fn roles_without_privileged_member_promote_first_member() {
        let json = r#"{
            "id":"j1",
            "members":["ana","ben"],
            "roles":{"ana":"member","ben":"member"}
        }"#;
        let journal: Journal = serde_json::from_str(json).unwrap();
        assert_eq!(journal.owner(), Some("ana"));
        assert_eq!(journal.role_of("ben"), Some(Role::Member));
        assert!(journal.has_privileged_member());
    }

    #[test]
    fn member_ids_merge_into_ordered_members() {
        let json = r#"{
            "id":"j1",
            "members":["ana"],
            "member_ids":["ana","cy"],
            "roles":{"ana":"admin","ghost":"admin"}
        }"#;
        let journal: Journal = serde_json::from_str(json).unwrap();
        assert_eq!(journal.members, vec!["ana".to_string(), "cy".to_string()]);
        assert_eq!(journal.role_of("ghost"), None);
        assert_eq!(journal.role_of("cy"), Some(Role::Member));
        assert_eq!(journal.owner(), None);
        assert!(journal.has_privileged_member());
    }

    #[test]
    fn serialized_journal_round_trips() {
        let mut journal = Journal::new("j1", "Family", "ana", 10);
        journal.members.push("ben".into());
        journal.roles.insert("ben".into(), Role::Admin);
        let json = serde_json::to_string(&journal).unwrap();
        let parsed: Journal = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, journal);
    }
}
