//! Remote document store abstraction.
//!
//! The remote is a shared, multi-writer store. Besides whole-document reads
//! and writes it offers narrow atomic field operations (add/remove from a set
//! field, delete a field) so concurrent writers never clobber each other's
//! reactions, comments or membership changes.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::{Comment, EntryContent, Journal, LastEntry, Record, Report, Role};
use crate::Result;

pub use memory::MemoryRemoteStore;

/// Narrow atomic update on a single shared entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EntryFieldOp {
    AddReaction { emoji: String, user_id: String },
    RemoveReaction { emoji: String, user_id: String },
    AddComment { comment: Comment },
    RemoveComment { comment: Comment },
    SetContent { content: EntryContent, updated_at: i64 },
}

impl EntryFieldOp {
    /// Apply the operation to a record; returns whether anything changed
    pub fn apply(&self, record: &mut Record) -> bool {
        match self {
            Self::AddReaction { emoji, user_id } => record.reactions.add(emoji, user_id),
            Self::RemoveReaction { emoji, user_id } => record.reactions.remove(emoji, user_id),
            Self::AddComment { comment } => record.comments.add(comment.clone()),
            Self::RemoveComment { comment } => record.comments.remove(comment),
            Self::SetContent {
                content,
                updated_at,
            } => {
                let changed = record.content != *content || record.updated_at != *updated_at;
                record.content = content.clone();
                record.updated_at = *updated_at;
                changed
            }
        }
    }
}

/// Narrow atomic update on a journal document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalFieldOp {
    SetLastEntry { entry: LastEntry },
    /// Delete the cached last-entry field entirely
    ClearLastEntry,
    AddMember { member_id: String },
    RemoveMember { member_id: String },
    SetRole { member_id: String, role: Role },
    RemoveRole { member_id: String },
    Touch { updated_at: i64 },
}

impl JournalFieldOp {
    pub fn apply(&self, journal: &mut Journal) {
        match self {
            Self::SetLastEntry { entry } => journal.last_entry = Some(entry.clone()),
            Self::ClearLastEntry => journal.last_entry = None,
            Self::AddMember { member_id } => {
                if !journal.members.contains(member_id) {
                    journal.members.push(member_id.clone());
                }
            }
            Self::RemoveMember { member_id } => journal.members.retain(|m| m != member_id),
            Self::SetRole { member_id, role } => {
                journal.roles.insert(member_id.clone(), *role);
            }
            Self::RemoveRole { member_id } => {
                journal.roles.remove(member_id);
            }
            Self::Touch { updated_at } => journal.updated_at = *updated_at,
        }
    }
}

/// Kind of change delivered by a snapshot subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    /// Deleted remotely
    Removed,
    /// Still stored remotely but pushed out of the window by newer entries
    Evicted,
}

/// One diff entry of a subscription snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    pub kind: ChangeKind,
    pub record: Record,
}

/// Receiving end of a snapshot subscription.
///
/// Each message is one snapshot's ordered diff. Dropping the feed ends the
/// subscription on the remote side.
pub type EntryFeed = mpsc::UnboundedReceiver<Vec<EntryChange>>;

/// Operations the sync core needs from the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full private collection of `user_id` (one round trip)
    async fn fetch_private(&self, user_id: &str) -> Result<Vec<Record>>;

    /// Replace the given private records atomically (all-or-nothing)
    async fn commit_private(&self, user_id: &str, records: Vec<Record>) -> Result<()>;

    /// Delete one private record
    async fn delete_private(&self, user_id: &str, record_id: &str) -> Result<()>;

    /// Point read of a journal document
    async fn fetch_journal(&self, journal_id: &str) -> Result<Option<Journal>>;

    /// Create or replace a journal document
    async fn put_journal(&self, journal: &Journal) -> Result<()>;

    /// Apply narrow field operations to a journal atomically
    async fn update_journal(&self, journal_id: &str, ops: Vec<JournalFieldOp>) -> Result<()>;

    /// Delete a journal together with its entries and reports
    async fn delete_journal(&self, journal_id: &str) -> Result<()>;

    /// Create or replace a shared entry
    async fn put_entry(&self, journal_id: &str, record: &Record) -> Result<()>;

    /// Apply a narrow field operation to a shared entry
    async fn update_entry(&self, journal_id: &str, entry_id: &str, op: EntryFieldOp)
        -> Result<()>;

    async fn delete_entry(&self, journal_id: &str, entry_id: &str) -> Result<()>;

    /// Subscribe to the `window` most recent entries of a journal.
    ///
    /// The first message carries the initial window as `Added` changes.
    async fn subscribe_entries(&self, journal_id: &str, window: usize) -> Result<EntryFeed>;

    /// Up to `count` entries created strictly before `before`, newest first
    async fn fetch_entries_before(
        &self,
        journal_id: &str,
        before: i64,
        count: usize,
    ) -> Result<Vec<Record>>;

    /// Reports filed by `reporter_id` against `content_id`
    async fn find_reports(
        &self,
        journal_id: &str,
        content_id: &str,
        reporter_id: &str,
    ) -> Result<Vec<Report>>;

    async fn insert_report(&self, report: &Report) -> Result<()>;

    async fn list_reports(&self, journal_id: &str) -> Result<Vec<Report>>;

    /// Delete every report for `content_id` in one batch; returns how many
    async fn delete_reports_for_content(&self, journal_id: &str, content_id: &str)
        -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_ops_report_changes() {
        let mut record = Record::draft("e1", EntryContent::text("hi"));
        let add = EntryFieldOp::AddReaction {
            emoji: "👍".into(),
            user_id: "ana".into(),
        };
        assert!(add.apply(&mut record));
        assert!(!add.apply(&mut record));

        let remove = EntryFieldOp::RemoveReaction {
            emoji: "👍".into(),
            user_id: "ana".into(),
        };
        assert!(remove.apply(&mut record));
        assert!(record.reactions.is_empty());
    }

    #[test]
    fn journal_ops_edit_membership_and_cache() {
        let mut journal = Journal::new("j1", "Trip", "ana", 1);
        JournalFieldOp::AddMember {
            member_id: "ben".into(),
        }
        .apply(&mut journal);
        JournalFieldOp::SetRole {
            member_id: "ben".into(),
            role: Role::Admin,
        }
        .apply(&mut journal);
        assert_eq!(journal.role_of("ben"), Some(Role::Admin));

        JournalFieldOp::SetLastEntry {
            entry: LastEntry {
                id: "e1".into(),
                snippet: "hi".into(),
                author_id: Some("ben".into()),
                created_at: 5,
            },
        }
        .apply(&mut journal);
        assert!(journal.last_entry.is_some());
        JournalFieldOp::ClearLastEntry.apply(&mut journal);
        assert!(journal.last_entry.is_none());
    }

    #[test]
    fn field_ops_serialize_with_tag() {
        let json = serde_json::to_string(&JournalFieldOp::ClearLastEntry).unwrap();
        assert_eq!(json, r#"{"op":"clear_last_entry"}"#);
    }
}
