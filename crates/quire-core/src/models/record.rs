//! Record model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CommentList, ReactionSet};
use crate::util::now_millis;

/// Opaque entry payload.
///
/// Sync logic only ever compares `text`; mood and media ride along.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryContent {
    /// Free-form entry text
    pub text: String,
    /// Optional mood tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Media references (object keys or URLs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

impl EntryContent {
    /// Text-only content
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach a mood tag
    #[must_use]
    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    /// Whether both texts are equal once surrounding whitespace is ignored
    #[must_use]
    pub fn same_text(&self, other: &Self) -> bool {
        self.text.trim() == other.text.trim()
    }
}

/// The unit of synchronization.
///
/// Private entries are keyed by date (`2024-01-01`), shared entries by a
/// generated id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable key
    pub id: String,
    /// Entry payload
    pub content: EntryContent,
    /// Author of a shared entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// Display name of the author at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation (Unix ms), 0 if never mutated locally
    pub updated_at: i64,
    /// Last successful reconciliation with the remote copy (Unix ms)
    #[serde(default)]
    pub synced_at: i64,
    /// Emoji reactions on a shared entry
    #[serde(default, skip_serializing_if = "ReactionSet::is_empty")]
    pub reactions: ReactionSet,
    /// Comments on a shared entry
    #[serde(default, skip_serializing_if = "CommentList::is_empty")]
    pub comments: CommentList,
}

impl Record {
    /// Create a fresh local draft that has never been synced
    #[must_use]
    pub fn draft(id: impl Into<String>, content: EntryContent) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            content,
            author_id: None,
            author_name: None,
            created_at: now,
            updated_at: now,
            synced_at: 0,
            reactions: ReactionSet::default(),
            comments: CommentList::default(),
        }
    }

    /// Create a shared journal entry with a generated, time-sortable id
    #[must_use]
    pub fn shared(
        author_id: impl Into<String>,
        author_name: impl Into<String>,
        content: EntryContent,
    ) -> Self {
        let mut record = Self::draft(generate_entry_id(), content);
        record.author_id = Some(author_id.into());
        record.author_name = Some(author_name.into());
        record
    }

    /// Whether the record carries changes the remote has not seen
    #[must_use]
    pub const fn has_unsynced_changes(&self) -> bool {
        self.updated_at > self.synced_at
    }

    /// Promote the sync watermark after a successful write
    pub fn mark_synced(&mut self) {
        self.synced_at = self.updated_at;
    }

    /// Whether `user_id` wrote this entry
    #[must_use]
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id.as_deref() == Some(user_id)
    }
}

/// Generate a new shared-entry id (UUID v7, time-sortable)
#[must_use]
pub fn generate_entry_id() -> String {
    Uuid::now_v7().to_string()
}
