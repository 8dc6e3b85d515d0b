//! Comment model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::now_millis;

/// A comment attached to a shared entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub author_name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Comment {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        author_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            text: text.into(),
            user_id: user_id.into(),
            author_name: author_name.into(),
            created_at: now_millis(),
        }
    }
}

/// Unordered comment collection with set semantics.
///
/// Removal matches whole comments structurally, mirroring the remote
/// remove-from-set primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentList(Vec<Comment>);

impl CommentList {
    /// Add a comment unless an identical one is already present
    pub fn add(&mut self, comment: Comment) -> bool {
        if self.0.contains(&comment) {
            return false;
        }
        self.0.push(comment);
        true
    }

    /// Remove every comment matching `predicate`; returns how many were removed
    pub fn remove_where(&mut self, predicate: impl Fn(&Comment) -> bool) -> usize {
        let before = self.0.len();
        self.0.retain(|comment| !predicate(comment));
        before - self.0.len()
    }

    /// Remove a comment by structural equality
    pub fn remove(&mut self, comment: &Comment) -> bool {
        self.remove_where(|existing| existing == comment) > 0
    }

    #[must_use]
    pub fn find(&self, comment_id: &str) -> Option<&Comment> {
        self.0.iter().find(|comment| comment.id == comment_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
