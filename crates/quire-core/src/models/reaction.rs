//! Reaction set model

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Per-entry map of `emoji -> users who reacted with it`.
///
/// Emoji keys without any users are never kept, so toggling a reaction twice
/// yields a set equal to the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionSet(BTreeMap<String, BTreeSet<String>>);

impl ReactionSet {
    /// Add `user_id` under `emoji`. Returns `false` if already present.
    pub fn add(&mut self, emoji: &str, user_id: &str) -> bool {
        self.0
            .entry(emoji.to_string())
            .or_default()
            .insert(user_id.to_string())
    }

    /// Remove `user_id` from `emoji`. Returns `false` if it was absent.
    pub fn remove(&mut self, emoji: &str, user_id: &str) -> bool {
        let Some(users) = self.0.get_mut(emoji) else {
            return false;
        };
        let removed = users.remove(user_id);
        if users.is_empty() {
            self.0.remove(emoji);
        }
        removed
    }

    /// Add if absent, remove if present. Returns `true` when the reaction is
    /// now present.
    pub fn toggle(&mut self, emoji: &str, user_id: &str) -> bool {
        if self.contains(emoji, user_id) {
            self.remove(emoji, user_id);
            false
        } else {
            self.add(emoji, user_id);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, emoji: &str, user_id: &str) -> bool {
        self.0.get(emoji).is_some_and(|users| users.contains(user_id))
    }

    /// Number of users who reacted with `emoji`
    #[must_use]
    pub fn count(&self, emoji: &str) -> usize {
        self.0.get(emoji).map_or(0, BTreeSet::len)
    }

    /// Iterate `(emoji, users)` pairs in emoji order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(emoji, users)| (emoji.as_str(), users))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
