//! Conflict resolver for private entries.
//!
//! Textual last-writer-wins, except that a genuine concurrent edit keeps both
//! texts side by side so user text is never silently dropped.

use serde::Serialize;

use crate::models::{EntryContent, Record};
use crate::{Error, Result};

/// Which branch of the resolver produced the authoritative record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// No local copy existed; the remote record was taken as-is
    AcceptedNew,
    /// Remote has nothing newer than the last reconciliation
    KeptLocal,
    /// Only the remote side changed
    AcceptedRemote,
    /// Both sides changed to the same text
    FalseConflict,
    /// Both sides changed; texts were concatenated around a marker
    Merged,
}

/// Outcome of reconciling one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: Record,
    pub decision: Decision,
}

/// Reconcile a local record with its remote copy.
///
/// `now` becomes the `updated_at` of a merged record so the merge itself is
/// treated as a fresh local change and pushed on the same pass.
pub fn resolve(
    local: Option<&Record>,
    remote: &Record,
    now: i64,
    conflict_marker: &str,
) -> Result<Resolution> {
    let Some(local) = local else {
        return Ok(Resolution {
            record: accept_remote(remote),
            decision: Decision::AcceptedNew,
        });
    };

    if local.id != remote.id {
        return Err(Error::ConflictUnresolvable(format!(
            "local record {} paired with remote record {}",
            local.id, remote.id
        )));
    }

    if remote.updated_at <= local.synced_at {
        return Ok(Resolution {
            record: local.clone(),
            decision: Decision::KeptLocal,
        });
    }

    if local.updated_at <= local.synced_at {
        return Ok(Resolution {
            record: accept_remote(remote),
            decision: Decision::AcceptedRemote,
        });
    }

    if local.content.same_text(&remote.content) {
        return Ok(Resolution {
            record: accept_remote(remote),
            decision: Decision::FalseConflict,
        });
    }

    Ok(Resolution {
        record: merge_conflict(local, remote, now, conflict_marker),
        decision: Decision::Merged,
    })
}

fn accept_remote(remote: &Record) -> Record {
    let mut record = remote.clone();
    record.synced_at = remote.updated_at;
    record
}

fn merge_conflict(local: &Record, remote: &Record, now: i64, marker: &str) -> Record {
    let mut media = remote.content.media.clone();
    for item in &local.content.media {
        if !media.contains(item) {
            media.push(item.clone());
        }
    }

    let content = EntryContent {
        text: format!("{}{marker}{}", remote.content.text, local.content.text),
        mood: local.content.mood.clone().or_else(|| remote.content.mood.clone()),
        media,
    };

    // A skewed local clock must not make the merge look older than its inputs
    let updated_at = now.max(local.updated_at.max(remote.updated_at) + 1);

    Record {
        id: local.id.clone(),
        content,
        author_id: local.author_id.clone().or_else(|| remote.author_id.clone()),
        author_name: local
            .author_name
            .clone()
            .or_else(|| remote.author_name.clone()),
        created_at: local.created_at.min(remote.created_at),
        updated_at,
        synced_at: 0,
        reactions: local.reactions.clone(),
        comments: local.comments.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MARKER: &str = "\n--- conflict ---\n";

    fn record(text: &str, updated_at: i64, synced_at: i64) -> Record {
        let mut record = Record::draft("2024-01-01", EntryContent::text(text));
        record.created_at = 1;
        record.updated_at = updated_at;
        record.synced_at = synced_at;
        record
    }

    #[test]
    fn absent_local_accepts_remote() {
        let remote = record("remote", 150, 0);
        let resolution = resolve(None, &remote, 999, MARKER).unwrap();
        assert_eq!(resolution.decision, Decision::AcceptedNew);
        assert_eq!(resolution.record.synced_at, 150);
        assert_eq!(resolution.record.content.text, "remote");
    }

    #[test]
    fn stale_remote_keeps_local() {
        let local = record("local edit", 200, 150);
        let remote = record("old", 150, 0);
        let resolution = resolve(Some(&local), &remote, 999, MARKER).unwrap();
        assert_eq!(resolution.decision, Decision::KeptLocal);
        assert_eq!(resolution.record, local);
    }

    #[test]
    fn clean_local_accepts_newer_remote() {
        let local = record("Morning thoughts", 100, 100);
        let remote = record("Morning thoughts and more", 150, 0);
        let resolution = resolve(Some(&local), &remote, 999, MARKER).unwrap();
        assert_eq!(resolution.decision, Decision::AcceptedRemote);
        assert_eq!(resolution.record.content.text, "Morning thoughts and more");
        assert_eq!(resolution.record.synced_at, 150);
    }

    #[test]
    fn genuine_conflict_keeps_both_texts() {
        let local = record("A", 200, 100);
        let remote = record("B", 150, 0);
        let resolution = resolve(Some(&local), &remote, 300, MARKER).unwrap();
        assert_eq!(resolution.decision, Decision::Merged);
        assert_eq!(resolution.record.content.text, format!("B{MARKER}A"));
        assert_eq!(resolution.record.updated_at, 300);
        assert_eq!(resolution.record.synced_at, 0);
    }

    #[test]
    fn merge_never_predates_inputs() {
        let local = record("A", 200, 100);
        let remote = record("B", 250, 0);
        let resolution = resolve(Some(&local), &remote, 10, MARKER).unwrap();
        assert_eq!(resolution.record.updated_at, 251);
    }

    #[test]
    fn merge_combines_media_and_prefers_local_mood() {
        let mut local = record("A", 200, 100);
        local.content.media = vec!["img-1".into(), "img-2".into()];
        local.content.mood = Some("happy".into());
        let mut remote = record("B", 150, 0);
        remote.content.media = vec!["img-2".into(), "img-3".into()];
        remote.content.mood = Some("tired".into());

        let merged = resolve(Some(&local), &remote, 300, MARKER).unwrap().record;
        assert_eq!(merged.content.media, vec!["img-2", "img-3", "img-1"]);
        assert_eq!(merged.content.mood.as_deref(), Some("happy"));
    }

    #[test]
    fn identical_text_is_false_conflict() {
        let local = record("Same words \n", 200, 100);
        let remote = record("  Same words", 150, 0);
        let resolution = resolve(Some(&local), &remote, 300, MARKER).unwrap();
        assert_eq!(resolution.decision, Decision::FalseConflict);
        assert_eq!(resolution.record.content, remote.content);
        assert!(!resolution.record.content.text.contains("conflict"));
        assert_eq!(resolution.record.synced_at, 150);
    }

    #[test]
    fn mismatched_ids_are_unresolvable() {
        let local = record("A", 200, 100);
        let mut remote = record("B", 150, 0);
        remote.id = "2024-01-02".into();
        assert!(matches!(
            resolve(Some(&local), &remote, 300, MARKER),
            Err(Error::ConflictUnresolvable(_))
        ));
    }

    #[test]
    fn resolving_merged_record_against_its_pushed_copy_is_noop() {
        let local = record("A", 200, 100);
        let remote = record("B", 150, 0);
        let mut merged = resolve(Some(&local), &remote, 300, MARKER).unwrap().record;
        merged.mark_synced();

        let again = resolve(Some(&merged), &merged.clone(), 400, MARKER).unwrap();
        assert_eq!(again.decision, Decision::KeptLocal);
        assert_eq!(again.record, merged);
    }
}
