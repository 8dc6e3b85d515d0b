//! Local record store.
//!
//! The process-owned source of truth for the UI. Every operation is
//! synchronous and replaces whole keyed entries; ordering guarantees come
//! from the conflict resolver and narrow remote operations, not from here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::db::SnapshotRepository;
use crate::models::{Journal, Record};
use crate::mutation::{PendingWrite, RemoteWrite};
use crate::{Error, Result};

/// Records keyed by id
pub type RecordMap = BTreeMap<String, Record>;

/// Keyed map of records for one collection.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<RecordMap>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Record> {
        self.records.read().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }

    /// Replace the entry for `record.id`; returns the previous record
    pub fn upsert(&self, record: Record) -> Option<Record> {
        self.records.write().insert(record.id.clone(), record)
    }

    pub fn delete(&self, id: &str) -> Option<Record> {
        self.records.write().remove(id)
    }

    /// Read-modify-write of one record under a single write lock.
    ///
    /// Returns the updated record, or `None` when `id` is absent.
    pub fn update(&self, id: &str, apply: impl FnOnce(&mut Record)) -> Option<Record> {
        let mut records = self.records.write();
        let record = records.get_mut(id)?;
        apply(record);
        Some(record.clone())
    }

    /// Bulk restore; the previous contents are discarded
    pub fn replace_all(&self, records: RecordMap) {
        *self.records.write() = records;
    }

    #[must_use]
    pub fn snapshot(&self) -> RecordMap {
        self.records.read().clone()
    }

    /// Records ordered newest first by creation time
    #[must_use]
    pub fn by_recency(&self) -> Vec<Record> {
        let mut records = self.records.read().values().cloned().collect::<Vec<_>>();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records
    }

    #[must_use]
    pub fn newest(&self) -> Option<Record> {
        self.records
            .read()
            .values()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Install the result of a sync pass computed from `base`.
    ///
    /// Records edited or deleted locally while the pass was in flight keep
    /// their current local state; they are picked up by the next pass.
    /// Returns the ids that were left untouched for that reason.
    pub fn commit_merge(&self, base: &RecordMap, merged: RecordMap) -> Vec<String> {
        let mut records = self.records.write();
        let mut skipped = Vec::new();
        for (id, record) in merged {
            let current = records.get(&id);
            if current != base.get(&id) {
                skipped.push(id);
                continue;
            }
            records.insert(id, record);
        }
        skipped
    }
}

/// Wholesale copy of the local state, used for persistence and backups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    #[serde(default)]
    pub private: RecordMap,
    #[serde(default)]
    pub journals: BTreeMap<String, Journal>,
    #[serde(default)]
    pub entries: BTreeMap<String, RecordMap>,
    #[serde(default)]
    pub pending_writes: Vec<PendingWrite>,
}

/// Dependency-injected container for all client-side state.
///
/// Construct one per signed-in user and hand the same `Arc` to the sync
/// orchestrator, listener and mutation pipeline.
#[derive(Debug, Default)]
pub struct LocalState {
    private: RecordStore,
    journals: RwLock<BTreeMap<String, Journal>>,
    entries: RwLock<BTreeMap<String, Arc<RecordStore>>>,
    pending_writes: RwLock<Vec<PendingWrite>>,
    /// Private ids whose remote delete is running right now
    deleting_private: RwLock<BTreeSet<String>>,
}

impl LocalState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The signed-in user's private entries, keyed by date
    #[must_use]
    pub const fn private(&self) -> &RecordStore {
        &self.private
    }

    /// Entry store of a journal, created empty on first access
    #[must_use]
    pub fn entries(&self, journal_id: &str) -> Arc<RecordStore> {
        if let Some(store) = self.entries.read().get(journal_id) {
            return Arc::clone(store);
        }
        Arc::clone(
            self.entries
                .write()
                .entry(journal_id.to_string())
                .or_default(),
        )
    }

    #[must_use]
    pub fn journal(&self, journal_id: &str) -> Option<Journal> {
        self.journals.read().get(journal_id).cloned()
    }

    /// Fetch a journal or fail with `NotFound`
    pub fn require_journal(&self, journal_id: &str) -> Result<Journal> {
        self.journal(journal_id)
            .ok_or_else(|| Error::NotFound(format!("journal {journal_id}")))
    }

    #[must_use]
    pub fn journals(&self) -> Vec<Journal> {
        self.journals.read().values().cloned().collect()
    }

    pub fn put_journal(&self, journal: Journal) {
        self.journals.write().insert(journal.id.clone(), journal);
    }

    /// Read-modify-write of a journal under a single write lock
    pub fn update_journal(
        &self,
        journal_id: &str,
        apply: impl FnOnce(&mut Journal),
    ) -> Result<Journal> {
        let mut journals = self.journals.write();
        let journal = journals
            .get_mut(journal_id)
            .ok_or_else(|| Error::NotFound(format!("journal {journal_id}")))?;
        apply(journal);
        Ok(journal.clone())
    }

    /// Drop a journal and its entries
    pub fn remove_journal(&self, journal_id: &str) -> Option<Journal> {
        self.entries.write().remove(journal_id);
        self.journals.write().remove(journal_id)
    }

    pub fn push_pending(&self, write: PendingWrite) {
        self.pending_writes.write().push(write);
    }

    /// Remove and return every queued write
    pub fn take_pending(&self) -> Vec<PendingWrite> {
        std::mem::take(&mut *self.pending_writes.write())
    }

    #[must_use]
    pub fn pending(&self) -> Vec<PendingWrite> {
        self.pending_writes.read().clone()
    }

    pub fn begin_private_delete(&self, record_id: &str) {
        self.deleting_private.write().insert(record_id.to_string());
    }

    pub fn finish_private_delete(&self, record_id: &str) {
        self.deleting_private.write().remove(record_id);
    }

    /// Private ids of `user_id` deleted locally whose remote copy may still
    /// exist: deletes in flight plus deletes queued for retry
    #[must_use]
    pub fn private_tombstones(&self, user_id: &str) -> BTreeSet<String> {
        let mut tombstones = self.deleting_private.read().clone();
        tombstones.extend(self.pending_writes.read().iter().filter_map(|pending| {
            match &pending.write {
                RemoteWrite::DeletePrivate {
                    user_id: owner,
                    record_id,
                } if owner == user_id => Some(record_id.clone()),
                _ => None,
            }
        }));
        tombstones
    }

    #[must_use]
    pub fn snapshot(&self) -> LocalSnapshot {
        LocalSnapshot {
            private: self.private.snapshot(),
            journals: self.journals.read().clone(),
            entries: self
                .entries
                .read()
                .iter()
                .map(|(id, store)| (id.clone(), store.snapshot()))
                .collect(),
            pending_writes: self.pending(),
        }
    }

    /// Replace every map at once from a snapshot
    pub fn replace_all(&self, snapshot: LocalSnapshot) {
        self.private.replace_all(snapshot.private);
        *self.journals.write() = snapshot.journals;
        *self.entries.write() = snapshot
            .entries
            .into_iter()
            .map(|(id, records)| {
                let store = RecordStore::new();
                store.replace_all(records);
                (id, Arc::new(store))
            })
            .collect();
        *self.pending_writes.write() = snapshot.pending_writes;
    }

    /// Write the full state through a snapshot repository
    pub fn persist(&self, repository: &impl SnapshotRepository) -> Result<()> {
        repository.save(&self.snapshot())
    }

    /// Load state previously written with [`LocalState::persist`]
    pub fn restore(&self, repository: &impl SnapshotRepository) -> Result<()> {
        self.replace_all(repository.load()?);
        Ok(())
    }
}
