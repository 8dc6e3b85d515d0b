//! In-process remote store.
//!
//! Implements every `RemoteStore` primitive with the same atomicity the
//! managed store guarantees. Used by tests and by the CLI, which persists the
//! document set as JSON between runs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{
    ChangeKind, EntryChange, EntryFeed, EntryFieldOp, JournalFieldOp, RemoteStore,
};
use crate::models::{Journal, Record, Report};
use crate::{Error, Result};

type RecordMap = BTreeMap<String, Record>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RemoteData {
    #[serde(default)]
    private: BTreeMap<String, RecordMap>,
    #[serde(default)]
    journals: BTreeMap<String, Journal>,
    #[serde(default)]
    entries: BTreeMap<String, RecordMap>,
    #[serde(default)]
    reports: Vec<Report>,
}

struct Subscriber {
    journal_id: String,
    window: usize,
    view: RecordMap,
    sender: mpsc::UnboundedSender<Vec<EntryChange>>,
}

/// Remote store held entirely in memory.
#[derive(Default)]
pub struct MemoryRemoteStore {
    data: Mutex<RemoteData>,
    subscribers: Mutex<Vec<Subscriber>>,
    offline: AtomicBool,
    reject_writes: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON document file; a missing file yields an
    /// empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let payload = std::fs::read_to_string(path)?;
        let data: RemoteData = serde_json::from_str(&payload)?;
        Ok(Self {
            data: Mutex::new(data),
            ..Self::default()
        })
    }

    /// Persist every document as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(&*self.data.lock())?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Make every call fail with a network error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make write calls fail with a network error while reads still succeed
    pub fn fail_writes(&self, fail: bool) {
        self.reject_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful private batch commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Replace a user's private collection without going through a commit
    pub fn seed_private(&self, user_id: &str, records: impl IntoIterator<Item = Record>) {
        let collection = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        self.data
            .lock()
            .private
            .insert(user_id.to_string(), collection);
    }

    #[must_use]
    pub fn private_record(&self, user_id: &str, record_id: &str) -> Option<Record> {
        self.data
            .lock()
            .private
            .get(user_id)
            .and_then(|records| records.get(record_id))
            .cloned()
    }

    #[must_use]
    pub fn journal(&self, journal_id: &str) -> Option<Journal> {
        self.data.lock().journals.get(journal_id).cloned()
    }

    #[must_use]
    pub fn entry(&self, journal_id: &str, entry_id: &str) -> Option<Record> {
        self.data
            .lock()
            .entries
            .get(journal_id)
            .and_then(|entries| entries.get(entry_id))
            .cloned()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<Report> {
        self.data.lock().reports.clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure("remote store unreachable".into()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        self.check_reachable()?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure("remote write rejected".into()));
        }
        Ok(())
    }

    /// Push window diffs to every live subscriber of `journal_id`
    fn notify(&self, journal_id: &str) {
        let entries = self
            .data
            .lock()
            .entries
            .get(journal_id)
            .cloned()
            .unwrap_or_default();

        let mut subscribers = self.subscribers.lock();
        subscribers.retain_mut(|subscriber| {
            if subscriber.journal_id != journal_id {
                return !subscriber.sender.is_closed();
            }
            let view = window_view(&entries, subscriber.window);
            let changes = diff_views(&subscriber.view, &view, &entries);
            subscriber.view = view;
            if changes.is_empty() {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(changes).is_ok()
        });
    }
}

/// The `window` most recent entries by creation time
fn window_view(entries: &RecordMap, window: usize) -> RecordMap {
    let mut ordered = entries.values().collect::<Vec<_>>();
    ordered.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    ordered
        .into_iter()
        .take(window)
        .map(|record| (record.id.clone(), record.clone()))
        .collect()
}

/// Departures first, then additions and modifications oldest to newest.
///
/// A record that left the window but is still in `entries` was pushed out
/// by newer ones and is reported as `Evicted`, not `Removed`.
fn diff_views(old: &RecordMap, new: &RecordMap, entries: &RecordMap) -> Vec<EntryChange> {
    let mut changes = old
        .iter()
        .filter(|(id, _)| !new.contains_key(*id))
        .map(|(id, record)| EntryChange {
            kind: if entries.contains_key(id) {
                ChangeKind::Evicted
            } else {
                ChangeKind::Removed
            },
            record: record.clone(),
        })
        .collect::<Vec<_>>();

    let mut upserts = new
        .iter()
        .filter_map(|(id, record)| match old.get(id) {
            None => Some(EntryChange {
                kind: ChangeKind::Added,
                record: record.clone(),
            }),
            Some(previous) if previous != record => Some(EntryChange {
                kind: ChangeKind::Modified,
                record: record.clone(),
            }),
            Some(_) => None,
        })
        .collect::<Vec<_>>();
    upserts.sort_by_key(|change| change.record.created_at);
    changes.extend(upserts);
    changes
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_private(&self, user_id: &str) -> Result<Vec<Record>> {
        self.check_reachable()?;
        Ok(self
            .data
            .lock()
            .private
            .get(user_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit_private(&self, user_id: &str, records: Vec<Record>) -> Result<()> {
        self.check_writable()?;
        let mut data = self.data.lock();
        let collection = data.private.entry(user_id.to_string()).or_default();
        for record in records {
            collection.insert(record.id.clone(), record);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_private(&self, user_id: &str, record_id: &str) -> Result<()> {
        self.check_writable()?;
        if let Some(records) = self.data.lock().private.get_mut(user_id) {
            records.remove(record_id);
        }
        Ok(())
    }

    async fn fetch_journal(&self, journal_id: &str) -> Result<Option<Journal>> {
        self.check_reachable()?;
        Ok(self.journal(journal_id))
    }

    async fn put_journal(&self, journal: &Journal) -> Result<()> {
        self.check_writable()?;
        self.data
            .lock()
            .journals
            .insert(journal.id.clone(), journal.clone());
        Ok(())
    }

    async fn update_journal(&self, journal_id: &str, ops: Vec<JournalFieldOp>) -> Result<()> {
        self.check_writable()?;
        let mut data = self.data.lock();
        let journal = data
            .journals
            .get_mut(journal_id)
            .ok_or_else(|| Error::NotFound(format!("journal {journal_id}")))?;
        for op in &ops {
            op.apply(journal);
        }
        Ok(())
    }

    async fn delete_journal(&self, journal_id: &str) -> Result<()> {
        self.check_writable()?;
        {
            let mut data = self.data.lock();
            data.journals.remove(journal_id);
            data.entries.remove(journal_id);
            data.reports.retain(|report| report.journal_id != journal_id);
        }
        self.notify(journal_id);
        Ok(())
    }

    async fn put_entry(&self, journal_id: &str, record: &Record) -> Result<()> {
        self.check_writable()?;
        {
            let mut data = self.data.lock();
            if !data.journals.contains_key(journal_id) {
                return Err(Error::NotFound(format!("journal {journal_id}")));
            }
            data.entries
                .entry(journal_id.to_string())
                .or_default()
                .insert(record.id.clone(), record.clone());
        }
        self.notify(journal_id);
        Ok(())
    }

    async fn update_entry(
        &self,
        journal_id: &str,
        entry_id: &str,
        op: EntryFieldOp,
    ) -> Result<()> {
        self.check_writable()?;
        {
            let mut data = self.data.lock();
            let record = data
                .entries
                .get_mut(journal_id)
                .and_then(|entries| entries.get_mut(entry_id))
                .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
            op.apply(record);
        }
        self.notify(journal_id);
        Ok(())
    }

    async fn delete_entry(&self, journal_id: &str, entry_id: &str) -> Result<()> {
        self.check_writable()?;
        if let Some(entries) = self.data.lock().entries.get_mut(journal_id) {
            entries.remove(entry_id);
        }
        self.notify(journal_id);
        Ok(())
    }

    async fn subscribe_entries(&self, journal_id: &str, window: usize) -> Result<EntryFeed> {
        self.check_reachable()?;
        let entries = self
            .data
            .lock()
            .entries
            .get(journal_id)
            .cloned()
            .unwrap_or_default();
        let view = window_view(&entries, window);
        let initial = diff_views(&RecordMap::new(), &view, &entries);

        let (sender, receiver) = mpsc::unbounded_channel();
        sender
            .send(initial)
            .map_err(|_| Error::NetworkFailure("subscription closed".into()))?;
        self.subscribers.lock().push(Subscriber {
            journal_id: journal_id.to_string(),
            window,
            view,
            sender,
        });
        Ok(receiver)
    }

    async fn fetch_entries_before(
        &self,
        journal_id: &str,
        before: i64,
        count: usize,
    ) -> Result<Vec<Record>> {
        self.check_reachable()?;
        let data = self.data.lock();
        let mut older = data
            .entries
            .get(journal_id)
            .map(|entries| {
                entries
                    .values()
                    .filter(|record| record.created_at < before)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        older.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        older.truncate(count);
        Ok(older)
    }

    async fn find_reports(
        &self,
        journal_id: &str,
        content_id: &str,
        reporter_id: &str,
    ) -> Result<Vec<Report>> {
        self.check_reachable()?;
        Ok(self
            .data
            .lock()
            .reports
            .iter()
            .filter(|report| {
                report.journal_id == journal_id
                    && report.content_id == content_id
                    && report.reported_by == reporter_id
            })
            .cloned()
            .collect())
    }

    async fn insert_report(&self, report: &Report) -> Result<()> {
        self.check_writable()?;
        self.data.lock().reports.push(report.clone());
        Ok(())
    }

    async fn list_reports(&self, journal_id: &str) -> Result<Vec<Report>> {
        self.check_reachable()?;
        Ok(self
            .data
            .lock()
            .reports
            .iter()
            .filter(|report| report.journal_id == journal_id)
            .cloned()
            .collect())
    }

    async fn delete_reports_for_content(
        &self,
        journal_id: &str,
        content_id: &str,
    ) -> Result<usize> {
        self.check_writable()?;
        let mut data = self.data.lock();
        let before = data.reports.len();
        data.reports
            .retain(|report| !(report.journal_id == journal_id && report.content_id == content_id));
        Ok(before - data.reports.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryContent;

    fn entry(id: &str, created_at: i64) -> Record {
        let mut record = Record::draft(id, EntryContent::text(id));
        record.created_at = created_at;
        record
    }

    async fn store_with_journal() -> MemoryRemoteStore {
        let store = MemoryRemoteStore::new();
        store
            .put_journal(&Journal::new("j1", "Trip", "ana", 1))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn offline_store_fails_reads_and_writes() {
        let store = MemoryRemoteStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.fetch_private("ana").await,
            Err(Error::NetworkFailure(_))
        ));
        assert!(store.commit_private("ana", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn rejected_writes_leave_data_untouched() {
        let store = MemoryRemoteStore::new();
        store.fail_writes(true);
        let result = store
            .commit_private("ana", vec![entry("2024-01-01", 1)])
            .await;
        assert!(result.is_err());
        assert!(store.fetch_private("ana").await.unwrap().is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn subscription_delivers_initial_window_then_diffs() {
        let store = store_with_journal().await;
        for (id, at) in [("a", 10), ("b", 20), ("c", 30)] {
            store.put_entry("j1", &entry(id, at)).await.unwrap();
        }

        let mut feed = store.subscribe_entries("j1", 2).await.unwrap();
        let initial = feed.recv().await.unwrap();
        let ids = initial
            .iter()
            .map(|change| change.record.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(initial.iter().all(|c| c.kind == ChangeKind::Added));

        store.put_entry("j1", &entry("d", 40)).await.unwrap();
        let diff = feed.recv().await.unwrap();
        assert_eq!(diff[0].kind, ChangeKind::Evicted);
        assert_eq!(diff[0].record.id, "b");
        assert_eq!(diff[1].kind, ChangeKind::Added);
        assert_eq!(diff[1].record.id, "d");

        store.delete_entry("j1", "d").await.unwrap();
        let diff = feed.recv().await.unwrap();
        assert_eq!(diff[0].kind, ChangeKind::Removed);
        assert_eq!(diff[0].record.id, "d");
        assert_eq!(diff[1].kind, ChangeKind::Added);
        assert_eq!(diff[1].record.id, "b");
    }

    #[tokio::test]
    async fn older_fetch_is_strictly_before_cursor() {
        let store = store_with_journal().await;
        for (id, at) in [("a", 10), ("b", 20), ("c", 30)] {
            store.put_entry("j1", &entry(id, at)).await.unwrap();
        }
        let older = store.fetch_entries_before("j1", 30, 5).await.unwrap();
        let ids = older.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.json");

        let store = store_with_journal().await;
        store
            .commit_private("ana", vec![entry("2024-01-01", 1)])
            .await
            .unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryRemoteStore::load(&path).unwrap();
        assert!(loaded.journal("j1").is_some());
        assert!(loaded.private_record("ana", "2024-01-01").is_some());
    }
}
