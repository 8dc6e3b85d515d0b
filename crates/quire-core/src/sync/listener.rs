//! Live reconciliation of shared journal entries.
//!
//! Shared entries are only ever changed remotely through narrow atomic
//! operations, so a committed remote copy is always authoritative and diffs
//! replace local state unconditionally.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SyncSettings;
use crate::models::Record;
use crate::remote::{ChangeKind, EntryChange, RemoteStore};
use crate::store::{LocalState, RecordStore};
use crate::Result;

/// What one remote snapshot did to the local store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub journal_id: String,
    /// Ids inserted that were not known locally
    pub inserted: Vec<String>,
    /// Ids whose local copy was replaced with different content
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Ids that left the live window but stay in the local store
    pub evicted: Vec<String>,
    /// Remote echoes identical to what was already applied locally
    pub confirmed: Vec<String>,
}

impl AppliedChanges {
    fn new(journal_id: &str) -> Self {
        Self {
            journal_id: journal_id.to_string(),
            ..Self::default()
        }
    }

    /// Whether the snapshot changed local state at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// `created_at` of every record currently inside a live window
type WindowIndex = BTreeMap<String, i64>;

/// Handle to a live subscription.
///
/// Consuming `unsubscribe` guarantees it runs at most once; dropping the
/// handle without calling it cancels the subscription too.
#[must_use = "dropping the handle cancels the subscription"]
pub struct Unsubscribe {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Unsubscribe {
    /// Stop the subscription and wait for the listener task to finish
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "Listener task ended abnormally");
            }
        }
    }

    /// Whether the listener task is still running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Mirrors the remote live window of each subscribed journal into the local
/// record store.
pub struct LiveListener<R: RemoteStore> {
    state: Arc<LocalState>,
    remote: Arc<R>,
    settings: SyncSettings,
    windows: Arc<Mutex<HashMap<String, WindowIndex>>>,
}

impl<R: RemoteStore + 'static> LiveListener<R> {
    pub fn new(state: Arc<LocalState>, remote: Arc<R>, settings: SyncSettings) -> Self {
        Self {
            state,
            remote,
            settings,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to the most recent entries of `journal_id`.
    ///
    /// `on_change` runs after each snapshot has been applied locally. Must be
    /// called from within a Tokio runtime.
    pub async fn subscribe<F>(&self, journal_id: &str, on_change: F) -> Result<Unsubscribe>
    where
        F: Fn(&AppliedChanges) + Send + 'static,
    {
        let mut feed = self
            .remote
            .subscribe_entries(journal_id, self.settings.live_window)
            .await?;
        tracing::info!(journal_id, window = self.settings.live_window, "Subscribed to journal");

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let store = self.state.entries(journal_id);
        let windows = Arc::clone(&self.windows);
        let journal_id = journal_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    batch = feed.recv() => {
                        let Some(changes) = batch else {
                            tracing::debug!(journal_id = %journal_id, "Remote feed closed");
                            break;
                        };
                        let applied = {
                            let mut windows = windows.lock();
                            let window = windows.entry(journal_id.clone()).or_default();
                            apply_changes(&journal_id, &store, window, changes)
                        };
                        on_change(&applied);
                    }
                }
            }
            windows.lock().remove(&journal_id);
            tracing::debug!(journal_id = %journal_id, "Listener stopped");
        });

        Ok(Unsubscribe {
            token,
            task: Some(task),
        })
    }

    /// One-shot fill of entries older than the live window.
    ///
    /// The cursor is clamped to the oldest entry in the live window, so
    /// results never overlap it. Fetched entries are stored locally.
    pub async fn fetch_older(
        &self,
        journal_id: &str,
        before: i64,
        count: Option<usize>,
    ) -> Result<Vec<Record>> {
        let cursor = self.oldest_live(journal_id).map_or(before, |floor| floor.min(before));
        let count = count.unwrap_or(self.settings.page_size);
        let older = self
            .remote
            .fetch_entries_before(journal_id, cursor, count)
            .await?;

        let store = self.state.entries(journal_id);
        for record in &older {
            store.upsert(record.clone());
        }
        tracing::debug!(journal_id, cursor, fetched = older.len(), "Fetched older entries");
        Ok(older)
    }

    /// Creation time of the oldest entry inside the live window
    pub fn oldest_live(&self, journal_id: &str) -> Option<i64> {
        self.windows
            .lock()
            .get(journal_id)
            .and_then(|window| window.values().min().copied())
    }
}

/// Apply one snapshot diff in delivery order
fn apply_changes(
    journal_id: &str,
    store: &RecordStore,
    window: &mut WindowIndex,
    changes: Vec<EntryChange>,
) -> AppliedChanges {
    let mut applied = AppliedChanges::new(journal_id);

    for change in changes {
        let id = change.record.id.clone();
        match change.kind {
            ChangeKind::Added | ChangeKind::Modified => {
                window.insert(id.clone(), change.record.created_at);
                match store.get(&id) {
                    Some(existing) if existing == change.record => applied.confirmed.push(id),
                    Some(_) => {
                        store.upsert(change.record);
                        applied.updated.push(id);
                    }
                    None => {
                        store.upsert(change.record);
                        applied.inserted.push(id);
                    }
                }
            }
            ChangeKind::Removed => {
                window.remove(&id);
                if store.delete(&id).is_some() {
                    applied.removed.push(id);
                }
            }
            ChangeKind::Evicted => {
                window.remove(&id);
                applied.evicted.push(id);
            }
        }
    }

    tracing::debug!(
        journal_id,
        inserted = applied.inserted.len(),
        updated = applied.updated.len(),
        removed = applied.removed.len(),
        evicted = applied.evicted.len(),
        confirmed = applied.confirmed.len(),
        "Applied remote snapshot"
    );
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryContent, Journal};
    use crate::remote::{EntryFieldOp, MemoryRemoteStore};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn entry(id: &str, created_at: i64) -> Record {
        let mut record = Record::draft(id, EntryContent::text(id));
        record.created_at = created_at;
        record
    }

    async fn setup(
        window: usize,
    ) -> (Arc<LocalState>, Arc<MemoryRemoteStore>, LiveListener<MemoryRemoteStore>) {
        let state = Arc::new(LocalState::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        remote
            .put_journal(&Journal::new("j1", "Trip", "ana", 1))
            .await
            .unwrap();
        let settings = SyncSettings {
            live_window: window,
            ..SyncSettings::default()
        };
        let listener = LiveListener::new(Arc::clone(&state), Arc::clone(&remote), settings);
        (state, remote, listener)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<AppliedChanges>) -> AppliedChanges {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("listener should deliver")
            .expect("channel open")
    }

    fn forward() -> (
        impl Fn(&AppliedChanges) + Send + 'static,
        mpsc::UnboundedReceiver<AppliedChanges>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |applied: &AppliedChanges| {
                let _ = tx.send(applied.clone());
            },
            rx,
        )
    }

    #[tokio::test]
    async fn mirrors_initial_window_and_later_diffs() {
        let (state, remote, listener) = setup(10).await;
        remote.put_entry("j1", &entry("a", 10)).await.unwrap();

        let (on_change, mut rx) = forward();
        let handle = listener.subscribe("j1", on_change).await.unwrap();

        let initial = next(&mut rx).await;
        assert_eq!(initial.inserted, vec!["a".to_string()]);
        assert!(state.entries("j1").contains("a"));

        remote
            .update_entry(
                "j1",
                "a",
                EntryFieldOp::AddReaction {
                    emoji: "👍".into(),
                    user_id: "ben".into(),
                },
            )
            .await
            .unwrap();
        let updated = next(&mut rx).await;
        assert_eq!(updated.updated, vec!["a".to_string()]);
        assert_eq!(state.entries("j1").get("a").unwrap().reactions.count("👍"), 1);

        remote.delete_entry("j1", "a").await.unwrap();
        let removed = next(&mut rx).await;
        assert_eq!(removed.removed, vec!["a".to_string()]);
        assert!(!state.entries("j1").contains("a"));

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn echo_of_optimistic_record_is_confirmed_not_duplicated() {
        let (state, remote, listener) = setup(10).await;
        let (on_change, mut rx) = forward();
        let handle = listener.subscribe("j1", on_change).await.unwrap();
        next(&mut rx).await;

        let optimistic = entry("local-1", 50);
        state.entries("j1").upsert(optimistic.clone());
        remote.put_entry("j1", &optimistic).await.unwrap();

        let echo = next(&mut rx).await;
        assert_eq!(echo.confirmed, vec!["local-1".to_string()]);
        assert!(echo.is_empty());
        assert_eq!(state.entries("j1").len(), 1);

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn unsubscribe_stops_applying_changes() {
        let (state, remote, listener) = setup(10).await;
        let (on_change, mut rx) = forward();
        let handle = listener.subscribe("j1", on_change).await.unwrap();
        next(&mut rx).await;
        assert!(handle.is_active());

        handle.unsubscribe().await;
        remote.put_entry("j1", &entry("late", 99)).await.unwrap();
        tokio::task::yield_now().await;

        assert!(!state.entries("j1").contains("late"));
        assert_eq!(listener.oldest_live("j1"), None);
    }

    #[tokio::test]
    async fn fetch_older_never_overlaps_live_window() {
        let (state, remote, listener) = setup(2).await;
        for (id, at) in [("a", 10), ("b", 20), ("c", 30), ("d", 40)] {
            remote.put_entry("j1", &entry(id, at)).await.unwrap();
        }
        let (on_change, mut rx) = forward();
        let handle = listener.subscribe("j1", on_change).await.unwrap();
        next(&mut rx).await;
        assert_eq!(listener.oldest_live("j1"), Some(30));

        let older = listener.fetch_older("j1", i64::MAX, Some(5)).await.unwrap();
        let ids = older.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(state.entries("j1").len(), 4);

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn entries_pushed_out_of_full_window_stay_local() {
        let (state, remote, listener) = setup(2).await;
        remote.put_entry("j1", &entry("a", 10)).await.unwrap();
        remote.put_entry("j1", &entry("b", 20)).await.unwrap();
        let (on_change, mut rx) = forward();
        let handle = listener.subscribe("j1", on_change).await.unwrap();
        next(&mut rx).await;

        remote.put_entry("j1", &entry("c", 30)).await.unwrap();
        let applied = next(&mut rx).await;
        assert_eq!(applied.evicted, vec!["a".to_string()]);
        assert!(applied.removed.is_empty());
        assert_eq!(applied.inserted, vec!["c".to_string()]);

        let store = state.entries("j1");
        assert!(store.contains("a"));
        assert_eq!(store.len(), 3);
        assert_eq!(listener.oldest_live("j1"), Some(20));

        // a real delete of a live entry pulls the evicted one back in
        remote.delete_entry("j1", "c").await.unwrap();
        let applied = next(&mut rx).await;
        assert_eq!(applied.removed, vec!["c".to_string()]);
        assert_eq!(applied.confirmed, vec!["a".to_string()]);
        assert!(!store.contains("c"));
        assert_eq!(listener.oldest_live("j1"), Some(10));

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn subscribe_fails_when_remote_unreachable() {
        let (_state, remote, listener) = setup(10).await;
        remote.set_offline(true);
        assert!(listener.subscribe("j1", |_| {}).await.is_err());
    }
}
