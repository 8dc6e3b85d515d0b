//! Full synchronization pass for private entries.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::resolver::{resolve, Decision};
use crate::config::SyncSettings;
use crate::models::Record;
use crate::remote::RemoteStore;
use crate::state::SyncState;
use crate::store::{LocalState, RecordMap};
use crate::util::now_millis;
use crate::{Error, Result};

/// Merge result computed before any remote write is issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// Every record after reconciliation, keyed by id
    pub merged: RecordMap,
    /// Ids whose `updated_at > synced_at` and must be pushed
    pub outgoing: Vec<String>,
    /// Resolver decision per remote record
    pub decisions: BTreeMap<String, Decision>,
}

/// Reconcile a local collection with a remote snapshot.
///
/// Records that exist only locally are carried over unchanged.
pub fn merge_records(
    local: &RecordMap,
    remote: Vec<Record>,
    now: i64,
    conflict_marker: &str,
) -> Result<MergePlan> {
    let mut merged = local.clone();
    let mut decisions = BTreeMap::new();

    for remote_record in remote {
        let resolution = resolve(
            local.get(&remote_record.id),
            &remote_record,
            now,
            conflict_marker,
        )?;
        tracing::debug!(
            id = %remote_record.id,
            decision = ?resolution.decision,
            "resolved private record"
        );
        decisions.insert(remote_record.id.clone(), resolution.decision);
        merged.insert(remote_record.id, resolution.record);
    }

    let outgoing = merged
        .values()
        .filter(|record| record.has_unsynced_changes())
        .map(|record| record.id.clone())
        .collect();

    Ok(MergePlan {
        merged,
        outgoing,
        decisions,
    })
}

/// Summary of one completed pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Local private collection after the pass
    pub merged: RecordMap,
    pub decisions: BTreeMap<String, Decision>,
    /// Ids written to the remote in the batch
    pub pushed: Vec<String>,
    /// Ids edited locally while the pass ran; they sync on the next pass
    pub deferred: Vec<String>,
}

impl SyncReport {
    /// Number of records resolved with `decision`
    #[must_use]
    pub fn count(&self, decision: Decision) -> usize {
        self.decisions.values().filter(|d| **d == decision).count()
    }
}

/// Drives reconciliation of the private collection against the remote.
pub struct SyncOrchestrator<R: RemoteStore> {
    state: Arc<LocalState>,
    remote: Arc<R>,
    settings: SyncSettings,
    pass_lock: tokio::sync::Mutex<()>,
    status: Mutex<SyncState>,
}

impl<R: RemoteStore> SyncOrchestrator<R> {
    pub fn new(state: Arc<LocalState>, remote: Arc<R>, settings: SyncSettings) -> Self {
        Self {
            state,
            remote,
            settings,
            pass_lock: tokio::sync::Mutex::new(()),
            status: Mutex::new(SyncState::default()),
        }
    }

    /// Status of the most recent pass
    pub fn state(&self) -> SyncState {
        *self.status.lock()
    }

    /// Run one full pass for `user_id`.
    ///
    /// A pass that starts while another is in flight waits for it to
    /// settle. Any remote failure aborts the pass without touching local
    /// state, so the call can simply be retried.
    pub async fn sync_all(&self, user_id: &str) -> Result<SyncReport> {
        let _pass = self.pass_lock.lock().await;
        *self.status.lock() = SyncState::Syncing;

        match self.run_pass(user_id).await {
            Ok(report) => {
                *self.status.lock() = SyncState::Synced;
                tracing::info!(
                    user_id,
                    records = report.merged.len(),
                    pushed = report.pushed.len(),
                    merged_conflicts = report.count(Decision::Merged),
                    deferred = report.deferred.len(),
                    "Sync pass completed"
                );
                Ok(report)
            }
            Err(error) => {
                *self.status.lock() = SyncState::Error;
                tracing::warn!(user_id, %error, "Sync pass aborted");
                Err(error)
            }
        }
    }

    /// [`SyncOrchestrator::sync_all`] bounded by `limit`; a timeout counts
    /// as a network failure and aborts the pass.
    pub async fn sync_all_with_timeout(&self, user_id: &str, limit: Duration) -> Result<SyncReport> {
        if let Ok(result) = tokio::time::timeout(limit, self.sync_all(user_id)).await {
            result
        } else {
            *self.status.lock() = SyncState::Error;
            tracing::warn!(user_id, ?limit, "Sync pass timed out");
            Err(Error::NetworkFailure(format!("sync timed out after {limit:?}")))
        }
    }

    async fn run_pass(&self, user_id: &str) -> Result<SyncReport> {
        let base = self.state.private().snapshot();
        let tombstones = self.state.private_tombstones(user_id);
        let mut remote = self.remote.fetch_private(user_id).await?;
        remote.retain(|record| !tombstones.contains(&record.id));
        if !tombstones.is_empty() {
            tracing::debug!(
                user_id,
                count = tombstones.len(),
                "Skipping private records with a pending delete"
            );
        }

        let mut plan = merge_records(&base, remote, now_millis(), &self.settings.conflict_marker)?;
        for id in &plan.outgoing {
            if let Some(record) = plan.merged.get_mut(id) {
                record.mark_synced();
            }
        }

        let batch = plan
            .outgoing
            .iter()
            .filter_map(|id| plan.merged.get(id).cloned())
            .collect::<Vec<_>>();
        if !batch.is_empty() {
            tracing::debug!(user_id, count = batch.len(), "Committing private batch");
            self.remote.commit_private(user_id, batch).await?;
        }

        let deferred = self.state.private().commit_merge(&base, plan.merged);
        Ok(SyncReport {
            merged: self.state.private().snapshot(),
            decisions: plan.decisions,
            pushed: plan.outgoing,
            deferred,
        })
    }
}
