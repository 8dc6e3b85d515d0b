//! Optimistic mutation pipeline.
//!
//! A mutation is applied to the local record store synchronously and the
//! caller proceeds at once; the matching remote writes run in a background
//! task. Failed writes are not rolled back. They are queued in the local
//! state (and persisted with it) until [`MutationPipeline::retry_pending`]
//! replays them. Every queued write is idempotent to replay.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::SyncSettings;
use crate::models::{Comment, EntryContent, Journal, LastEntry, Record};
use crate::remote::{EntryFieldOp, JournalFieldOp, RemoteStore};
use crate::store::{LocalState, RecordStore};
use crate::util::{now_millis, snippet};
use crate::{Error, Result};

/// Which collection an entry mutation targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryScope {
    /// The actor's private entries; pushed by the sync orchestrator
    Private,
    /// Entries of a shared journal; pushed immediately
    Journal(String),
}

/// A local change requested by the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateEntry {
        scope: EntryScope,
        record: Record,
    },
    UpdateEntry {
        scope: EntryScope,
        entry_id: String,
        content: EntryContent,
    },
    DeleteEntry {
        scope: EntryScope,
        entry_id: String,
    },
    ToggleReaction {
        journal_id: String,
        entry_id: String,
        emoji: String,
    },
    AddComment {
        journal_id: String,
        entry_id: String,
        comment: Comment,
    },
    DeleteComment {
        journal_id: String,
        entry_id: String,
        comment: Comment,
    },
}

/// A resolved remote write. Toggles are resolved to add/remove before
/// queuing so replays never flip state twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteWrite {
    DeletePrivate {
        user_id: String,
        record_id: String,
    },
    PutEntry {
        journal_id: String,
        record: Record,
    },
    UpdateEntry {
        journal_id: String,
        entry_id: String,
        op: EntryFieldOp,
    },
    DeleteEntry {
        journal_id: String,
        entry_id: String,
    },
    UpdateJournal {
        journal_id: String,
        ops: Vec<JournalFieldOp>,
    },
}

impl RemoteWrite {
    /// Id of the private record this write deletes, if any
    fn private_delete_target(&self) -> Option<&str> {
        match self {
            Self::DeletePrivate { record_id, .. } => Some(record_id.as_str()),
            _ => None,
        }
    }

    async fn execute<R: RemoteStore + ?Sized>(&self, remote: &R) -> Result<()> {
        match self {
            Self::DeletePrivate { user_id, record_id } => {
                remote.delete_private(user_id, record_id).await
            }
            Self::PutEntry { journal_id, record } => remote.put_entry(journal_id, record).await,
            Self::UpdateEntry {
                journal_id,
                entry_id,
                op,
            } => remote.update_entry(journal_id, entry_id, op.clone()).await,
            Self::DeleteEntry {
                journal_id,
                entry_id,
            } => remote.delete_entry(journal_id, entry_id).await,
            Self::UpdateJournal { journal_id, ops } => {
                remote.update_journal(journal_id, ops.clone()).await
            }
        }
    }
}

/// A remote write waiting for a retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub write: RemoteWrite,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl PendingWrite {
    #[must_use]
    pub const fn new(write: RemoteWrite) -> Self {
        Self {
            write,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Background push of one mutation
#[must_use = "await the handle to observe push failures"]
pub struct PushHandle {
    task: JoinHandle<Result<()>>,
}

impl PushHandle {
    /// Wait for the background push to settle
    pub async fn outcome(self) -> Result<()> {
        self.task
            .await
            .map_err(|error| Error::NetworkFailure(format!("push task aborted: {error}")))?
    }
}

/// Result of applying a mutation locally
pub struct Applied {
    /// The record as it now stands locally (the removed record for deletes)
    pub record: Record,
    /// Background push, absent when nothing has to be written right away
    pub push: Option<PushHandle>,
}

/// Applies mutations locally and pushes them to the remote store.
pub struct MutationPipeline<R: RemoteStore> {
    state: Arc<LocalState>,
    remote: Arc<R>,
    settings: SyncSettings,
}

impl<R: RemoteStore + 'static> MutationPipeline<R> {
    pub fn new(state: Arc<LocalState>, remote: Arc<R>, settings: SyncSettings) -> Self {
        Self {
            state,
            remote,
            settings,
        }
    }

    /// Apply `mutation` on behalf of `actor_id`.
    ///
    /// Local state is updated before this returns; remote writes run on a
    /// spawned task, so this must be called from within a Tokio runtime.
    pub fn apply(&self, actor_id: &str, mutation: Mutation) -> Result<Applied> {
        let (record, writes) = match mutation {
            Mutation::CreateEntry { scope, record } => self.create_entry(actor_id, &scope, record)?,
            Mutation::UpdateEntry {
                scope,
                entry_id,
                content,
            } => self.update_entry(actor_id, &scope, &entry_id, content)?,
            Mutation::DeleteEntry { scope, entry_id } => {
                self.delete_entry(actor_id, &scope, &entry_id)?
            }
            Mutation::ToggleReaction {
                journal_id,
                entry_id,
                emoji,
            } => self.toggle_reaction(actor_id, &journal_id, &entry_id, &emoji)?,
            Mutation::AddComment {
                journal_id,
                entry_id,
                comment,
            } => self.add_comment(actor_id, &journal_id, &entry_id, comment)?,
            Mutation::DeleteComment {
                journal_id,
                entry_id,
                comment,
            } => self.delete_comment(actor_id, &journal_id, &entry_id, &comment)?,
        };

        let push = (!writes.is_empty()).then(|| self.spawn_push(writes));
        Ok(Applied { record, push })
    }

    /// Writes that failed and are waiting for a retry
    pub fn pending(&self) -> Vec<PendingWrite> {
        self.state.pending()
    }

    /// Replay queued writes in order.
    ///
    /// Stops at the first failure and re-queues it with everything after
    /// it. Returns how many writes succeeded.
    pub async fn retry_pending(&self) -> Result<usize> {
        let queued = self.state.take_pending();
        let count = queued.len();
        let targets = queued
            .iter()
            .filter_map(|pending| pending.write.private_delete_target())
            .map(str::to_string)
            .collect::<Vec<_>>();
        for target in &targets {
            self.state.begin_private_delete(target);
        }

        let outcome = self.replay(queued).await;
        for target in &targets {
            self.state.finish_private_delete(target);
        }
        outcome?;

        if count > 0 {
            tracing::info!(count, "Replayed queued writes");
        }
        Ok(count)
    }

    async fn replay(&self, mut queued: Vec<PendingWrite>) -> Result<()> {
        for index in 0..queued.len() {
            if let Err(error) = queued[index].write.execute(self.remote.as_ref()).await {
                let failed = &mut queued[index];
                failed.attempts += 1;
                failed.last_error = Some(error.to_string());
                tracing::warn!(attempts = failed.attempts, %error, "Retry of queued write failed");
                for pending in queued.drain(index..) {
                    self.state.push_pending(pending);
                }
                return Err(error);
            }
        }
        Ok(())
    }

    fn spawn_push(&self, writes: Vec<RemoteWrite>) -> PushHandle {
        let remote = Arc::clone(&self.remote);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let outcome = push_writes(remote.as_ref(), &state, &writes).await;
            // failed deletes are queued by now, so the id stays a tombstone
            for target in writes.iter().filter_map(RemoteWrite::private_delete_target) {
                state.finish_private_delete(target);
            }
            outcome
        });
        PushHandle { task }
    }

    /// Journal the actor belongs to, with its entry store
    fn member_journal(
        &self,
        actor_id: &str,
        journal_id: &str,
    ) -> Result<(Journal, Arc<RecordStore>)> {
        let journal = self.state.require_journal(journal_id)?;
        if !journal.is_member(actor_id) {
            return Err(Error::permission(format!(
                "{actor_id} is not a member of journal {journal_id}"
            )));
        }
        Ok((journal, self.state.entries(journal_id)))
    }

    fn require_entry(store: &RecordStore, entry_id: &str) -> Result<Record> {
        store
            .get(entry_id)
            .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))
    }

    fn last_entry_of(&self, record: &Record) -> LastEntry {
        LastEntry {
            id: record.id.clone(),
            snippet: snippet(&record.content.text, self.settings.snippet_length),
            author_id: record.author_id.clone(),
            created_at: record.created_at,
        }
    }

    fn create_entry(
        &self,
        actor_id: &str,
        scope: &EntryScope,
        mut record: Record,
    ) -> Result<(Record, Vec<RemoteWrite>)> {
        let now = now_millis();
        match scope {
            EntryScope::Private => {
                if self.state.private().contains(&record.id) {
                    return Err(Error::InvalidInput(format!(
                        "entry {} already exists",
                        record.id
                    )));
                }
                record.updated_at = now.max(record.synced_at + 1);
                self.state.private().upsert(record.clone());
                Ok((record, Vec::new()))
            }
            EntryScope::Journal(journal_id) => {
                let (_, store) = self.member_journal(actor_id, journal_id)?;
                if store.contains(&record.id) {
                    return Err(Error::InvalidInput(format!(
                        "entry {} already exists",
                        record.id
                    )));
                }
                if record.author_id.is_none() {
                    record.author_id = Some(actor_id.to_string());
                }
                if !record.is_authored_by(actor_id) {
                    return Err(Error::permission("entries must be written by the actor"));
                }
                record.updated_at = now;
                store.upsert(record.clone());

                let journal_ops = vec![
                    JournalFieldOp::SetLastEntry {
                        entry: self.last_entry_of(&record),
                    },
                    JournalFieldOp::Touch { updated_at: now },
                ];
                self.state.update_journal(journal_id, |journal| {
                    for op in &journal_ops {
                        op.apply(journal);
                    }
                })?;

                Ok((
                    record.clone(),
                    vec![
                        RemoteWrite::PutEntry {
                            journal_id: journal_id.clone(),
                            record,
                        },
                        RemoteWrite::UpdateJournal {
                            journal_id: journal_id.clone(),
                            ops: journal_ops,
                        },
                    ],
                ))
            }
        }
    }

    fn update_entry(
        &self,
        actor_id: &str,
        scope: &EntryScope,
        entry_id: &str,
        content: EntryContent,
    ) -> Result<(Record, Vec<RemoteWrite>)> {
        let now = now_millis();
        match scope {
            EntryScope::Private => {
                let updated = self
                    .state
                    .private()
                    .update(entry_id, |record| {
                        record.content = content;
                        record.updated_at = now.max(record.synced_at + 1);
                    })
                    .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
                Ok((updated, Vec::new()))
            }
            EntryScope::Journal(journal_id) => {
                let (_, store) = self.member_journal(actor_id, journal_id)?;
                let existing = Self::require_entry(&store, entry_id)?;
                if !existing.is_authored_by(actor_id) {
                    return Err(Error::permission("only the author may edit an entry"));
                }
                let op = EntryFieldOp::SetContent {
                    content,
                    updated_at: now,
                };
                let updated = store
                    .update(entry_id, |record| {
                        op.apply(record);
                    })
                    .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
                Ok((
                    updated,
                    vec![RemoteWrite::UpdateEntry {
                        journal_id: journal_id.clone(),
                        entry_id: entry_id.to_string(),
                        op,
                    }],
                ))
            }
        }
    }

    fn delete_entry(
        &self,
        actor_id: &str,
        scope: &EntryScope,
        entry_id: &str,
    ) -> Result<(Record, Vec<RemoteWrite>)> {
        let journal_id = match scope {
            EntryScope::Private => {
                let removed = self
                    .state
                    .private()
                    .delete(entry_id)
                    .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
                self.state.begin_private_delete(entry_id);
                return Ok((
                    removed,
                    vec![RemoteWrite::DeletePrivate {
                        user_id: actor_id.to_string(),
                        record_id: entry_id.to_string(),
                    }],
                ));
            }
            EntryScope::Journal(journal_id) => journal_id,
        };

        let (journal, store) = self.member_journal(actor_id, journal_id)?;
        let existing = Self::require_entry(&store, entry_id)?;
        let privileged = journal.role_of(actor_id).is_some_and(|role| role.is_privileged());
        if !existing.is_authored_by(actor_id) && !privileged {
            return Err(Error::permission(
                "only the author or a journal admin may delete an entry",
            ));
        }

        let removed = store
            .delete(entry_id)
            .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;

        let mut writes = vec![RemoteWrite::DeleteEntry {
            journal_id: journal.id.clone(),
            entry_id: entry_id.to_string(),
        }];
        let cache_is_stale = journal
            .last_entry
            .as_ref()
            .is_some_and(|last| last.id == entry_id);
        if cache_is_stale {
            let op = store.newest().map_or(JournalFieldOp::ClearLastEntry, |newest| {
                JournalFieldOp::SetLastEntry {
                    entry: self.last_entry_of(&newest),
                }
            });
            self.state.update_journal(&journal.id, |journal| op.apply(journal))?;
            writes.push(RemoteWrite::UpdateJournal {
                journal_id: journal.id.clone(),
                ops: vec![op],
            });
        }

        Ok((removed, writes))
    }

    fn toggle_reaction(
        &self,
        actor_id: &str,
        journal_id: &str,
        entry_id: &str,
        emoji: &str,
    ) -> Result<(Record, Vec<RemoteWrite>)> {
        let (_, store) = self.member_journal(actor_id, journal_id)?;
        let mut op = None;
        let updated = store
            .update(entry_id, |record| {
                let resolved = if record.reactions.contains(emoji, actor_id) {
                    EntryFieldOp::RemoveReaction {
                        emoji: emoji.to_string(),
                        user_id: actor_id.to_string(),
                    }
                } else {
                    EntryFieldOp::AddReaction {
                        emoji: emoji.to_string(),
                        user_id: actor_id.to_string(),
                    }
                };
                resolved.apply(record);
                op = Some(resolved);
            })
            .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;

        let writes = op
            .map(|op| RemoteWrite::UpdateEntry {
                journal_id: journal_id.to_string(),
                entry_id: entry_id.to_string(),
                op,
            })
            .into_iter()
            .collect();
        Ok((updated, writes))
    }

    fn add_comment(
        &self,
        actor_id: &str,
        journal_id: &str,
        entry_id: &str,
        comment: Comment,
    ) -> Result<(Record, Vec<RemoteWrite>)> {
        let (_, store) = self.member_journal(actor_id, journal_id)?;
        if comment.user_id != actor_id {
            return Err(Error::permission("comments must be written by the actor"));
        }
        if comment.text.trim().is_empty() {
            return Err(Error::InvalidInput("comment text cannot be empty".into()));
        }
        let op = EntryFieldOp::AddComment { comment };
        let updated = store
            .update(entry_id, |record| {
                op.apply(record);
            })
            .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
        Ok((
            updated,
            vec![RemoteWrite::UpdateEntry {
                journal_id: journal_id.to_string(),
                entry_id: entry_id.to_string(),
                op,
            }],
        ))
    }

    fn delete_comment(
        &self,
        actor_id: &str,
        journal_id: &str,
        entry_id: &str,
        comment: &Comment,
    ) -> Result<(Record, Vec<RemoteWrite>)> {
        let (journal, store) = self.member_journal(actor_id, journal_id)?;
        let privileged = journal.role_of(actor_id).is_some_and(|role| role.is_privileged());
        if comment.user_id != actor_id && !privileged {
            return Err(Error::permission(
                "only the author or a journal admin may delete a comment",
            ));
        }
        let op = EntryFieldOp::RemoveComment {
            comment: comment.clone(),
        };
        let updated = store
            .update(entry_id, |record| {
                op.apply(record);
            })
            .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
        Ok((
            updated,
            vec![RemoteWrite::UpdateEntry {
                journal_id: journal_id.to_string(),
                entry_id: entry_id.to_string(),
                op,
            }],
        ))
    }
}

/// Run `writes` in order; on failure queue the failed write and all after it
async fn push_writes<R: RemoteStore + ?Sized>(
    remote: &R,
    state: &LocalState,
    writes: &[RemoteWrite],
) -> Result<()> {
    for (index, write) in writes.iter().enumerate() {
        if let Err(error) = write.execute(remote).await {
            tracing::warn!(%error, "Background push failed; queued for retry");
            for (offset, write) in writes[index..].iter().enumerate() {
                let mut pending = PendingWrite::new(write.clone());
                if offset == 0 {
                    pending.attempts = 1;
                    pending.last_error = Some(error.to_string());
                }
                state.push_pending(pending);
            }
            return Err(error);
        }
    }
    Ok(())
}
