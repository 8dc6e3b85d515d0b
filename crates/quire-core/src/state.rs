//! Shared cross-platform state types.

/// Sync status observed by clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No pass has run yet
    #[default]
    Offline,
    Syncing,
    Synced,
    /// Last pass aborted; local copy is intact and the pass may be retried
    Error,
}
