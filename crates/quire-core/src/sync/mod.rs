//! Synchronization core.
//!
//! Private entries reconcile through a dual-watermark conflict resolver driven
//! by [`SyncOrchestrator`]. Shared journal entries stay current through
//! [`LiveListener`], which mirrors the remote window into the local store.

mod listener;
mod orchestrator;
mod resolver;

pub use listener::{AppliedChanges, LiveListener, Unsubscribe};
pub use orchestrator::{merge_records, MergePlan, SyncOrchestrator, SyncReport};
pub use resolver::{resolve, Decision, Resolution};
