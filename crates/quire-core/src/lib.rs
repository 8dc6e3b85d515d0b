//! quire-core - Core library for Quire
//!
//! This crate holds the models, local record store, SQLite persistence and
//! the synchronization core shared by every Quire client: the conflict
//! resolver and sync orchestrator for private entries, the live listener
//! and optimistic mutation pipeline for shared journals, and the membership
//! and moderation policy layers on top of them.

pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod membership;
pub mod models;
pub mod moderation;
pub mod mutation;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{EntryContent, Journal, Record, Role};
pub use remote::{MemoryRemoteStore, RemoteStore};
pub use state::SyncState;
pub use store::{LocalSnapshot, LocalState, RecordStore};
