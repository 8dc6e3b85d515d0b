//! Local persistence for Quire

mod connection;
mod migrations;
mod snapshot_repository;

pub use connection::Database;
pub use snapshot_repository::{SnapshotRepository, SqliteSnapshotRepository};
