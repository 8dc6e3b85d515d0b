//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN TRANSACTION;

        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Private entries of the signed-in user, keyed by date
        CREATE TABLE IF NOT EXISTS private_records (
            id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            synced_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_private_dirty ON private_records(updated_at, synced_at);

        CREATE TABLE IF NOT EXISTS journals (
            id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS journal_records (
            journal_id TEXT NOT NULL,
            id TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (journal_id, id)
        );
        CREATE INDEX IF NOT EXISTS idx_journal_records_recent
            ON journal_records(journal_id, created_at DESC);

        -- Remote writes that failed and wait for a retry
        CREATE TABLE IF NOT EXISTS pending_writes (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);

        COMMIT;",
    )?;

    tracing::debug!("Applied migration v1");
    Ok(())
}
