//! Snapshot repository implementation

use crate::error::Result;
use crate::models::{Journal, Record};
use crate::mutation::PendingWrite;
use crate::store::LocalSnapshot;
use rusqlite::{params, Connection};

/// Trait for wholesale local state persistence
pub trait SnapshotRepository {
    /// Load the last saved snapshot (empty if nothing was saved)
    fn load(&self) -> Result<LocalSnapshot>;

    /// Replace the stored snapshot in a single transaction
    fn save(&self, snapshot: &LocalSnapshot) -> Result<()>;
}

/// `SQLite` implementation of `SnapshotRepository`
pub struct SqliteSnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSnapshotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn load_payloads(&self, sql: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(payloads)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn load(&self) -> Result<LocalSnapshot> {
        let mut snapshot = LocalSnapshot::default();

        for payload in self.load_payloads("SELECT payload FROM private_records")? {
            let record: Record = serde_json::from_str(&payload)?;
            snapshot.private.insert(record.id.clone(), record);
        }

        for payload in self.load_payloads("SELECT payload FROM journals")? {
            let journal: Journal = serde_json::from_str(&payload)?;
            snapshot.journals.insert(journal.id.clone(), journal);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT journal_id, payload FROM journal_records")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (journal_id, payload) in rows {
            let record: Record = serde_json::from_str(&payload)?;
            snapshot
                .entries
                .entry(journal_id)
                .or_default()
                .insert(record.id.clone(), record);
        }

        for payload in self.load_payloads("SELECT payload FROM pending_writes ORDER BY seq")? {
            let write: PendingWrite = serde_json::from_str(&payload)?;
            snapshot.pending_writes.push(write);
        }

        Ok(snapshot)
    }

    fn save(&self, snapshot: &LocalSnapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM private_records;
             DELETE FROM journal_records;
             DELETE FROM journals;
             DELETE FROM pending_writes;",
        )?;

        for record in snapshot.private.values() {
            tx.execute(
                "INSERT INTO private_records (id, payload, updated_at, synced_at) VALUES (?, ?, ?, ?)",
                params![
                    record.id,
                    serde_json::to_string(record)?,
                    record.updated_at,
                    record.synced_at
                ],
            )?;
        }

        for journal in snapshot.journals.values() {
            tx.execute(
                "INSERT INTO journals (id, payload, updated_at) VALUES (?, ?, ?)",
                params![
                    journal.id,
                    serde_json::to_string(journal)?,
                    journal.updated_at
                ],
            )?;
        }

        for (journal_id, records) in &snapshot.entries {
            for record in records.values() {
                tx.execute(
                    "INSERT INTO journal_records (journal_id, id, payload, created_at) VALUES (?, ?, ?, ?)",
                    params![
                        journal_id,
                        record.id,
                        serde_json::to_string(record)?,
                        record.created_at
                    ],
                )?;
            }
        }

        for write in &snapshot.pending_writes {
            tx.execute(
                "INSERT INTO pending_writes (payload) VALUES (?)",
                params![serde_json::to_string(write)?],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}
