use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use quire_core::db::{Database, SqliteSnapshotRepository};
use quire_core::util::snippet;
use quire_core::{LocalState, MemoryRemoteStore, Record, SyncSettings};
use serde::Serialize;

use crate::error::CliError;

/// Everything one command invocation works with.
///
/// Local state is restored from the database on open and written back by
/// [`Session::close`]; the remote store is loaded from and saved to its file.
pub struct Session {
    db: Database,
    remote_path: PathBuf,
    pub user_id: String,
    pub state: Arc<LocalState>,
    pub remote: Arc<MemoryRemoteStore>,
    pub settings: SyncSettings,
}

impl Session {
    pub fn open(paths: &SessionPaths, user_id: &str) -> Result<Self, CliError> {
        let settings = load_settings(paths.settings.as_deref())?;
        let db = Database::open(&paths.db)?;
        let state = Arc::new(LocalState::new());
        state.restore(&SqliteSnapshotRepository::new(db.connection()))?;
        let remote = Arc::new(MemoryRemoteStore::load(&paths.remote)?);

        Ok(Self {
            db,
            remote_path: paths.remote.clone(),
            user_id: user_id.to_string(),
            state,
            remote,
            settings,
        })
    }

    /// Persist local state and the remote file
    pub fn close(self) -> Result<(), CliError> {
        self.state
            .persist(&SqliteSnapshotRepository::new(self.db.connection()))?;
        self.remote.save(&self.remote_path)?;
        Ok(())
    }
}

/// Resolved file locations for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub db: PathBuf,
    pub remote: PathBuf,
    pub settings: Option<PathBuf>,
}

impl SessionPaths {
    pub fn resolve(
        db_path: Option<PathBuf>,
        remote_path: Option<PathBuf>,
        settings: Option<PathBuf>,
    ) -> Self {
        let data_dir = default_data_dir();
        Self {
            db: db_path.unwrap_or_else(|| data_dir.join("quire.db")),
            remote: remote_path.unwrap_or_else(|| data_dir.join("remote.json")),
            settings,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quire")
}

pub fn load_settings(path: Option<&Path>) -> Result<SyncSettings, CliError> {
    let Some(path) = path else {
        return Ok(SyncSettings::default());
    };
    let payload = std::fs::read_to_string(path)
        .map_err(|error| CliError::Config(format!("cannot read {}: {error}", path.display())))?;
    Ok(SyncSettings::from_json(&payload)?)
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub date: String,
    pub preview: String,
    pub text: String,
    pub mood: Option<String>,
    pub updated_at: i64,
    pub relative_time: String,
    pub unsynced: bool,
}

pub fn entry_to_list_item(record: &Record) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        date: record.id.clone(),
        preview: snippet(&record.content.text, 80),
        text: record.content.text.clone(),
        mood: record.content.mood.clone(),
        updated_at: record.updated_at,
        relative_time: format_relative_time(record.updated_at, now_ms),
        unsynced: record.has_unsynced_changes(),
    }
}

pub fn format_entry_lines(records: &[Record]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let marker = if record.has_unsynced_changes() { '*' } else { ' ' };
            let preview = snippet(&record.content.text, 48);
            let relative_time = format_relative_time(record.updated_at, now_ms);
            format!("{marker} {:<10}  {preview:<48}  {relative_time}", record.id)
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

/// Entry key for `date`, defaulting to today in UTC
pub fn resolve_entry_date(date: Option<&str>) -> Result<String, CliError> {
    match date.map(str::trim) {
        None | Some("") => Ok(Utc::now().date_naive().format("%Y-%m-%d").to_string()),
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|parsed| parsed.format("%Y-%m-%d").to_string())
            .map_err(|_| CliError::InvalidDate(date.to_string())),
    }
}

pub fn resolve_entry_text(parts: &[String]) -> Result<String, CliError> {
    let text = parts.join(" ");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyContent)
    } else {
        Ok(trimmed.to_string())
    }
}
