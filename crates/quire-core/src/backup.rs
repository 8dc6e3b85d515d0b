//! Backup and export of the local state.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::Record;
use crate::store::LocalSnapshot;
use crate::{Error, Result};

/// Current backup document version
pub const FORMAT_VERSION: u32 = 1;

/// Versioned wrapper written to backup files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub format_version: u32,
    /// Unix ms
    pub exported_at: i64,
    pub snapshot: LocalSnapshot,
}

/// Render a full snapshot as pretty-printed, versioned JSON.
pub fn render_backup(snapshot: &LocalSnapshot, exported_at: i64) -> Result<String> {
    let document = BackupDocument {
        format_version: FORMAT_VERSION,
        exported_at,
        snapshot: snapshot.clone(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse a backup produced by [`render_backup`].
///
/// Documents from an unknown format version are rejected rather than
/// partially restored.
pub fn parse_backup(payload: &str) -> Result<BackupDocument> {
    let document: BackupDocument = serde_json::from_str(payload)?;
    if document.format_version != FORMAT_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported backup format version {} (expected {FORMAT_VERSION})",
            document.format_version
        )));
    }
    Ok(document)
}

/// Render private entries as Markdown, one frontmatter block per entry,
/// oldest first.
#[must_use]
pub fn render_markdown(records: &[Record]) -> String {
    let mut sorted = records.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut output = String::new();
    for (index, record) in sorted.into_iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", record.id);
        if let Some(mood) = &record.content.mood {
            let _ = writeln!(output, "mood: {mood}");
        }
        let _ = writeln!(output, "created_at: {}", record.created_at);
        let _ = writeln!(output, "updated_at: {}", record.updated_at);
        if !record.content.media.is_empty() {
            let _ = writeln!(output, "media:");
            for item in &record.content.media {
                let _ = writeln!(output, "  - {item}");
            }
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        output.push_str(&record.content.text);
        output.push('\n');
    }
    output
}

/// Deterministic default file name for a backup taken at `timestamp_ms`
#[must_use]
pub fn suggested_backup_file_name(timestamp_ms: i64) -> String {
    format!("quire-backup-{timestamp_ms}.json")
}
