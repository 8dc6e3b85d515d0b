use std::path::{Path, PathBuf};

use chrono::Utc;
use quire_core::backup::{render_backup, render_markdown, suggested_backup_file_name};

use crate::cli::ExportFormat;
use crate::commands::common::Session;
use crate::error::CliError;

/// Render the export and write it to `output_path`, or stdout.
///
/// A directory as `output_path` receives a timestamped file. Returns the
/// path written, if any.
pub fn run_export(
    session: &Session,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<Option<PathBuf>, CliError> {
    let exported_at = Utc::now().timestamp_millis();
    let rendered = match format {
        ExportFormat::Json => render_backup(&session.state.snapshot(), exported_at)?,
        ExportFormat::Markdown => {
            let records = session.state.private().snapshot().into_values().collect::<Vec<_>>();
            render_markdown(&records)
        }
    };

    let Some(path) = output_path else {
        println!("{rendered}");
        return Ok(None);
    };

    let path = if path.is_dir() {
        let file_name = suggested_backup_file_name(exported_at);
        match format {
            ExportFormat::Json => path.join(file_name),
            ExportFormat::Markdown => path.join(file_name).with_extension("md"),
        }
    } else {
        path.to_path_buf()
    };
    std::fs::write(&path, rendered)?;
    println!("{}", path.display());
    Ok(Some(path))
}
