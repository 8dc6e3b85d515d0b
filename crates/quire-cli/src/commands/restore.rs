use std::path::Path;

use quire_core::backup::parse_backup;

use crate::commands::common::{format_timestamp, Session};
use crate::error::CliError;

/// Replace the whole local state with a backup in one step
pub fn run_restore(session: &Session, path: &Path) -> Result<(), CliError> {
    let payload = std::fs::read_to_string(path)?;
    let document = parse_backup(&payload)?;
    let entries = document.snapshot.private.len();
    session.state.replace_all(document.snapshot);

    println!(
        "Restored {entries} entries from backup taken {}",
        format_timestamp(document.exported_at)
    );
    Ok(())
}
