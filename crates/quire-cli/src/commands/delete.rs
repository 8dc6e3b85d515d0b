use std::sync::Arc;

use quire_core::mutation::{EntryScope, Mutation, MutationPipeline};

use crate::commands::common::{resolve_entry_date, Session};
use crate::error::CliError;

/// Delete a day locally and on the remote; a failed remote delete stays
/// queued and is retried by the next `quire sync`.
pub async fn run_delete(session: &Session, date: &str) -> Result<(), CliError> {
    let date = resolve_entry_date(Some(date))?;
    if !session.state.private().contains(&date) {
        return Err(CliError::EntryNotFound(date));
    }

    let pipeline = MutationPipeline::new(
        Arc::clone(&session.state),
        Arc::clone(&session.remote),
        session.settings.clone(),
    );
    let applied = pipeline.apply(
        &session.user_id,
        Mutation::DeleteEntry {
            scope: EntryScope::Private,
            entry_id: date,
        },
    )?;

    if let Some(push) = applied.push {
        if let Err(error) = push.outcome().await {
            eprintln!("Remote delete queued for retry: {error}");
        }
    }
    println!("Deleted {}", applied.record.id);
    Ok(())
}
