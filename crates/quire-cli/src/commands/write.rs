use std::sync::Arc;

use quire_core::mutation::{EntryScope, Mutation, MutationPipeline};
use quire_core::util::normalize_text_option;
use quire_core::{EntryContent, Record};

use crate::commands::common::{resolve_entry_date, resolve_entry_text, Session};
use crate::error::CliError;

/// Create the entry for a day, or replace its content if one exists
pub fn run_write(
    session: &Session,
    text_parts: &[String],
    date: Option<&str>,
    mood: Option<String>,
) -> Result<Record, CliError> {
    let text = resolve_entry_text(text_parts)?;
    let date = resolve_entry_date(date)?;
    let mut content = EntryContent::text(text);
    content.mood = normalize_text_option(mood);

    let pipeline = MutationPipeline::new(
        Arc::clone(&session.state),
        Arc::clone(&session.remote),
        session.settings.clone(),
    );
    let mutation = if session.state.private().contains(&date) {
        Mutation::UpdateEntry {
            scope: EntryScope::Private,
            entry_id: date,
            content,
        }
    } else {
        Mutation::CreateEntry {
            scope: EntryScope::Private,
            record: Record::draft(date, content),
        }
    };

    let applied = pipeline.apply(&session.user_id, mutation)?;
    println!("{}", applied.record.id);
    Ok(applied.record)
}
