use crate::commands::common::{entry_to_list_item, format_entry_lines, EntryListItem, Session};
use crate::error::CliError;

pub fn run_list(session: &Session, limit: usize, as_json: bool) -> Result<(), CliError> {
    let mut records = session.state.private().snapshot().into_values().collect::<Vec<_>>();
    records.sort_by(|a, b| b.id.cmp(&a.id));
    records.truncate(limit);

    if as_json {
        let json_items = records
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No entries yet.");
    } else {
        for line in format_entry_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn run_show(session: &Session, date: &str) -> Result<(), CliError> {
    let record = session
        .state
        .private()
        .get(date.trim())
        .ok_or_else(|| CliError::EntryNotFound(date.to_string()))?;

    println!("{}", record.id);
    if let Some(mood) = &record.content.mood {
        println!("mood: {mood}");
    }
    println!();
    println!("{}", record.content.text);
    Ok(())
}
