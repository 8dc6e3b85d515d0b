use std::sync::Arc;

use quire_core::models::ReportGroup;
use quire_core::moderation::ReportGuard;
use quire_core::{MemoryRemoteStore, RemoteStore};

use crate::commands::common::{format_timestamp, Session};
use crate::error::CliError;

async fn guard(
    session: &Session,
    journal_id: &str,
) -> Result<ReportGuard<MemoryRemoteStore>, CliError> {
    let journal = session
        .remote
        .fetch_journal(journal_id)
        .await?
        .ok_or_else(|| CliError::JournalNotFound(journal_id.to_string()))?;
    session.state.put_journal(journal);
    Ok(ReportGuard::new(
        Arc::clone(&session.state),
        Arc::clone(&session.remote),
        session.settings.clone(),
    ))
}

pub async fn run_reports(
    session: &Session,
    journal_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let groups = guard(session, journal_id)
        .await?
        .grouped(journal_id, &session.user_id)
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No open reports.");
        return Ok(());
    }

    for line in format_report_lines(&groups) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve_reports(
    session: &Session,
    journal_id: &str,
    content_id: &str,
) -> Result<(), CliError> {
    let removed = guard(session, journal_id)
        .await?
        .resolve(journal_id, content_id, &session.user_id)
        .await?;
    println!("Resolved {removed} report(s) on {content_id}");
    Ok(())
}

pub fn format_report_lines(groups: &[ReportGroup]) -> Vec<String> {
    groups
        .iter()
        .map(|group| {
            format!(
                "{:>3}x  {:<7}  {}  {}  [{}]  \"{}\"",
                group.count,
                format!("{:?}", group.kind).to_lowercase(),
                group.content_id,
                format_timestamp(group.latest_at),
                group.reasons.join(", "),
                group.text_snippet
            )
        })
        .collect()
}
