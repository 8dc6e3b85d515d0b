use std::path::Path;

use quire_core::models::{Journal, Report, ReportKind, ReportStatus, Role};
use quire_core::sync::Decision;
use quire_core::RemoteStore;
use tempfile::TempDir;

use crate::cli::ExportFormat;
use crate::commands::common::{
    format_relative_time, resolve_entry_date, resolve_entry_text, Session, SessionPaths,
};
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::reports::{format_report_lines, run_resolve_reports};
use crate::commands::restore::run_restore;
use crate::commands::sync::{format_sync_summary, run_sync};
use crate::commands::write::run_write;
use crate::error::CliError;

fn paths(dir: &Path, device: &str) -> SessionPaths {
    SessionPaths::resolve(
        Some(dir.join(format!("{device}.db"))),
        Some(dir.join("remote.json")),
        None,
    )
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[test]
fn resolve_entry_date_validates_format() {
    assert_eq!(resolve_entry_date(Some(" 2024-02-29 ")).unwrap(), "2024-02-29");
    assert!(matches!(
        resolve_entry_date(Some("2023-02-29")),
        Err(CliError::InvalidDate(_))
    ));
    assert_eq!(resolve_entry_date(None).unwrap().len(), 10);
}

#[test]
fn resolve_entry_text_rejects_blank_input() {
    assert_eq!(resolve_entry_text(&words(" a  walk ")).unwrap(), "a walk");
    assert!(matches!(
        resolve_entry_text(&[]),
        Err(CliError::EmptyContent)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 3 * 86_400_000, now), "3d ago");
}

#[test]
fn settings_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, r#"{"page_size": 5}"#).unwrap();

    let mut paths = paths(dir.path(), "laptop");
    paths.settings = Some(settings);
    let session = Session::open(&paths, "ana").unwrap();
    assert_eq!(session.settings.page_size, 5);
    assert_eq!(session.settings.live_window, 50);
}

#[test]
fn write_persists_between_sessions() {
    let dir = TempDir::new().unwrap();
    let paths = paths(dir.path(), "laptop");

    let session = Session::open(&paths, "ana").unwrap();
    let record = run_write(&session, &words("first light"), Some("2024-01-01"), None).unwrap();
    assert!(record.has_unsynced_changes());
    session.close().unwrap();

    let reopened = Session::open(&paths, "ana").unwrap();
    let stored = reopened.state.private().get("2024-01-01").unwrap();
    assert_eq!(stored.content.text, "first light");
}

#[tokio::test]
async fn two_devices_converge_through_the_remote_file() {
    let dir = TempDir::new().unwrap();

    let laptop = Session::open(&paths(dir.path(), "laptop"), "ana").unwrap();
    run_write(&laptop, &words("Morning thoughts"), Some("2024-01-01"), None).unwrap();
    run_sync(&laptop, 5).await.unwrap();
    laptop.close().unwrap();

    let phone = Session::open(&paths(dir.path(), "phone"), "ana").unwrap();
    let report = run_sync(&phone, 5).await.unwrap();
    assert_eq!(report.count(Decision::AcceptedNew), 1);
    run_write(&phone, &words("edited on phone"), Some("2024-01-01"), None).unwrap();
    run_sync(&phone, 5).await.unwrap();
    phone.close().unwrap();

    let laptop = Session::open(&paths(dir.path(), "laptop"), "ana").unwrap();
    run_write(&laptop, &words("edited on laptop"), Some("2024-01-01"), None).unwrap();
    let report = run_sync(&laptop, 5).await.unwrap();
    assert_eq!(report.count(Decision::Merged), 1);

    let merged = laptop.state.private().get("2024-01-01").unwrap();
    assert!(merged.content.text.contains("edited on phone"));
    assert!(merged.content.text.contains("edited on laptop"));
    assert!(format_sync_summary(&report).contains("1 merged"));
}

#[tokio::test]
async fn delete_reaches_remote_and_stays_deleted_after_sync() {
    let dir = TempDir::new().unwrap();
    let session = Session::open(&paths(dir.path(), "laptop"), "ana").unwrap();
    run_write(&session, &words("oops"), Some("2024-03-03"), None).unwrap();
    run_sync(&session, 5).await.unwrap();

    session.remote.fail_writes(true);
    run_delete(&session, "2024-03-03").await.unwrap();
    assert_eq!(session.state.pending().len(), 1);

    session.remote.fail_writes(false);
    let report = run_sync(&session, 5).await.unwrap();
    assert!(report.merged.is_empty());
    assert!(session.state.pending().is_empty());
    assert!(session.remote.private_record("ana", "2024-03-03").is_none());
}

#[test]
fn export_then_restore_replaces_local_state() {
    let dir = TempDir::new().unwrap();
    let backup = dir.path().join("backup.json");

    let session = Session::open(&paths(dir.path(), "laptop"), "ana").unwrap();
    run_write(&session, &words("keep me"), Some("2024-04-01"), Some("calm".into())).unwrap();
    run_export(&session, ExportFormat::Json, Some(&backup)).unwrap();
    run_write(&session, &words("written after backup"), Some("2024-04-02"), None).unwrap();

    run_restore(&session, &backup).unwrap();
    assert!(session.state.private().contains("2024-04-01"));
    assert!(!session.state.private().contains("2024-04-02"));
    assert_eq!(
        session.state.private().get("2024-04-01").unwrap().content.mood.as_deref(),
        Some("calm")
    );
}

#[test]
fn export_into_directory_uses_timestamped_name() {
    let dir = TempDir::new().unwrap();
    let session = Session::open(&paths(dir.path(), "laptop"), "ana").unwrap();
    run_write(&session, &words("dated"), Some("2024-04-01"), None).unwrap();

    let written = run_export(&session, ExportFormat::Json, Some(dir.path()))
        .unwrap()
        .unwrap();
    let name = written.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("quire-backup-"));
    assert!(name.ends_with(".json"));
    run_restore(&session, &written).unwrap();

    let markdown = run_export(&session, ExportFormat::Markdown, Some(dir.path()))
        .unwrap()
        .unwrap();
    assert_eq!(markdown.extension().unwrap(), "md");
    assert!(std::fs::read_to_string(markdown).unwrap().contains("id: 2024-04-01"));
}

#[tokio::test]
async fn moderator_resolves_reports_from_the_cli() {
    let dir = TempDir::new().unwrap();
    let session = Session::open(&paths(dir.path(), "laptop"), "ana").unwrap();
    let mut journal = Journal::new("j1", "Club", "ana", 1);
    journal.members.push("ben".into());
    journal.roles.insert("ben".into(), Role::Member);
    session.remote.put_journal(&journal).await.unwrap();
    session
        .remote
        .insert_report(&Report {
            id: "r1".into(),
            journal_id: "j1".into(),
            content_id: "e1".into(),
            entry_id: "e1".into(),
            kind: ReportKind::Entry,
            reason: "spam".into(),
            reported_by: "ben".into(),
            content_author_id: Some("cy".into()),
            text_snippet: "buy now".into(),
            created_at: 1_700_000_000_000,
            status: ReportStatus::Pending,
        })
        .await
        .unwrap();

    let groups = session.remote.list_reports("j1").await.unwrap();
    let lines = format_report_lines(&quire_core::moderation::group_reports(&groups));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[spam]"));

    run_resolve_reports(&session, "j1", "e1").await.unwrap();
    assert!(session.remote.reports().is_empty());
    assert!(matches!(
        run_resolve_reports(&session, "missing", "e1").await,
        Err(CliError::JournalNotFound(_))
    ));
}
