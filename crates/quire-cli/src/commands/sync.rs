use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use quire_core::mutation::MutationPipeline;
use quire_core::sync::{Decision, SyncOrchestrator, SyncReport};

use crate::commands::common::Session;
use crate::error::CliError;

/// Replay queued remote writes, then run one full sync pass.
///
/// Queued deletes must land first, otherwise the pass would pull the
/// deleted entries back from the remote.
pub async fn run_sync(session: &Session, timeout_secs: u64) -> Result<SyncReport, CliError> {
    let pipeline = MutationPipeline::new(
        Arc::clone(&session.state),
        Arc::clone(&session.remote),
        session.settings.clone(),
    );
    let replayed = pipeline.retry_pending().await?;
    if replayed > 0 {
        println!("Replayed {replayed} queued write(s)");
    }

    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&session.state),
        Arc::clone(&session.remote),
        session.settings.clone(),
    );
    let report = orchestrator
        .sync_all_with_timeout(&session.user_id, Duration::from_secs(timeout_secs))
        .await?;

    println!("{}", format_sync_summary(&report));
    Ok(report)
}

pub fn format_sync_summary(report: &SyncReport) -> String {
    let mut summary = format!(
        "Sync completed: {} entries, {} pushed",
        report.merged.len(),
        report.pushed.len()
    );
    let pulled = report.count(Decision::AcceptedNew) + report.count(Decision::AcceptedRemote);
    if pulled > 0 {
        let _ = write!(summary, ", {pulled} pulled");
    }
    let merged = report.count(Decision::Merged);
    if merged > 0 {
        let _ = write!(summary, ", {merged} merged with conflict markers");
    }
    if !report.deferred.is_empty() {
        let _ = write!(summary, ", {} deferred", report.deferred.len());
    }
    summary
}
