//! Moderation reports: duplicate-free submission and moderator review.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::SyncSettings;
use crate::models::{Journal, Report, ReportGroup, ReportKind, ReportStatus};
use crate::remote::RemoteStore;
use crate::store::LocalState;
use crate::util::{now_millis, snippet};
use crate::{Error, Result};

/// Aggregate pending reports per reported content.
///
/// `count` is the number of distinct reporters. Groups are ordered by count,
/// most reported first, then by the newest report.
#[must_use]
pub fn group_reports(reports: &[Report]) -> Vec<ReportGroup> {
    let mut groups: BTreeMap<&str, ReportGroup> = BTreeMap::new();

    for report in reports
        .iter()
        .filter(|report| report.status == ReportStatus::Pending)
    {
        let group = groups
            .entry(report.content_id.as_str())
            .or_insert_with(|| ReportGroup {
                content_id: report.content_id.clone(),
                entry_id: report.entry_id.clone(),
                kind: report.kind,
                content_author_id: report.content_author_id.clone(),
                text_snippet: report.text_snippet.clone(),
                count: 0,
                reasons: Vec::new(),
                reporters: Vec::new(),
                latest_at: report.created_at,
            });

        if !group.reporters.contains(&report.reported_by) {
            group.reporters.push(report.reported_by.clone());
            group.count = group.reporters.len();
        }
        if !group.reasons.contains(&report.reason) {
            group.reasons.push(report.reason.clone());
        }
        group.latest_at = group.latest_at.max(report.created_at);
    }

    let mut groups = groups.into_values().collect::<Vec<_>>();
    groups.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.latest_at.cmp(&a.latest_at))
    });
    groups
}

/// Files reports and serves them to moderators.
pub struct ReportGuard<R: RemoteStore> {
    state: Arc<LocalState>,
    remote: Arc<R>,
    settings: SyncSettings,
    submit_lock: tokio::sync::Mutex<()>,
}

impl<R: RemoteStore> ReportGuard<R> {
    pub fn new(state: Arc<LocalState>, remote: Arc<R>, settings: SyncSettings) -> Self {
        Self {
            state,
            remote,
            settings,
            submit_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Report an entry or comment of `journal_id`.
    ///
    /// Fails with `AlreadyReported` if `reporter_id` already has a report
    /// on this content; no second row is stored.
    pub async fn submit(
        &self,
        journal_id: &str,
        content_id: &str,
        reporter_id: &str,
        reason: &str,
    ) -> Result<Report> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::InvalidInput("a report needs a reason".into()));
        }
        let journal = self.state.require_journal(journal_id)?;
        if !journal.is_member(reporter_id) {
            return Err(Error::permission(format!(
                "{reporter_id} is not a member of journal {journal_id}"
            )));
        }
        let mut report = self.describe(&journal, content_id)?;
        report.reason = reason.to_string();
        report.reported_by = reporter_id.to_string();

        // check-then-insert is serialized per client only
        let _submit = self.submit_lock.lock().await;
        let existing = self
            .remote
            .find_reports(journal_id, content_id, reporter_id)
            .await?;
        if !existing.is_empty() {
            return Err(Error::AlreadyReported {
                content_id: content_id.to_string(),
                reporter_id: reporter_id.to_string(),
            });
        }

        self.remote.insert_report(&report).await?;
        tracing::info!(journal_id, content_id, kind = ?report.kind, "Report submitted");
        Ok(report)
    }

    /// Pending reports of `journal_id` grouped per content
    pub async fn grouped(&self, journal_id: &str, moderator_id: &str) -> Result<Vec<ReportGroup>> {
        self.require_moderator(journal_id, moderator_id)?;
        let reports = self.remote.list_reports(journal_id).await?;
        Ok(group_reports(&reports))
    }

    /// Drop every report on `content_id` at once; returns how many went
    pub async fn resolve(
        &self,
        journal_id: &str,
        content_id: &str,
        moderator_id: &str,
    ) -> Result<usize> {
        self.require_moderator(journal_id, moderator_id)?;
        let removed = self
            .remote
            .delete_reports_for_content(journal_id, content_id)
            .await?;
        tracing::info!(journal_id, content_id, removed, "Reports resolved");
        Ok(removed)
    }

    fn require_moderator(&self, journal_id: &str, moderator_id: &str) -> Result<()> {
        let journal = self.state.require_journal(journal_id)?;
        if journal
            .role_of(moderator_id)
            .is_some_and(|role| role.is_privileged())
        {
            Ok(())
        } else {
            Err(Error::permission(format!(
                "{moderator_id} cannot moderate journal {journal_id}"
            )))
        }
    }

    /// Report skeleton for `content_id`, which is an entry id or the id of a
    /// comment on one of the journal's entries
    fn describe(&self, journal: &Journal, content_id: &str) -> Result<Report> {
        let entries = self.state.entries(&journal.id);
        let skeleton = |entry_id: &str, kind, author: Option<String>, text: &str| Report {
            id: Uuid::now_v7().to_string(),
            journal_id: journal.id.clone(),
            content_id: content_id.to_string(),
            entry_id: entry_id.to_string(),
            kind,
            reason: String::new(),
            reported_by: String::new(),
            content_author_id: author,
            text_snippet: snippet(text, self.settings.snippet_length),
            created_at: now_millis(),
            status: ReportStatus::Pending,
        };

        if let Some(entry) = entries.get(content_id) {
            return Ok(skeleton(
                &entry.id,
                ReportKind::Entry,
                entry.author_id.clone(),
                &entry.content.text,
            ));
        }

        entries
            .snapshot()
            .values()
            .find_map(|entry| {
                entry.comments.find(content_id).map(|comment| {
                    skeleton(
                        &entry.id,
                        ReportKind::Comment,
                        Some(comment.user_id.clone()),
                        &comment.text,
                    )
                })
            })
            .ok_or_else(|| Error::NotFound(format!("content {content_id} in journal {}", journal.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comment, EntryContent, Record, Role};
    use crate::remote::MemoryRemoteStore;
    use pretty_assertions::assert_eq;

    struct Fixture {
        remote: Arc<MemoryRemoteStore>,
        guard: ReportGuard<MemoryRemoteStore>,
        entry: Record,
        comment: Comment,
    }

    fn setup() -> Fixture {
        let state = Arc::new(LocalState::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut journal = Journal::new("j1", "Club", "ana", 1);
        for (member, role) in [("ben", Role::Member), ("cy", Role::Member), ("dee", Role::Admin)] {
            journal.members.push(member.into());
            journal.roles.insert(member.into(), role);
        }
        state.put_journal(journal);

        let mut entry = Record::shared("ben", "Ben", EntryContent::text("Something rude"));
        let comment = Comment::new("cy", "Cy", "an unkind remark");
        entry.comments.add(comment.clone());
        state.entries("j1").upsert(entry.clone());

        let guard = ReportGuard::new(state, Arc::clone(&remote), SyncSettings::default());
        Fixture {
            remote,
            guard,
            entry,
            comment,
        }
    }

    fn report(content_id: &str, by: &str, reason: &str, created_at: i64) -> Report {
        Report {
            id: format!("{content_id}-{by}"),
            journal_id: "j1".into(),
            content_id: content_id.into(),
            entry_id: content_id.into(),
            kind: ReportKind::Entry,
            reason: reason.into(),
            reported_by: by.into(),
            content_author_id: None,
            text_snippet: String::new(),
            created_at,
            status: ReportStatus::Pending,
        }
    }

    #[tokio::test]
    async fn second_report_by_same_user_is_rejected() {
        let fx = setup();
        let first = fx
            .guard
            .submit("j1", &fx.entry.id, "ana", "spam")
            .await
            .unwrap();
        assert_eq!(first.kind, ReportKind::Entry);
        assert_eq!(first.content_author_id.as_deref(), Some("ben"));
        assert_eq!(first.text_snippet, "Something rude");

        let second = fx.guard.submit("j1", &fx.entry.id, "ana", "still spam").await;
        assert!(matches!(second, Err(Error::AlreadyReported { .. })));
        assert_eq!(fx.remote.reports().len(), 1);
    }

    #[tokio::test]
    async fn comments_are_reported_against_their_entry() {
        let fx = setup();
        let report = fx
            .guard
            .submit("j1", &fx.comment.id, "ben", "harassment")
            .await
            .unwrap();
        assert_eq!(report.kind, ReportKind::Comment);
        assert_eq!(report.entry_id, fx.entry.id);
        assert_eq!(report.content_author_id.as_deref(), Some("cy"));
    }

    #[tokio::test]
    async fn unknown_content_and_outsiders_are_rejected() {
        let fx = setup();
        assert!(matches!(
            fx.guard.submit("j1", "missing", "ana", "spam").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            fx.guard.submit("j1", &fx.entry.id, "eve", "spam").await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            fx.guard.submit("j1", &fx.entry.id, "ana", "   ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn moderators_review_and_resolve_groups() {
        let fx = setup();
        fx.guard.submit("j1", &fx.entry.id, "ana", "spam").await.unwrap();
        fx.guard.submit("j1", &fx.entry.id, "cy", "offensive").await.unwrap();
        fx.guard.submit("j1", &fx.comment.id, "ben", "spam").await.unwrap();

        assert!(matches!(
            fx.guard.grouped("j1", "ben").await,
            Err(Error::PermissionDenied(_))
        ));

        let groups = fx.guard.grouped("j1", "dee").await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].content_id, fx.entry.id);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].reasons, vec!["spam", "offensive"]);

        let removed = fx.guard.resolve("j1", &fx.entry.id, "dee").await.unwrap();
        assert_eq!(removed, 2);
        let remaining = fx.guard.grouped("j1", "ana").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, ReportKind::Comment);
    }

    #[test]
    fn grouping_counts_distinct_reporters_and_orders_by_volume() {
        let mut resolved = report("c", "zed", "old", 99);
        resolved.status = ReportStatus::Resolved;
        let reports = vec![
            report("a", "u1", "spam", 10),
            report("b", "u1", "spam", 30),
            report("b", "u2", "spam", 20),
            report("b", "u2", "rude", 25),
            report("c", "u3", "rude", 50),
            resolved,
        ];

        let groups = group_reports(&reports);
        let summary = groups
            .iter()
            .map(|g| (g.content_id.as_str(), g.count, g.latest_at))
            .collect::<Vec<_>>();
        assert_eq!(summary, vec![("b", 2, 30), ("c", 1, 50), ("a", 1, 10)]);
        assert_eq!(groups[0].reasons, vec!["spam", "rude"]);
    }
}
