//! Moderation report models

use serde::{Deserialize, Serialize};

/// What kind of content a report targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Entry,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Resolved,
}

/// A single moderation report filed by one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub journal_id: String,
    /// Reported entry or comment id
    pub content_id: String,
    /// Entry the content belongs to (equals `content_id` for entries)
    pub entry_id: String,
    pub kind: ReportKind,
    pub reason: String,
    pub reported_by: String,
    pub content_author_id: Option<String>,
    pub text_snippet: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    #[serde(default)]
    pub status: ReportStatus,
}

/// Read-time aggregation of every report against one piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportGroup {
    pub content_id: String,
    pub entry_id: String,
    pub kind: ReportKind,
    pub content_author_id: Option<String>,
    pub text_snippet: String,
    /// Distinct reporters
    pub count: usize,
    /// Distinct reasons in first-seen order
    pub reasons: Vec<String>,
    pub reporters: Vec<String>,
    pub latest_at: i64,
}
