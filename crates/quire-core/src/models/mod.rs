//! Data models for Quire

mod comment;
mod journal;
mod reaction;
mod record;
mod report;

pub use comment::{Comment, CommentList};
pub use journal::{Journal, LastEntry, Role};
pub use reaction::ReactionSet;
pub use record::{EntryContent, Record};
pub use report::{Report, ReportGroup, ReportKind, ReportStatus};
