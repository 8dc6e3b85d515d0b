use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Keep a private daily journal and sync it between devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the local database file
    #[arg(long, global = true, value_name = "PATH", env = "QUIRE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Path to the file-backed remote store
    #[arg(long, global = true, value_name = "PATH", env = "QUIRE_REMOTE_PATH")]
    pub remote_path: Option<PathBuf>,

    /// User id the private journal belongs to
    #[arg(long, global = true, value_name = "ID", env = "QUIRE_USER", default_value = "me")]
    pub user: String,

    /// JSON file overriding sync settings
    #[arg(long, global = true, value_name = "PATH", env = "QUIRE_SETTINGS")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write or replace the entry for a day
    #[command(alias = "w")]
    Write {
        /// Entry text
        text: Vec<String>,
        /// Day of the entry (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
        /// Optional mood tag
        #[arg(long)]
        mood: Option<String>,
    },
    /// List recent entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the full entry for a day
    Show {
        /// Day of the entry
        date: String,
    },
    /// Delete the entry for a day
    Delete {
        /// Day of the entry
        date: String,
    },
    /// Reconcile local entries with the remote store
    Sync {
        /// Give up after this many seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Export the local state
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace the local state with a JSON backup
    Restore {
        /// Backup file written by `quire export`
        path: PathBuf,
    },
    /// Review moderation reports of a shared journal
    Reports {
        /// Journal id
        journal_id: String,
        /// Resolve every report on this content id instead of listing
        #[arg(long, value_name = "CONTENT_ID")]
        resolve: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}
