use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quire_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry text provided")]
    EmptyContent,
    #[error("Invalid entry date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("No entry found for {0}")]
    EntryNotFound(String),
    #[error("Journal {0} does not exist on the remote")]
    JournalNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
