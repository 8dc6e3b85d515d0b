//! Sync engine configuration.
//!
//! `SyncSettings` is passed explicitly to the orchestrator, listener and
//! mutation pipeline. Clients may ship a JSON file to override defaults.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DEFAULT_LIVE_WINDOW: usize = 50;
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_SNIPPET_LENGTH: usize = 80;
const DEFAULT_CONFLICT_MARKER: &str = "\n\n--- conflicting local edit ---\n\n";

/// Tunables for synchronization and shared journals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Number of most recent entries kept under live subscription
    pub live_window: usize,
    /// Default page size for "older than" fetches
    pub page_size: usize,
    /// Separator placed between remote and local text on a genuine conflict
    pub conflict_marker: String,
    /// Max characters kept in last-entry and report snippets
    pub snippet_length: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            live_window: DEFAULT_LIVE_WINDOW,
            page_size: DEFAULT_PAGE_SIZE,
            conflict_marker: DEFAULT_CONFLICT_MARKER.to_string(),
            snippet_length: DEFAULT_SNIPPET_LENGTH,
        }
    }
}

impl SyncSettings {
    /// Parse and validate settings from a JSON payload.
    ///
    /// Missing fields fall back to defaults; unknown fields are rejected.
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid sync settings JSON: {error}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.live_window == 0 {
            return Err(Error::Config("live_window must be greater than 0".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be greater than 0".into()));
        }
        if self.snippet_length == 0 {
            return Err(Error::Config("snippet_length must be greater than 0".into()));
        }
        if self.conflict_marker.trim().is_empty() {
            return Err(Error::Config("conflict_marker must not be blank".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SyncSettings::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = SyncSettings::from_json(r#"{"live_window": 10}"#).unwrap();
        assert_eq!(settings.live_window, 10);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.conflict_marker, DEFAULT_CONFLICT_MARKER);
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = SyncSettings::from_json(r#"{"live_windw": 10}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_zero_window_and_blank_marker() {
        assert!(SyncSettings::from_json(r#"{"live_window": 0}"#).is_err());
        assert!(SyncSettings::from_json(r#"{"conflict_marker": "   "}"#).is_err());
    }
}
