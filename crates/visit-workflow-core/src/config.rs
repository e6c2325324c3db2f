//! Runtime configuration.
//!
//! Resolved once at startup and passed into the engine. Nothing here reads
//! the environment while a visit is in progress.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbResult};

/// Default quiet period before an edited draft is written.
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 1500;

/// Longest accepted autosave delay.
pub const MAX_AUTOSAVE_DELAY_MS: u64 = 10_000;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowConfig {
    /// Trailing-debounce delay for consultation autosave
    pub autosave_delay_ms: u64,
    /// Registration is handled by the front desk before the engine sees the
    /// visit; new visits start at the vitals step
    pub registration_pre_done: bool,
    /// SQLite file; in-memory when absent
    pub database_path: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            registration_pre_done: false,
            database_path: None,
        }
    }
}

impl WorkflowConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_delay_ms == 0 || self.autosave_delay_ms > MAX_AUTOSAVE_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "autosaveDelayMs must be between 1 and {}, got {}",
                MAX_AUTOSAVE_DELAY_MS, self.autosave_delay_ms
            )));
        }
        Ok(())
    }

    pub fn autosave_delay(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.autosave_delay_ms as i64)
    }

    /// Open the configured database.
    pub fn open_database(&self) -> DbResult<Database> {
        match &self.database_path {
            Some(path) => Database::open(path),
            None => Database::open_in_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::from_json_str("{}").unwrap();
        assert_eq!(config, WorkflowConfig::default());
        assert_eq!(config.autosave_delay(), chrono::Duration::milliseconds(1500));
    }

    #[test]
    fn test_parse_camel_case() {
        let config = WorkflowConfig::from_json_str(
            r#"{"autosaveDelayMs": 2000, "registrationPreDone": true}"#,
        )
        .unwrap();
        assert_eq!(config.autosave_delay_ms, 2000);
        assert!(config.registration_pre_done);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_rejects_bad_delay() {
        assert!(matches!(
            WorkflowConfig::from_json_str(r#"{"autosaveDelayMs": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WorkflowConfig::from_json_str(r#"{"autosaveDelayMs": 60000}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WorkflowConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_open_in_memory_database() {
        assert!(WorkflowConfig::default().open_database().is_ok());
    }
}
