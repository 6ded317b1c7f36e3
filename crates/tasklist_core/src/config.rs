//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve database and logging locations from process environment.
//!
//! # Invariants
//! - Blank variables count as unset.
//! - Logging is only configured when a log directory is provided.

use crate::logging::{init_logging, LogLevel, LogSettings, LoggingError};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "TASKLIST_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "TASKLIST_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "TASKLIST_LOG_DIR";
pub const DEFAULT_DB_FILE_NAME: &str = "tasklist.sqlite3";

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    /// Raw level name; validated when logging starts.
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, applying defaults for any
    /// missing or blank value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: non_blank(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: non_blank(LOG_LEVEL_ENV)
                .unwrap_or_else(|| LogLevel::build_default().as_str().to_string()),
            log_dir: non_blank(LOG_DIR_ENV),
        }
    }

    /// Logger settings, or `None` when no log directory is configured.
    pub fn log_settings(&self) -> Option<Result<LogSettings, LoggingError>> {
        self.log_dir
            .as_deref()
            .map(|dir| LogSettings::parse(&self.log_level, dir))
    }

    /// Starts logging when configured. Returns whether logging is active.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        match self.log_settings() {
            Some(settings) => {
                init_logging(&settings?)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DB_PATH_ENV, DEFAULT_DB_FILE_NAME, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use crate::logging::LogLevel;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> CoreConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let config = config_from(&[(DB_PATH_ENV, "   "), (LOG_LEVEL_ENV, "")]);
        assert_eq!(
            config.db_path,
            std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
        );
        assert_eq!(config.log_level, LogLevel::build_default().as_str());
        assert_eq!(config.log_dir, None);
        assert!(config.log_settings().is_none());
    }

    #[test]
    fn explicit_values_are_trimmed() {
        let config = config_from(&[
            (DB_PATH_ENV, " /data/tasks.db "),
            (LOG_LEVEL_ENV, "warn"),
            (LOG_DIR_ENV, "/var/log/tasklist"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/data/tasks.db"));
        let settings = config.log_settings().unwrap().unwrap();
        assert_eq!(settings.level, LogLevel::Warn);
        assert_eq!(settings.log_dir, PathBuf::from("/var/log/tasklist"));
    }

    #[test]
    fn invalid_level_surfaces_when_logging_is_configured() {
        let config = config_from(&[(LOG_LEVEL_ENV, "loud"), (LOG_DIR_ENV, "/tmp/tasklist")]);
        assert!(config.log_settings().unwrap().is_err());
    }
}
