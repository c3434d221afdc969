//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DEFAULT_DAILY_NOTIFICATION_CAP, DEFAULT_MESSAGE_HISTORY_LIMIT, DEFAULT_REMINDERS_PER_RUN,
};
use crate::{HealthError, HealthResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    daily_notification_cap: usize,
    reminders_per_run: usize,
    message_history_limit: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default limits.
    ///
    /// # Errors
    ///
    /// Returns `HealthError::InvalidInput` if `data_dir` exists but is not a directory.
    pub fn new(data_dir: PathBuf) -> HealthResult<Self> {
        if data_dir.exists() && !data_dir.is_dir() {
            return Err(HealthError::InvalidInput(format!(
                "data directory is not a directory: {}",
                data_dir.display()
            )));
        }

        Ok(Self {
            data_dir,
            daily_notification_cap: DEFAULT_DAILY_NOTIFICATION_CAP,
            reminders_per_run: DEFAULT_REMINDERS_PER_RUN,
            message_history_limit: DEFAULT_MESSAGE_HISTORY_LIMIT,
        })
    }

    /// Override the notification limits.
    ///
    /// `reminders_per_run` may not exceed `daily_notification_cap`, and neither may be zero.
    pub fn with_notification_limits(
        mut self,
        daily_notification_cap: usize,
        reminders_per_run: usize,
    ) -> HealthResult<Self> {
        if daily_notification_cap == 0 || reminders_per_run == 0 {
            return Err(HealthError::InvalidInput(
                "notification limits must be greater than zero".into(),
            ));
        }
        if reminders_per_run > daily_notification_cap {
            return Err(HealthError::InvalidInput(
                "reminders_per_run cannot exceed daily_notification_cap".into(),
            ));
        }

        self.daily_notification_cap = daily_notification_cap;
        self.reminders_per_run = reminders_per_run;
        Ok(self)
    }

    pub fn with_message_history_limit(mut self, limit: usize) -> Self {
        self.message_history_limit = limit.max(1);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn collection_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn daily_notification_cap(&self) -> usize {
        self.daily_notification_cap
    }

    pub fn reminders_per_run(&self) -> usize {
        self.reminders_per_run
    }

    pub fn message_history_limit(&self) -> usize {
        self.message_history_limit
    }
}

/// Parse an optional numeric limit from an environment value.
///
/// Empty or missing values yield `default`.
pub fn limit_from_env_value(value: Option<String>, default: usize) -> HealthResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        Some(v) => v
            .parse::<usize>()
            .map_err(|e| HealthError::InvalidInput(format!("invalid limit '{v}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_file_as_data_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, "x").expect("should write file");

        let err = CoreConfig::new(file).expect_err("a file is not a data directory");
        assert!(matches!(err, HealthError::InvalidInput(_)));
    }

    #[test]
    fn test_notification_limits_validation() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = CoreConfig::new(temp_dir.path().to_path_buf()).expect("config should build");

        assert_eq!(cfg.daily_notification_cap(), 5);
        assert_eq!(cfg.reminders_per_run(), 2);
        assert!(cfg.clone().with_notification_limits(2, 3).is_err());
        assert!(cfg.clone().with_notification_limits(0, 0).is_err());

        let cfg = cfg
            .with_notification_limits(10, 4)
            .expect("limits should be accepted");
        assert_eq!(cfg.daily_notification_cap(), 10);
        assert_eq!(cfg.reminders_per_run(), 4);
    }

    #[test]
    fn test_limit_from_env_value() {
        assert_eq!(limit_from_env_value(None, 5).unwrap(), 5);
        assert_eq!(limit_from_env_value(Some("  ".into()), 5).unwrap(), 5);
        assert_eq!(limit_from_env_value(Some("7".into()), 5).unwrap(), 7);
        assert!(limit_from_env_value(Some("seven".into()), 5).is_err());
    }
}
