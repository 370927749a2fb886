//! Environment-driven settings for the notification pipeline.
//!
//! Every knob has a development default; numeric values that fail to parse
//! fall back to it, and counts and intervals are clamped to at least one.

use std::str::FromStr;
use std::time::Duration;

use emporia_db::models::delivery_job::DEFAULT_MAX_ATTEMPTS;

/// Notification pipeline configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Unparseable
/// values fall back to the default.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Jobs claimed per `run_batch` (default: `50`).
    pub batch_size: i64,
    /// Delay between scheduled queue drains (default: 60 s).
    pub batch_interval: Duration,
    /// Delay between retention cleanups (default: 1 h).
    pub cleanup_interval: Duration,
    /// Age in days after which read notifications and sent jobs are deleted
    /// (default: `30`).
    pub retention_days: i32,
    /// Attempt budget for new delivery jobs (default: `3`).
    pub max_attempts: i32,
    /// Prefix for relative action links in emails (default: `http://localhost:3000`).
    pub base_url: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(3600),
            retention_days: 30,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_url: "http://localhost:3000".into(),
        }
    }
}

impl NotifyConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `NOTIFY_BATCH_SIZE`            | `50`                    |
    /// | `NOTIFY_BATCH_INTERVAL_SECS`   | `60`                    |
    /// | `NOTIFY_CLEANUP_INTERVAL_SECS` | `3600`                  |
    /// | `NOTIFY_RETENTION_DAYS`        | `30`                    |
    /// | `NOTIFY_MAX_ATTEMPTS`          | `3`                     |
    /// | `APP_BASE_URL`                 | `http://localhost:3000` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_or("NOTIFY_BATCH_SIZE", defaults.batch_size).max(1),
            batch_interval: Duration::from_secs(
                env_or("NOTIFY_BATCH_INTERVAL_SECS", defaults.batch_interval.as_secs()).max(1),
            ),
            cleanup_interval: Duration::from_secs(
                env_or("NOTIFY_CLEANUP_INTERVAL_SECS", defaults.cleanup_interval.as_secs()).max(1),
            ),
            retention_days: env_or("NOTIFY_RETENTION_DAYS", defaults.retention_days).max(1),
            max_attempts: env_or("NOTIFY_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            base_url: std::env::var("APP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }

    /// Turn a relative action path into an absolute link.
    pub fn absolute_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            url.to_string()
        }
    }
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
