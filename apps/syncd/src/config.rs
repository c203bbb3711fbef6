//! Daemon settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use quotesync_core::quotes::{
    BackoffPolicy, SyncConfig, DEFAULT_ASSET_BUDGET_SECS, DEFAULT_BACKOFF_BASE_SECS,
    DEFAULT_BACKOFF_CAP_SECS, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_DEGRADED_THRESHOLD,
    DEFAULT_MAX_CONCURRENCY,
};

const DEFAULT_DB_PATH: &str = "./db/quotesync.db";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_INITIAL_DELAY_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub sync_interval: Duration,
    pub initial_delay: Duration,
    pub log_format: LogFormat,
    pub sync: SyncConfig,
}

impl Config {
    /// Load `.env` if present, then read `QS_*` variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparseable values use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str, default: u64| parse_or(&lookup, key, default);
        let secs = |key: &str, default: u64| Duration::from_secs(number(key, default));

        let log_format = match lookup("QS_LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let sync = SyncConfig {
            max_concurrency: parse_or(&lookup, "QS_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)
                .max(1),
            call_timeout: secs("QS_CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS),
            asset_budget: secs("QS_ASSET_BUDGET_SECS", DEFAULT_ASSET_BUDGET_SECS),
            backoff: BackoffPolicy {
                base: secs("QS_BACKOFF_BASE_SECS", DEFAULT_BACKOFF_BASE_SECS),
                cap: secs("QS_BACKOFF_CAP_SECS", DEFAULT_BACKOFF_CAP_SECS),
                degraded_threshold: parse_or(
                    &lookup,
                    "QS_DEGRADED_THRESHOLD",
                    DEFAULT_DEGRADED_THRESHOLD,
                ),
                ..BackoffPolicy::default()
            },
            ..SyncConfig::default()
        };

        Self {
            db_path: lookup("QS_DB_PATH")
                .filter(|path| !path.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            sync_interval: secs("QS_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)
                .max(Duration::from_secs(1)),
            initial_delay: secs("QS_SYNC_INITIAL_DELAY_SECS", DEFAULT_INITIAL_DELAY_SECS),
            log_format,
            sync,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
