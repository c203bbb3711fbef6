//! Quote synchronization constants.

/// Days of history fetched for an asset that has never synced.
pub const DEFAULT_HISTORY_DAYS: i64 = 365;

/// Upper bound on assets synced at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Timeout for a single provider call, in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Overall fetch budget for one asset across all providers, in seconds.
pub const DEFAULT_ASSET_BUDGET_SECS: u64 = 120;

/// First retry delay after a failure, in seconds. Doubles per failure.
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 60;

/// Retry delay ceiling, in seconds (one day).
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 86_400;

/// Consecutive failures after which an asset is flagged degraded.
/// Degraded assets keep retrying on schedule.
pub const DEFAULT_DEGRADED_THRESHOLD: i32 = 5;
