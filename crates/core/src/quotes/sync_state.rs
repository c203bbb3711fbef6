//! Quote sync state models and traits.
//!
//! One [`SyncState`] row per asset records how far its history has been
//! fetched and how the last attempts went. Rows are created on the first sync
//! attempt, updated only by the sync service, and never deleted.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::constants::{
    DEFAULT_BACKOFF_BASE_SECS, DEFAULT_BACKOFF_CAP_SECS, DEFAULT_DEGRADED_THRESHOLD,
};
use crate::errors::Result;

// =============================================================================
// Backoff
// =============================================================================

/// Retry schedule after failed syncs.
///
/// Delay after the n-th consecutive failure is `min(cap, base * 2^n)` plus a
/// random jitter of up to `jitter_ratio` of that delay.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub jitter_ratio: f64,
    /// Consecutive failures at which an asset is flagged degraded.
    pub degraded_threshold: i32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(DEFAULT_BACKOFF_BASE_SECS),
            cap: Duration::from_secs(DEFAULT_BACKOFF_CAP_SECS),
            jitter_ratio: 0.1,
            degraded_threshold: DEFAULT_DEGRADED_THRESHOLD,
        }
    }
}

impl BackoffPolicy {
    /// Delay before jitter for the given failure count.
    pub fn delay(&self, consecutive_failures: i32) -> Duration {
        let exponent = consecutive_failures.clamp(0, 31) as u32;
        self.base
            .checked_mul(2u32.pow(exponent))
            .map_or(self.cap, |d| d.min(self.cap))
    }

    /// Delay including jitter.
    pub fn delay_with_jitter(&self, consecutive_failures: i32) -> Duration {
        let delay = self.delay(consecutive_failures);
        let max_jitter_ms = (delay.as_millis() as f64 * self.jitter_ratio.max(0.0)) as u64;
        if max_jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Domain model for quote sync state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub asset_id: String,
    /// Newest date committed by a successful sync.
    pub last_successful_date: Option<NaiveDate>,
    pub consecutive_failures: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub degraded: bool,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(asset_id: impl Into<String>) -> Self {
        SyncState {
            asset_id: asset_id.into(),
            last_successful_date: None,
            consecutive_failures: 0,
            next_retry_at: None,
            degraded: false,
            last_attempt_at: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether a scheduled run may attempt the asset at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.is_none_or(|at| at <= now)
    }

    /// Record a committed fetch. `newest` is the latest date written, if any
    /// row came back; an empty success leaves the progress marker alone.
    pub fn record_success(&mut self, newest: Option<NaiveDate>, now: DateTime<Utc>) {
        if let Some(newest) = newest {
            self.last_successful_date = Some(
                self.last_successful_date
                    .map_or(newest, |current| current.max(newest)),
            );
        }
        self.consecutive_failures = 0;
        self.next_retry_at = None;
        self.degraded = false;
        self.last_error = None;
        self.last_attempt_at = Some(now);
        self.updated_at = now;
    }

    /// Record a failed attempt and schedule the next one.
    ///
    /// A provider-suggested delay is honoured when it is longer than the
    /// computed backoff. Returns true when this failure flipped the asset to
    /// degraded.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        policy: &BackoffPolicy,
        retry_after: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let mut delay = policy.delay_with_jitter(self.consecutive_failures);
        if let Some(suggested) = retry_after {
            delay = delay.max(suggested);
        }
        let delay = ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::days(1));
        self.next_retry_at = Some(now + delay);

        let was_degraded = self.degraded;
        if self.consecutive_failures >= policy.degraded_threshold {
            self.degraded = true;
        }
        self.last_error = Some(error.into());
        self.last_attempt_at = Some(now);
        self.updated_at = now;
        self.degraded && !was_degraded
    }
}

// =============================================================================
// Fetch window
// =============================================================================

/// Dates still missing for an asset, clipped to the provider's lookback.
///
/// Starts the day after `last_successful_date` (or `default_history_days`
/// back for a fresh asset) and ends today. Returns `None` when there is
/// nothing to fetch.
pub fn fetch_window(
    last_successful_date: Option<NaiveDate>,
    today: NaiveDate,
    default_history_days: i64,
    max_lookback_days: Option<i64>,
) -> Option<(NaiveDate, NaiveDate)> {
    let mut start = match last_successful_date {
        Some(last) => last.succ_opt()?,
        None => today - ChronoDuration::days(default_history_days.max(0)),
    };
    if let Some(lookback) = max_lookback_days {
        start = start.max(today - ChronoDuration::days(lookback.max(0)));
    }
    (start <= today).then_some((start, today))
}

// =============================================================================
// Store
// =============================================================================

/// Trait for quote sync state storage operations.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    fn get_by_asset_id(&self, asset_id: &str) -> Result<Option<SyncState>>;

    fn get_by_asset_ids(&self, asset_ids: &[String]) -> Result<HashMap<String, SyncState>>;

    fn get_all(&self) -> Result<Vec<SyncState>>;

    /// Insert or replace the row for `state.asset_id`.
    async fn upsert(&self, state: &SyncState) -> Result<()>;
}
