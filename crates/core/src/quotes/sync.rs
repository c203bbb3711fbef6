//! Quote synchronization service.
//!
//! # Architecture
//!
//! ```text
//! QuoteSyncService
//!       │
//!       ├─► ProviderRegistry (resolve the owning provider, lookback)
//!       ├─► FallbackResolver (fetch + validate across providers)
//!       ├─► QuoteStore (priority-aware upsert)
//!       ├─► SyncStateStore (progress, backoff, degraded flag)
//!       └─► AssetRepository (asset lookups)
//! ```
//!
//! Distinct assets sync concurrently, bounded by a semaphore. Work on one
//! asset is serialized by a per-asset lock held for the whole attempt. Each
//! asset runs in its own spawned task and the caller awaits the join handles,
//! so dropping the caller never interrupts a write.

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use quotesync_market_data::{MarketDataError, ProviderRegistry};

use super::constants::{
    DEFAULT_ASSET_BUDGET_SECS, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_HISTORY_DAYS,
    DEFAULT_MAX_CONCURRENCY,
};
use super::fallback::FallbackResolver;
use super::store::QuoteStore;
use super::sync_state::{fetch_window, BackoffPolicy, SyncState, SyncStateStore};
use crate::assets::{Asset, AssetRepositoryTrait};
use crate::errors::Result;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub max_concurrency: usize,
    /// Timeout for each provider call.
    pub call_timeout: Duration,
    /// Overall fetch budget for one asset, across every provider tried.
    pub asset_budget: Duration,
    pub default_history_days: i64,
    pub backoff: BackoffPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            asset_budget: Duration::from_secs(DEFAULT_ASSET_BUDGET_SECS),
            default_history_days: DEFAULT_HISTORY_DAYS,
            backoff: BackoffPolicy::default(),
        }
    }
}

// =============================================================================
// Sync Result Types
// =============================================================================

/// Per-asset result of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Fetched and committed.
    Synced,
    /// Fetch failed and nothing is cached.
    Failed,
    /// Not attempted.
    Skipped,
    /// Fetch failed but cached quotes exist.
    Stale,
}

/// Reason why an asset was skipped during sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncSkipReason {
    /// Manual assets never receive automated quotes.
    ManualAsset,
    /// Already synced through today.
    UpToDate,
    /// Backing off after a failure.
    RetryScheduled,
    /// No enabled provider serves the asset.
    NoProvider,
    /// The request was cancelled before the asset was fetched.
    Cancelled,
    /// Requested id does not exist.
    AssetNotFound,
}

impl std::fmt::Display for SyncSkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncSkipReason::ManualAsset => write!(f, "manual asset"),
            SyncSkipReason::UpToDate => write!(f, "up to date"),
            SyncSkipReason::RetryScheduled => write!(f, "retry scheduled"),
            SyncSkipReason::NoProvider => write!(f, "no enabled provider"),
            SyncSkipReason::Cancelled => write!(f, "cancelled"),
            SyncSkipReason::AssetNotFound => write!(f, "asset not found"),
        }
    }
}

/// Report entry for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSyncReport {
    pub asset_id: String,
    pub outcome: SyncOutcome,
    pub provider_id: Option<String>,
    pub rows_written: usize,
    pub error: Option<String>,
    pub skip_reason: Option<SyncSkipReason>,
}

impl AssetSyncReport {
    fn skipped(asset_id: &str, reason: SyncSkipReason) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            outcome: SyncOutcome::Skipped,
            provider_id: None,
            rows_written: 0,
            error: None,
            skip_reason: Some(reason),
        }
    }

    fn failed(asset_id: &str, error: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            outcome: SyncOutcome::Failed,
            provider_id: None,
            rows_written: 0,
            error: Some(error.into()),
            skip_reason: None,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Drives history fetches for tracked assets. Cheap to clone; clones share
/// locks and the concurrency limit.
#[derive(Clone)]
pub struct QuoteSyncService {
    asset_repo: Arc<dyn AssetRepositoryTrait>,
    quote_store: Arc<dyn QuoteStore>,
    sync_state_store: Arc<dyn SyncStateStore>,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<FallbackResolver>,
    config: Arc<SyncConfig>,
    semaphore: Arc<Semaphore>,
    asset_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    /// Shared with rebind; syncs hold it for reading.
    sync_gate: Arc<RwLock<()>>,
}

impl QuoteSyncService {
    pub fn new(
        asset_repo: Arc<dyn AssetRepositoryTrait>,
        quote_store: Arc<dyn QuoteStore>,
        sync_state_store: Arc<dyn SyncStateStore>,
        registry: Arc<ProviderRegistry>,
        resolver: Arc<FallbackResolver>,
        config: SyncConfig,
        sync_gate: Arc<RwLock<()>>,
    ) -> Self {
        let permits = config.max_concurrency.max(1);
        Self {
            asset_repo,
            quote_store,
            sync_state_store,
            registry,
            resolver,
            config: Arc::new(config),
            semaphore: Arc::new(Semaphore::new(permits)),
            asset_locks: Arc::new(Mutex::new(HashMap::new())),
            sync_gate,
        }
    }

    /// Sync the given assets, or every tracked asset when `asset_ids` is
    /// `None`.
    ///
    /// A scheduled run (`None`) leaves assets that are backing off alone;
    /// an explicit list is a manual trigger and attempts them regardless.
    pub async fn sync(
        &self,
        asset_ids: Option<Vec<String>>,
        cancel: CancellationToken,
    ) -> Result<Vec<AssetSyncReport>> {
        let explicit = asset_ids.is_some();
        let mut reports = Vec::new();

        let assets = match asset_ids {
            Some(ids) => {
                let mut unique = HashSet::new();
                let ids: Vec<String> = ids.into_iter().filter(|id| unique.insert(id.clone())).collect();
                let found = self.asset_repo.list_by_asset_ids(&ids)?;
                let known: HashSet<&str> = found.iter().map(|a| a.id.as_str()).collect();
                for missing in ids.iter().filter(|id| !known.contains(id.as_str())) {
                    warn!("Sync requested for unknown asset {}", missing);
                    reports.push(AssetSyncReport::skipped(
                        missing,
                        SyncSkipReason::AssetNotFound,
                    ));
                }
                found
            }
            None => self.asset_repo.list()?,
        };

        debug!("Syncing {} assets", assets.len());

        let handles: Vec<_> = assets
            .into_iter()
            .map(|asset| {
                let service = self.clone();
                let cancel = cancel.clone();
                let asset_id = asset.id.clone();
                (
                    asset_id,
                    tokio::spawn(async move { service.sync_asset(asset, explicit, cancel).await }),
                )
            })
            .collect();

        let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (asset_id, joined) in ids.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Sync task for {} aborted: {}", asset_id, e);
                    reports.push(AssetSyncReport::failed(&asset_id, format!("sync task aborted: {}", e)));
                }
            }
        }

        let count = |outcome| reports.iter().filter(|r| r.outcome == outcome).count();
        info!(
            "Sync complete: {} synced, {} stale, {} failed, {} skipped",
            count(SyncOutcome::Synced),
            count(SyncOutcome::Stale),
            count(SyncOutcome::Failed),
            count(SyncOutcome::Skipped)
        );
        Ok(reports)
    }

    fn asset_lock(&self, asset_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.asset_locks.lock().unwrap_or_else(|poisoned| {
            warn!("Asset lock table was poisoned, recovering");
            poisoned.into_inner()
        });
        locks
            .entry(asset_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn sync_asset(
        &self,
        asset: Asset,
        explicit: bool,
        cancel: CancellationToken,
    ) -> AssetSyncReport {
        if asset.is_manual() {
            return AssetSyncReport::skipped(&asset.id, SyncSkipReason::ManualAsset);
        }

        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => return AssetSyncReport::failed(&asset.id, e.to_string()),
        };
        let lock = self.asset_lock(&asset.id);
        let _asset_guard = lock.lock().await;
        let _gate = self.sync_gate.read().await;

        if cancel.is_cancelled() {
            return AssetSyncReport::skipped(&asset.id, SyncSkipReason::Cancelled);
        }

        // Re-read everything under the lock; another run may have just
        // committed or a rebind may have renamed the source.
        let asset = match self.asset_repo.get_by_id(&asset.id) {
            Ok(asset) => asset,
            Err(e) => return AssetSyncReport::failed(&asset.id, e.to_string()),
        };
        let mut state = match self.sync_state_store.get_by_asset_id(&asset.id) {
            Ok(state) => state.unwrap_or_else(|| SyncState::new(&asset.id)),
            Err(e) => return AssetSyncReport::failed(&asset.id, e.to_string()),
        };

        let now = Utc::now();
        if !explicit && !state.is_due(now) {
            debug!(
                "Skipping {} until {:?}",
                asset.symbol, state.next_retry_at
            );
            return AssetSyncReport::skipped(&asset.id, SyncSkipReason::RetryScheduled);
        }

        let Some(primary) = self.registry.resolve(&asset.instrument()) else {
            debug!("No enabled provider serves {}", asset.symbol);
            return AssetSyncReport::skipped(&asset.id, SyncSkipReason::NoProvider);
        };

        let Some((start, end)) = fetch_window(
            state.last_successful_date,
            now.date_naive(),
            self.config.default_history_days,
            primary.max_lookback_days,
        ) else {
            return AssetSyncReport::skipped(&asset.id, SyncSkipReason::UpToDate);
        };

        debug!(
            "Fetching {} from {} to {} (primary {})",
            asset.symbol, start, end, primary.id
        );

        let fetched = match tokio::time::timeout(
            self.config.asset_budget,
            self.resolver.fetch_history(&asset, start, end, &cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                provider: primary.id.clone(),
            }),
        };

        let error = match fetched {
            Ok(fetch) => {
                let newest = fetch.newest_date();
                match self.quote_store.upsert_quotes(&fetch.quotes).await {
                    Ok(summary) => {
                        state.record_success(newest, now);
                        self.save_state(&state).await;
                        if summary.rejected > 0 {
                            debug!(
                                "{} rows from {} for {} kept a preferred source",
                                summary.rejected, fetch.provider_id, asset.symbol
                            );
                        }
                        return AssetSyncReport {
                            asset_id: asset.id,
                            outcome: SyncOutcome::Synced,
                            provider_id: Some(fetch.provider_id),
                            rows_written: summary.written(),
                            error: None,
                            skip_reason: None,
                        };
                    }
                    Err(e) => {
                        error!("Failed to save quotes for {}: {}", asset.symbol, e);
                        state.record_failure(e.to_string(), &self.config.backoff, None, now);
                        self.save_state(&state).await;
                        return AssetSyncReport::failed(&asset.id, format!("storage error: {}", e));
                    }
                }
            }
            Err(MarketDataError::Cancelled) => {
                return AssetSyncReport::skipped(&asset.id, SyncSkipReason::Cancelled);
            }
            Err(e) => e,
        };

        let degraded_now = state.record_failure(
            error.to_string(),
            &self.config.backoff,
            error.retry_after(),
            now,
        );
        self.save_state(&state).await;
        if degraded_now {
            warn!(
                "{} is degraded after {} consecutive failures; retries continue",
                asset.symbol, state.consecutive_failures
            );
        }

        let has_cache = match self.quote_store.latest(&asset.id) {
            Ok(cached) => cached.is_some(),
            Err(e) => {
                warn!("Failed to read cached quotes for {}: {}", asset.symbol, e);
                false
            }
        };
        AssetSyncReport {
            asset_id: asset.id,
            outcome: if has_cache {
                SyncOutcome::Stale
            } else {
                SyncOutcome::Failed
            },
            provider_id: None,
            rows_written: 0,
            error: Some(error.to_string()),
            skip_reason: None,
        }
    }

    async fn save_state(&self, state: &SyncState) {
        if let Err(e) = self.sync_state_store.upsert(state).await {
            warn!("Failed to update sync state for {}: {}", state.asset_id, e);
        }
    }
}
