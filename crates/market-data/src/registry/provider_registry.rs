//! Provider registry.
//!
//! Holds the enabled adapters built from persisted settings, ordered by
//! `(priority, id)`. The whole set is swapped atomically on reload, and
//! callers receive cloned handles, so a reload never disturbs a fetch that is
//! already running.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};

use super::config::{ProviderConfig, ProviderFactory, DEFAULT_REQUEST_TIMEOUT};
use super::rate_limiter::{RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};
use crate::errors::MarketDataError;
use crate::models::{AssetProfile, AssetType, InstrumentRef, ProviderKind};
use crate::provider::vn_market::VN_INDICES;
use crate::provider::{CapabilitySet, MarketDataProvider};

/// Maximum number of search results returned.
pub const MAX_SEARCH_RESULTS: usize = 10;

/// A provider picked for a request. Cheap to clone.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub id: String,
    pub kind: ProviderKind,
    pub priority: i32,
    pub max_lookback_days: Option<i64>,
    pub adapter: Arc<dyn MarketDataProvider>,
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("max_lookback_days", &self.max_lookback_days)
            .finish()
    }
}

#[derive(Default)]
struct Snapshot {
    /// Enabled providers, sorted by `(priority, id)`.
    enabled: Vec<ResolvedProvider>,
    /// Priority of every configured provider, enabled or not.
    priorities: HashMap<String, i32>,
}

/// Provider registry for resolution and failover ordering.
pub struct ProviderRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
    factory: Arc<dyn ProviderFactory>,
    rate_limiter: RateLimiter,
    /// Upper bound on a single provider call made by the registry itself.
    call_timeout: Duration,
}

impl ProviderRegistry {
    /// Empty registry; call [`reload`](Self::reload) to populate.
    pub fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            factory,
            rate_limiter: RateLimiter::new(),
            call_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn from_configs(
        factory: Arc<dyn ProviderFactory>,
        configs: &[ProviderConfig],
    ) -> Result<Self, MarketDataError> {
        let registry = Self::new(factory);
        registry.reload(configs)?;
        Ok(registry)
    }

    /// Rebuild from settings. On error the previous set stays active.
    pub fn reload(&self, configs: &[ProviderConfig]) -> Result<(), MarketDataError> {
        let mut enabled = Vec::new();
        let mut priorities = HashMap::new();

        for config in configs {
            priorities.insert(config.id.clone(), config.priority);
            if !config.enabled {
                continue;
            }
            let capabilities = CapabilitySet::compile(&config.capabilities)?;
            let adapter = self.factory.build(config, capabilities)?;
            enabled.push(ResolvedProvider {
                id: config.id.clone(),
                kind: config.kind,
                priority: config.priority,
                max_lookback_days: config.max_lookback_days,
                adapter,
            });
        }
        enabled.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        for config in configs {
            self.rate_limiter.configure(
                &config.id,
                config.requests_per_minute.unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            );
        }

        info!(
            "Provider registry loaded: [{}]",
            enabled
                .iter()
                .map(|p| format!("{}({})", p.id, p.priority))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let next = Arc::new(Snapshot {
            enabled,
            priorities,
        });
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        });
        *guard = next;
        Ok(())
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        });
        Arc::clone(&guard)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Pick the provider that owns an instrument.
    ///
    /// An explicit `data_source` wins when that provider is enabled and serves
    /// the asset type. Otherwise the enabled provider with the lowest priority
    /// whose capability table matches type and symbol is chosen, ties broken
    /// by id.
    pub fn resolve(&self, instrument: &InstrumentRef<'_>) -> Option<ResolvedProvider> {
        let snapshot = self.snapshot();
        Self::resolve_in(&snapshot, instrument).cloned()
    }

    fn resolve_in<'s>(
        snapshot: &'s Snapshot,
        instrument: &InstrumentRef<'_>,
    ) -> Option<&'s ResolvedProvider> {
        if let Some(assigned) = instrument.data_source {
            let explicit = snapshot.enabled.iter().find(|p| {
                p.id == assigned && p.adapter.capabilities().supports_type(instrument.asset_type)
            });
            if explicit.is_some() {
                return explicit;
            }
            debug!(
                "Assigned provider {} unavailable for {}, falling back to capability match",
                assigned, instrument.symbol
            );
        }

        snapshot.enabled.iter().find(|p| {
            p.adapter
                .capabilities()
                .matches(instrument.asset_type, instrument.symbol)
        })
    }

    /// Failover order: the resolved provider first, then every other enabled
    /// provider whose capabilities match, by `(priority, id)`.
    pub fn candidates(&self, instrument: &InstrumentRef<'_>) -> Vec<ResolvedProvider> {
        let snapshot = self.snapshot();
        let Some(primary) = Self::resolve_in(&snapshot, instrument) else {
            return Vec::new();
        };

        let mut ordered = vec![primary.clone()];
        ordered.extend(
            snapshot
                .enabled
                .iter()
                .filter(|p| p.id != primary.id)
                .filter(|p| {
                    p.adapter
                        .capabilities()
                        .matches(instrument.asset_type, instrument.symbol)
                })
                .cloned(),
        );
        ordered
    }

    /// Enabled provider by id.
    pub fn get(&self, id: &str) -> Option<ResolvedProvider> {
        self.snapshot().enabled.iter().find(|p| p.id == id).cloned()
    }

    /// Enabled providers in preference order.
    pub fn enabled_providers(&self) -> Vec<ResolvedProvider> {
        self.snapshot().enabled.clone()
    }

    /// Configured priority of any provider (enabled or not).
    pub fn priority_of(&self, id: &str) -> Option<i32> {
        self.snapshot().priorities.get(id).copied()
    }

    /// Check that assigning `provider_id` to an asset keeps the data-source
    /// invariant: the provider exists, is enabled, and serves the type.
    pub fn check_assignment(
        &self,
        provider_id: &str,
        asset_type: AssetType,
    ) -> Result<(), MarketDataError> {
        let provider = self.get(provider_id).ok_or_else(|| {
            MarketDataError::InvalidConfiguration(format!(
                "provider {} is unknown or disabled",
                provider_id
            ))
        })?;
        if !provider.adapter.capabilities().supports_type(asset_type) {
            return Err(MarketDataError::InvalidConfiguration(format!(
                "provider {} does not serve {} assets",
                provider_id, asset_type
            )));
        }
        Ok(())
    }

    /// Wait for the provider's rate limiter.
    pub async fn throttle(&self, provider_id: &str) {
        self.rate_limiter.acquire(provider_id).await;
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Search every enabled provider and merge the results.
    ///
    /// Results are deduplicated by symbol keeping the most-preferred
    /// provider's entry, ranked by score, with regional results first when
    /// the query is clearly regional, and capped at [`MAX_SEARCH_RESULTS`].
    /// A provider that does not answer within the call timeout is skipped.
    pub async fn search(&self, query: &str) -> Vec<AssetProfile> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let providers = self.enabled_providers();

        let responses = join_all(providers.iter().map(|provider| async move {
            self.throttle(&provider.id).await;
            let response = tokio::time::timeout(self.call_timeout, provider.adapter.search(query))
                .await
                .unwrap_or_else(|_| {
                    Err(MarketDataError::Timeout {
                        provider: provider.id.clone(),
                    })
                });
            (provider, response)
        }))
        .await;

        let mut seen = HashSet::new();
        let mut merged: Vec<(ProviderKind, AssetProfile)> = Vec::new();
        for (provider, response) in responses {
            match response {
                Ok(profiles) => {
                    for profile in profiles {
                        if seen.insert(profile.symbol.to_ascii_uppercase()) {
                            merged.push((provider.kind, profile));
                        }
                    }
                }
                Err(e) if e.is_permanent() => {
                    debug!("{} has no match for '{}': {}", provider.id, query, e)
                }
                Err(e) => warn!("Search on {} failed for '{}': {}", provider.id, query, e),
            }
        }

        merged.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
        if is_regional_query(query) {
            merged.sort_by_key(|(kind, _)| *kind != ProviderKind::VnMarket);
        }

        merged
            .into_iter()
            .map(|(_, profile)| profile)
            .take(MAX_SEARCH_RESULTS)
            .collect()
    }
}

fn is_regional_query(query: &str) -> bool {
    let upper = query.to_ascii_uppercase();
    upper.ends_with(".VN") || VN_INDICES.contains(&upper.as_str())
}
