//! Unified Quote Service.
//!
//! Entry point for the surrounding application:
//! - Sync operations (via QuoteSyncService)
//! - Symbol search across providers
//! - Latest/history reads with stale fallback
//! - Provider settings management with hot reload
//! - Provider rebind

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use quotesync_market_data::{AssetProfile, ProviderRegistry};

use super::fallback::FallbackResolver;
use super::model::{Quote, QuoteOutcome, UpsertSummary};
use super::provider_settings::{MarketDataProviderSetting, UpdateMarketDataProviderSetting};
use super::rebind::{ProviderRebindStore, RebindManager, RebindSummary};
use super::store::{ProviderSettingsStore, QuoteStore};
use super::sync::{AssetSyncReport, QuoteSyncService, SyncConfig};
use super::sync_state::{SyncState, SyncStateStore};
use crate::assets::AssetRepositoryTrait;
use crate::errors::{Error, Result, ValidationError};

/// Unified trait for all quote operations.
#[async_trait]
pub trait QuoteServiceTrait: Send + Sync {
    // =========================================================================
    // Sync
    // =========================================================================

    /// Sync the given assets, or every tracked asset on `None`.
    async fn sync_market_data(&self, asset_ids: Option<Vec<String>>)
        -> Result<Vec<AssetSyncReport>>;

    /// Same as [`sync_market_data`](Self::sync_market_data) with a caller
    /// supplied cancellation token.
    async fn sync_market_data_with_cancel(
        &self,
        asset_ids: Option<Vec<String>>,
        cancel: CancellationToken,
    ) -> Result<Vec<AssetSyncReport>>;

    fn sync_state(&self, asset_id: &str) -> Result<Option<SyncState>>;

    fn sync_states(&self) -> Result<Vec<SyncState>>;

    // =========================================================================
    // Quotes
    // =========================================================================

    /// Live quote from a provider, or the newest stored row flagged stale.
    async fn latest_quote(&self, asset_id: &str) -> Result<QuoteOutcome>;

    /// Stored quotes in `[start, end]`, ascending.
    fn quote_history(&self, asset_id: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Quote>>;

    /// Newest stored quote per asset.
    fn latest_stored_quotes(&self, asset_ids: &[String]) -> Result<HashMap<String, Quote>>;

    /// Store a user-entered price for a manual asset.
    async fn record_manual_quote(
        &self,
        asset_id: &str,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<UpsertSummary>;

    // =========================================================================
    // Providers
    // =========================================================================

    /// Search every enabled provider, deduplicated by symbol.
    async fn search_symbol(&self, query: &str) -> Result<Vec<AssetProfile>>;

    fn list_providers(&self) -> Result<Vec<MarketDataProviderSetting>>;

    /// Persist a settings change and reload the registry.
    async fn update_provider(
        &self,
        provider_id: &str,
        changes: UpdateMarketDataProviderSetting,
    ) -> Result<MarketDataProviderSetting>;

    /// Rename a provider id across settings, assets and quotes.
    async fn rebind_provider(&self, old_id: &str, new_id: &str) -> Result<RebindSummary>;

    /// Reload the registry from persisted settings.
    fn reload_providers(&self) -> Result<()>;
}

/// Unified quote service implementation.
pub struct QuoteService {
    asset_repo: Arc<dyn AssetRepositoryTrait>,
    quote_store: Arc<dyn QuoteStore>,
    sync_state_store: Arc<dyn SyncStateStore>,
    provider_settings_store: Arc<dyn ProviderSettingsStore>,
    registry: Arc<ProviderRegistry>,
    resolver: Arc<FallbackResolver>,
    sync_service: QuoteSyncService,
    rebind_manager: RebindManager,
    /// Shared with sync and rebind; writers of provider references hold it
    /// for reading, rebind holds it exclusively.
    sync_gate: Arc<RwLock<()>>,
}

impl QuoteService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asset_repo: Arc<dyn AssetRepositoryTrait>,
        quote_store: Arc<dyn QuoteStore>,
        sync_state_store: Arc<dyn SyncStateStore>,
        provider_settings_store: Arc<dyn ProviderSettingsStore>,
        rebind_store: Arc<dyn ProviderRebindStore>,
        registry: Arc<ProviderRegistry>,
        config: SyncConfig,
    ) -> Self {
        let resolver = Arc::new(FallbackResolver::new(
            registry.clone(),
            quote_store.clone(),
            config.call_timeout,
        ));
        let sync_gate = Arc::new(RwLock::new(()));
        let sync_service = QuoteSyncService::new(
            asset_repo.clone(),
            quote_store.clone(),
            sync_state_store.clone(),
            registry.clone(),
            resolver.clone(),
            config,
            sync_gate.clone(),
        );
        let rebind_manager = RebindManager::new(
            rebind_store,
            provider_settings_store.clone(),
            registry.clone(),
            sync_gate.clone(),
        );

        Self {
            asset_repo,
            quote_store,
            sync_state_store,
            provider_settings_store,
            registry,
            resolver,
            sync_service,
            rebind_manager,
            sync_gate,
        }
    }

    /// Gate to hand to other services that write provider ids.
    pub fn sync_gate(&self) -> Arc<RwLock<()>> {
        self.sync_gate.clone()
    }
}

#[async_trait]
impl QuoteServiceTrait for QuoteService {
    async fn sync_market_data(
        &self,
        asset_ids: Option<Vec<String>>,
    ) -> Result<Vec<AssetSyncReport>> {
        self.sync_market_data_with_cancel(asset_ids, CancellationToken::new())
            .await
    }

    async fn sync_market_data_with_cancel(
        &self,
        asset_ids: Option<Vec<String>>,
        cancel: CancellationToken,
    ) -> Result<Vec<AssetSyncReport>> {
        self.sync_service.sync(asset_ids, cancel).await
    }

    fn sync_state(&self, asset_id: &str) -> Result<Option<SyncState>> {
        self.sync_state_store.get_by_asset_id(asset_id)
    }

    fn sync_states(&self) -> Result<Vec<SyncState>> {
        self.sync_state_store.get_all()
    }

    async fn latest_quote(&self, asset_id: &str) -> Result<QuoteOutcome> {
        let asset = self.asset_repo.get_by_id(asset_id)?;
        self.resolver
            .latest_quote(&asset, &CancellationToken::new())
            .await
    }

    fn quote_history(
        &self,
        asset_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Quote>> {
        if start > end {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "start {} is after end {}",
                start, end
            ))));
        }
        self.quote_store.range(asset_id, start, end)
    }

    fn latest_stored_quotes(&self, asset_ids: &[String]) -> Result<HashMap<String, Quote>> {
        self.quote_store.latest_for_assets(asset_ids)
    }

    async fn record_manual_quote(
        &self,
        asset_id: &str,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<UpsertSummary> {
        // The asset's data source is read and written under the gate so a
        // rebind cannot rename it in between.
        let _gate = self.sync_gate.read().await;
        let asset = self.asset_repo.get_by_id(asset_id)?;
        if !asset.is_manual() {
            return Err(Error::Asset(format!(
                "{} is priced by {}; manual quotes are only accepted for MANUAL assets",
                asset.symbol, asset.data_source
            )));
        }
        if price.is_sign_negative() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "price cannot be negative".to_string(),
            )));
        }
        if date > Utc::now().date_naive() {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "{} is in the future",
                date
            ))));
        }

        let quote = Quote::single_value(&asset.id, date, price, &asset.currency, &asset.data_source);
        self.quote_store.upsert_quotes(&[quote]).await
    }

    async fn search_symbol(&self, query: &str) -> Result<Vec<AssetProfile>> {
        let results = self.registry.search(query).await;
        debug!("Search '{}' returned {} results", query, results.len());
        Ok(results)
    }

    fn list_providers(&self) -> Result<Vec<MarketDataProviderSetting>> {
        self.provider_settings_store.get_all_providers()
    }

    async fn update_provider(
        &self,
        provider_id: &str,
        changes: UpdateMarketDataProviderSetting,
    ) -> Result<MarketDataProviderSetting> {
        changes.validate()?;
        let updated = self
            .provider_settings_store
            .update_provider(provider_id, changes)
            .await?;
        self.reload_providers()?;
        info!(
            "Provider {} updated (priority {}, enabled {})",
            updated.id, updated.priority, updated.enabled
        );
        Ok(updated)
    }

    async fn rebind_provider(&self, old_id: &str, new_id: &str) -> Result<RebindSummary> {
        self.rebind_manager.rebind(old_id, new_id).await
    }

    fn reload_providers(&self) -> Result<()> {
        let settings = self.provider_settings_store.get_all_providers()?;
        self.registry.reload(&settings)?;
        Ok(())
    }
}
