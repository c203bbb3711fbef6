//! Quote storage traits.
//!
//! These traits abstract the persistence layer. The SQLite implementation
//! lives in the `storage-sqlite` crate; tests use in-memory mocks.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use super::model::{Quote, UpsertSummary};
use super::provider_settings::{MarketDataProviderSetting, UpdateMarketDataProviderSetting};
use crate::errors::Result;

// =============================================================================
// Quote Store
// =============================================================================

/// Storage interface for quote data.
///
/// Reads see the last committed snapshot and never wait on writers.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Upserts a batch in one transaction.
    ///
    /// Each row is inserted, replaced, left unchanged or rejected according
    /// to [`decide_upsert`](super::model::decide_upsert), with provider
    /// priorities read inside the same transaction.
    async fn upsert_quotes(&self, quotes: &[Quote]) -> Result<UpsertSummary>;

    /// Most recent quote for an asset.
    fn latest(&self, asset_id: &str) -> Result<Option<Quote>>;

    /// Quotes in `[start, end]`, ascending by date.
    fn range(&self, asset_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Quote>>;

    /// Latest quote per asset. Assets without quotes are omitted.
    fn latest_for_assets(&self, asset_ids: &[String]) -> Result<HashMap<String, Quote>>;
}

// =============================================================================
// Provider Settings Store
// =============================================================================

/// Storage interface for market data provider settings.
#[async_trait]
pub trait ProviderSettingsStore: Send + Sync {
    /// All configured providers, ordered by `(priority, id)`.
    fn get_all_providers(&self) -> Result<Vec<MarketDataProviderSetting>>;

    fn get_provider(&self, id: &str) -> Result<MarketDataProviderSetting>;

    async fn update_provider(
        &self,
        id: &str,
        changes: UpdateMarketDataProviderSetting,
    ) -> Result<MarketDataProviderSetting>;
}
