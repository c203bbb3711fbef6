//! Market data provider trait definitions.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{AssetProfile, InstrumentRef, ProviderKind, Quote};

use super::capabilities::CapabilitySet;

/// Trait for market data adapters.
///
/// One implementation per external source. Adapters are constructed from
/// persisted provider settings, so their id and capability table are runtime
/// values rather than constants.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotesync_market_data::provider::{CapabilitySet, MarketDataProvider};
///
/// struct MyProvider {
///     id: String,
///     capabilities: CapabilitySet,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::Yahoo
///     }
///
///     fn capabilities(&self) -> &CapabilitySet {
///         &self.capabilities
///     }
///
///     // ... implement search/quote/history
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider id as persisted (e.g. "VN_MARKET"). Stamped on every quote.
    fn id(&self) -> &str;

    /// Adapter implementation behind this provider.
    fn kind(&self) -> ProviderKind;

    /// Asset types and symbol patterns this provider serves.
    fn capabilities(&self) -> &CapabilitySet;

    /// Resolve a query to canonical asset metadata.
    ///
    /// Returns `NotFound` when the provider has no match.
    async fn search(&self, query: &str) -> Result<Vec<AssetProfile>, MarketDataError>;

    /// Latest available point for an instrument.
    async fn latest_quote(&self, instrument: &InstrumentRef<'_>) -> Result<Quote, MarketDataError>;

    /// Daily quotes for `[start, end]`, ascending by date with no duplicates.
    ///
    /// Gaps (non-trading days) are permitted.
    async fn historical_quotes(
        &self,
        instrument: &InstrumentRef<'_>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Quote>, MarketDataError>;
}
