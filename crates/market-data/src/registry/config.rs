//! Persisted provider settings and the factory that turns them into adapters.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::models::ProviderKind;
use crate::provider::manual::ManualProvider;
use crate::provider::vn_market::VnMarketProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::{Capability, CapabilitySet, MarketDataProvider};

/// Default per-request timeout for HTTP adapters.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One configured provider, as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    /// Lower is preferred.
    pub priority: i32,
    pub endpoint: Option<String>,
    pub enabled: bool,
    pub capabilities: Vec<Capability>,
    /// How far back the provider serves history, in days.
    pub max_lookback_days: Option<i64>,
    pub requests_per_minute: Option<u32>,
}

/// Builds adapters from settings. Swappable so tests can inject scripted
/// providers.
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        config: &ProviderConfig,
        capabilities: CapabilitySet,
    ) -> Result<Arc<dyn MarketDataProvider>, MarketDataError>;
}

/// Factory for the adapters shipped with this crate, keyed on `kind`.
pub struct DefaultProviderFactory {
    request_timeout: Duration,
}

impl DefaultProviderFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for DefaultProviderFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn build(
        &self,
        config: &ProviderConfig,
        capabilities: CapabilitySet,
    ) -> Result<Arc<dyn MarketDataProvider>, MarketDataError> {
        let provider: Arc<dyn MarketDataProvider> = match config.kind {
            ProviderKind::VnMarket => Arc::new(VnMarketProvider::new(
                config.id.clone(),
                config.endpoint.as_deref(),
                capabilities,
                self.request_timeout,
            )?),
            ProviderKind::Yahoo => Arc::new(YahooProvider::new(config.id.clone(), capabilities)?),
            ProviderKind::Manual => Arc::new(ManualProvider::new(config.id.clone(), capabilities)),
        };
        Ok(provider)
    }
}
