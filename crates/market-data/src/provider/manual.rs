//! Placeholder provider for user-maintained assets.
//!
//! Manual assets need a provider to satisfy the data-source invariant, but
//! they are never fetched. Every operation is refused as unsupported.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{AssetProfile, InstrumentRef, ProviderKind, Quote};
use crate::provider::{CapabilitySet, MarketDataProvider};

pub struct ManualProvider {
    id: String,
    capabilities: CapabilitySet,
}

impl ManualProvider {
    pub fn new(id: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            id: id.into(),
            capabilities,
        }
    }
}

#[async_trait]
impl MarketDataProvider for ManualProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Manual
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn search(&self, _query: &str) -> Result<Vec<AssetProfile>, MarketDataError> {
        Err(MarketDataError::not_supported(&self.id, "search"))
    }

    async fn latest_quote(&self, _instrument: &InstrumentRef<'_>) -> Result<Quote, MarketDataError> {
        Err(MarketDataError::not_supported(&self.id, "quote"))
    }

    async fn historical_quotes(
        &self,
        _instrument: &InstrumentRef<'_>,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Quote>, MarketDataError> {
        Err(MarketDataError::not_supported(&self.id, "history"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetType;

    #[tokio::test]
    async fn test_manual_provider_refuses_everything() {
        let provider = ManualProvider::new("MANUAL", CapabilitySet::default());
        let instrument = InstrumentRef::new("HOUSE", AssetType::Manual, "VND");

        let err = provider.latest_quote(&instrument).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(provider.search("HOUSE").await.is_err());
    }
}
