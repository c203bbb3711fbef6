//! Provider settings models and types.
//!
//! Settings are persisted and feed the provider registry. Changing them
//! reloads the registry without a restart.

use serde::{Deserialize, Serialize};

use quotesync_market_data::{Capability, CapabilitySet};

use crate::errors::{Error, Result, ValidationError};

/// Domain model for market data provider settings.
pub type MarketDataProviderSetting = quotesync_market_data::ProviderConfig;

/// Update model for market data provider settings. `None` leaves a field as is.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMarketDataProviderSetting {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub capabilities: Option<Vec<Capability>>,
    pub requests_per_minute: Option<u32>,
}

impl UpdateMarketDataProviderSetting {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::Validation(ValidationError::InvalidInput(
                    "Provider name cannot be empty".to_string(),
                )));
            }
        }
        if self.requests_per_minute == Some(0) {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "requests_per_minute must be positive".to_string(),
            )));
        }
        if let Some(capabilities) = &self.capabilities {
            CapabilitySet::compile(capabilities)?;
        }
        Ok(())
    }

    /// Apply the changes to a setting.
    pub fn apply_to(&self, setting: &mut MarketDataProviderSetting) {
        if let Some(name) = &self.name {
            setting.name = name.trim().to_string();
        }
        if let Some(priority) = self.priority {
            setting.priority = priority;
        }
        if let Some(enabled) = self.enabled {
            setting.enabled = enabled;
        }
        if let Some(endpoint) = &self.endpoint {
            let endpoint = endpoint.trim();
            setting.endpoint = (!endpoint.is_empty()).then(|| endpoint.to_string());
        }
        if let Some(capabilities) = &self.capabilities {
            setting.capabilities = capabilities.clone();
        }
        if let Some(rpm) = self.requests_per_minute {
            setting.requests_per_minute = Some(rpm);
        }
    }
}
