//! Asset domain models.

use chrono::{DateTime, Utc};
use quotesync_market_data::{AssetProfile, AssetType, InstrumentRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result, ValidationError};

/// A tracked instrument.
///
/// `data_source` names the provider that owns the asset. It changes only
/// through an explicit reassignment or a provider rebind, never during sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub asset_type: AssetType,
    pub currency: String,
    pub exchange: Option<String>,
    pub data_source: String,
    /// Type-specific fields returned by search (fund type, industry...).
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// What providers are asked about for this asset.
    pub fn instrument(&self) -> InstrumentRef<'_> {
        InstrumentRef::new(&self.symbol, self.asset_type, &self.currency)
            .with_data_source(Some(&self.data_source))
    }

    pub fn is_manual(&self) -> bool {
        self.asset_type == AssetType::Manual
    }
}

/// Input model for creating a new asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub id: Option<String>,
    pub symbol: String,
    pub name: Option<String>,
    pub asset_type: AssetType,
    pub currency: String,
    pub exchange: Option<String>,
    pub data_source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewAsset {
    /// Validates the new asset data
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "symbol".to_string(),
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Currency cannot be empty".to_string(),
            )));
        }
        if self.data_source.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "data_source".to_string(),
            )));
        }
        Ok(())
    }

    /// Builds an asset from a search hit, owned by the provider that found it.
    pub fn from_profile(profile: &AssetProfile) -> Self {
        Self {
            id: None,
            symbol: profile.symbol.trim().to_uppercase(),
            name: profile.name.clone(),
            asset_type: profile.asset_type,
            currency: profile.currency.clone(),
            exchange: profile.exchange.clone(),
            data_source: profile.data_source.clone(),
            metadata: profile.metadata.clone(),
        }
    }
}

/// Input for a user-maintained asset that no provider quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewManualAsset {
    pub symbol: String,
    pub name: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
