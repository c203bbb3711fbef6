use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::AssetType;

/// Canonical asset metadata returned by a provider search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProfile {
    /// Symbol as it should be stored on the asset.
    pub symbol: String,
    pub name: Option<String>,
    pub asset_type: AssetType,
    /// Empty when the provider could not tell.
    pub currency: String,
    pub exchange: Option<String>,
    /// Provider id that answered the search.
    pub data_source: String,
    /// Type-specific fields (industry, fund type, management company...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Relevance score (higher is better).
    #[serde(default)]
    pub score: f64,
}

impl AssetProfile {
    pub fn new(
        symbol: impl Into<String>,
        asset_type: AssetType,
        currency: impl Into<String>,
        data_source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            asset_type,
            currency: currency.into(),
            exchange: None,
            data_source: data_source.into(),
            metadata: Map::new(),
            score: 0.0,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn with_exchange(mut self, exchange: Option<String>) -> Self {
        self.exchange = exchange.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Add a metadata entry; `None` values are dropped.
    pub fn with_meta(mut self, key: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), value.into());
        }
        self
    }
}
