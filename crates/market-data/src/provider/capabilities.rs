//! Provider capability table.
//!
//! A provider declares which `(asset_type, symbol_pattern)` pairs it serves.
//! The registry matches assets against this table to pick adapters.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::models::AssetType;

/// One persisted capability entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub asset_type: AssetType,
    /// Regular expression matched against the asset's symbol.
    pub symbol_pattern: String,
}

impl Capability {
    pub fn new(asset_type: AssetType, symbol_pattern: impl Into<String>) -> Self {
        Self {
            asset_type,
            symbol_pattern: symbol_pattern.into(),
        }
    }
}

/// Compiled capability table.
#[derive(Clone, Debug, Default)]
pub struct CapabilitySet {
    entries: Vec<(Capability, Regex)>,
}

impl CapabilitySet {
    /// Compile persisted entries. An invalid pattern is a configuration error.
    pub fn compile(capabilities: &[Capability]) -> Result<Self, MarketDataError> {
        let entries = capabilities
            .iter()
            .map(|cap| {
                Regex::new(&cap.symbol_pattern)
                    .map(|re| (cap.clone(), re))
                    .map_err(|e| {
                        MarketDataError::InvalidConfiguration(format!(
                            "invalid symbol pattern '{}' for {}: {}",
                            cap.symbol_pattern, cap.asset_type, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// True if any entry covers the asset type, regardless of symbol.
    pub fn supports_type(&self, asset_type: AssetType) -> bool {
        self.entries.iter().any(|(cap, _)| cap.asset_type == asset_type)
    }

    /// True if an entry for the asset type matches the symbol.
    pub fn matches(&self, asset_type: AssetType, symbol: &str) -> bool {
        self.entries
            .iter()
            .any(|(cap, re)| cap.asset_type == asset_type && re.is_match(symbol))
    }

    /// Distinct asset types, in declaration order.
    pub fn asset_types(&self) -> Vec<AssetType> {
        let mut types = Vec::new();
        for (cap, _) in &self.entries {
            if !types.contains(&cap.asset_type) {
                types.push(cap.asset_type);
            }
        }
        types
    }

    pub fn entries(&self) -> impl Iterator<Item = &Capability> {
        self.entries.iter().map(|(cap, _)| cap)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
