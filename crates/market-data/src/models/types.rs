use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Classification of a tracked asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Equity,
    Fund,
    Index,
    Forex,
    Crypto,
    /// User-maintained prices; never fetched.
    Manual,
}

impl AssetType {
    pub const ALL: [AssetType; 6] = [
        AssetType::Equity,
        AssetType::Fund,
        AssetType::Index,
        AssetType::Forex,
        AssetType::Crypto,
        AssetType::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Equity => "EQUITY",
            AssetType::Fund => "FUND",
            AssetType::Index => "INDEX",
            AssetType::Forex => "FOREX",
            AssetType::Crypto => "CRYPTO",
            AssetType::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MarketDataError::InvalidConfiguration(format!("unknown asset type '{}'", s)))
    }
}

/// Which adapter implementation backs a configured provider.
///
/// Provider ids can be rebound over time, so adapters are selected by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    VnMarket,
    Yahoo,
    Manual,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::VnMarket => "VN_MARKET",
            ProviderKind::Yahoo => "YAHOO",
            ProviderKind::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VN_MARKET" => Ok(ProviderKind::VnMarket),
            "YAHOO" => Ok(ProviderKind::Yahoo),
            "MANUAL" => Ok(ProviderKind::Manual),
            other => Err(MarketDataError::InvalidConfiguration(format!(
                "unknown provider kind '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_round_trips_through_str() {
        for t in AssetType::ALL {
            assert_eq!(t.as_str().parse::<AssetType>().unwrap(), t);
        }
        assert_eq!("fund".parse::<AssetType>().unwrap(), AssetType::Fund);
        assert!("BOND".parse::<AssetType>().is_err());
    }

    #[test]
    fn test_asset_type_serde_uses_screaming_case() {
        let json = serde_json::to_string(&AssetType::Fund).unwrap();
        assert_eq!(json, "\"FUND\"");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("vn_market".parse::<ProviderKind>().unwrap(), ProviderKind::VnMarket);
        assert!("FINNHUB".parse::<ProviderKind>().is_err());
    }
}
