//! Database models for market data (quotes, providers, sync state).

use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use quotesync_core::quotes::{MarketDataProviderSetting, Quote, SyncState};
use quotesync_market_data::{Capability, ProviderKind};

use crate::errors::StorageError;
use crate::utils::{format_day, parse_day, parse_timestamp};

/// Database model for quotes
#[derive(
    Queryable, QueryableByName, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq,
)]
#[diesel(table_name = crate::schema::quotes)]
#[diesel(primary_key(asset_id, day))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuoteDB {
    pub asset_id: String,
    pub day: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub adjclose: String,
    pub volume: String,
    pub currency: String,
    pub data_source: String,
}

/// Database model for market data provider settings
#[derive(
    Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq,
)]
#[diesel(table_name = crate::schema::market_data_providers)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketDataProviderSettingDB {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub priority: i32,
    pub endpoint: Option<String>,
    pub enabled: bool,
    pub capabilities: String, // JSON array of {assetType, symbolPattern}
    pub max_lookback_days: Option<i64>,
    pub requests_per_minute: Option<i32>,
}

/// Database model for quote sync state
#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::quote_sync_state)]
#[diesel(primary_key(asset_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuoteSyncStateDB {
    pub asset_id: String,
    pub last_successful_date: Option<String>,
    pub consecutive_failures: i32,
    pub next_retry_at: Option<String>,
    pub degraded: bool,
    pub last_attempt_at: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: String,
}

// Conversion implementations

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value)
        .map_err(|e| StorageError::SerializationError(format!("bad {} '{}': {}", field, value, e)))
}

impl TryFrom<QuoteDB> for Quote {
    type Error = StorageError;

    fn try_from(db: QuoteDB) -> Result<Self, Self::Error> {
        Ok(Quote {
            date: parse_day(&db.day)?,
            open: parse_decimal("open", &db.open)?,
            high: parse_decimal("high", &db.high)?,
            low: parse_decimal("low", &db.low)?,
            close: parse_decimal("close", &db.close)?,
            adjclose: parse_decimal("adjclose", &db.adjclose)?,
            volume: parse_decimal("volume", &db.volume)?,
            asset_id: db.asset_id,
            currency: db.currency,
            data_source: db.data_source,
        })
    }
}

impl From<&Quote> for QuoteDB {
    fn from(quote: &Quote) -> Self {
        QuoteDB {
            asset_id: quote.asset_id.clone(),
            day: format_day(quote.date),
            open: quote.open.to_string(),
            high: quote.high.to_string(),
            low: quote.low.to_string(),
            close: quote.close.to_string(),
            adjclose: quote.adjclose.to_string(),
            volume: quote.volume.to_string(),
            currency: quote.currency.clone(),
            data_source: quote.data_source.clone(),
        }
    }
}

impl TryFrom<MarketDataProviderSettingDB> for MarketDataProviderSetting {
    type Error = StorageError;

    fn try_from(db: MarketDataProviderSettingDB) -> Result<Self, Self::Error> {
        let kind: ProviderKind = db
            .kind
            .parse()
            .map_err(|e| StorageError::SerializationError(format!("provider {}: {}", db.id, e)))?;
        let capabilities: Vec<Capability> = serde_json::from_str(&db.capabilities)?;

        Ok(Self {
            id: db.id,
            name: db.name,
            kind,
            priority: db.priority,
            endpoint: db.endpoint,
            enabled: db.enabled,
            capabilities,
            max_lookback_days: db.max_lookback_days,
            requests_per_minute: db
                .requests_per_minute
                .and_then(|rpm| u32::try_from(rpm).ok()),
        })
    }
}

impl TryFrom<&MarketDataProviderSetting> for MarketDataProviderSettingDB {
    type Error = StorageError;

    fn try_from(setting: &MarketDataProviderSetting) -> Result<Self, Self::Error> {
        Ok(Self {
            id: setting.id.clone(),
            name: setting.name.clone(),
            kind: setting.kind.as_str().to_string(),
            priority: setting.priority,
            endpoint: setting.endpoint.clone(),
            enabled: setting.enabled,
            capabilities: serde_json::to_string(&setting.capabilities)?,
            max_lookback_days: setting.max_lookback_days,
            requests_per_minute: setting
                .requests_per_minute
                .map(|rpm| i32::try_from(rpm).unwrap_or(i32::MAX)),
        })
    }
}

impl TryFrom<QuoteSyncStateDB> for SyncState {
    type Error = StorageError;

    fn try_from(db: QuoteSyncStateDB) -> Result<Self, Self::Error> {
        Ok(SyncState {
            last_successful_date: db.last_successful_date.as_deref().map(parse_day).transpose()?,
            next_retry_at: db.next_retry_at.as_deref().map(parse_timestamp).transpose()?,
            last_attempt_at: db.last_attempt_at.as_deref().map(parse_timestamp).transpose()?,
            updated_at: parse_timestamp(&db.updated_at)?,
            asset_id: db.asset_id,
            consecutive_failures: db.consecutive_failures,
            degraded: db.degraded,
            last_error: db.last_error,
        })
    }
}

impl From<&SyncState> for QuoteSyncStateDB {
    fn from(state: &SyncState) -> Self {
        QuoteSyncStateDB {
            asset_id: state.asset_id.clone(),
            last_successful_date: state.last_successful_date.map(format_day),
            consecutive_failures: state.consecutive_failures,
            next_retry_at: state.next_retry_at.map(|t| t.to_rfc3339()),
            degraded: state.degraded,
            last_attempt_at: state.last_attempt_at.map(|t| t.to_rfc3339()),
            last_error: state.last_error.clone(),
            updated_at: state.updated_at.to_rfc3339(),
        }
    }
}
