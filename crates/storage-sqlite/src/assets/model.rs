//! Database model for assets.

use chrono::Utc;
use diesel::prelude::*;
use serde_json::{Map, Value};

use quotesync_core::assets::{Asset, NewAsset};
use quotesync_market_data::AssetType;

use crate::errors::StorageError;
use crate::utils::parse_timestamp;

/// Database model for assets
#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone,
)]
#[diesel(table_name = crate::schema::assets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AssetDB {
    pub id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub asset_type: String,
    pub currency: String,
    pub exchange: Option<String>,
    pub data_source: String,
    pub metadata: Option<String>, // JSON object
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<AssetDB> for Asset {
    type Error = StorageError;

    fn try_from(db: AssetDB) -> Result<Self, Self::Error> {
        let asset_type: AssetType = db
            .asset_type
            .parse()
            .map_err(|e| StorageError::SerializationError(format!("asset {}: {}", db.id, e)))?;
        let metadata = match db.metadata.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str::<Map<String, Value>>(raw)?,
            _ => Map::new(),
        };

        Ok(Self {
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            id: db.id,
            symbol: db.symbol,
            name: db.name,
            asset_type,
            currency: db.currency,
            exchange: db.exchange,
            data_source: db.data_source,
            metadata,
        })
    }
}

impl From<NewAsset> for AssetDB {
    fn from(domain: NewAsset) -> Self {
        let now = Utc::now().to_rfc3339();
        let metadata = (!domain.metadata.is_empty())
            .then(|| Value::Object(domain.metadata).to_string());

        Self {
            id: domain
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            symbol: domain.symbol,
            name: domain.name,
            asset_type: domain.asset_type.as_str().to_string(),
            currency: domain.currency,
            exchange: domain.exchange,
            data_source: domain.data_source,
            metadata,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
