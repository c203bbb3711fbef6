use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use quotesync_core::assets::{Asset, AssetRepositoryTrait, NewAsset};
use quotesync_core::Result;
use quotesync_market_data::AssetType;

use super::model::AssetDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::assets;
use crate::utils::chunk_for_sqlite;

/// Repository for managing asset data in the database
pub struct AssetRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl AssetRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

fn to_domain(rows: Vec<AssetDB>) -> Result<Vec<Asset>> {
    rows.into_iter()
        .map(|row| Asset::try_from(row).into_core())
        .collect()
}

#[async_trait]
impl AssetRepositoryTrait for AssetRepository {
    async fn create(&self, new_asset: NewAsset) -> Result<Asset> {
        new_asset.validate()?;
        let asset_db: AssetDB = new_asset.into();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Asset> {
                let result_db = diesel::insert_into(assets::table)
                    .values(&asset_db)
                    .get_result::<AssetDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(Asset::try_from(result_db)?)
            })
            .await
    }

    async fn update_data_source(&self, asset_id: &str, data_source: &str) -> Result<Asset> {
        let asset_id = asset_id.to_string();
        let data_source = data_source.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Asset> {
                let result_db = diesel::update(assets::table.find(&asset_id))
                    .set((
                        assets::data_source.eq(&data_source),
                        assets::updated_at.eq(Utc::now().to_rfc3339()),
                    ))
                    .get_result::<AssetDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(Asset::try_from(result_db)?)
            })
            .await
    }

    fn get_by_id(&self, asset_id: &str) -> Result<Asset> {
        let mut conn = get_connection(&self.pool)?;

        let result = assets::table
            .select(AssetDB::as_select())
            .find(asset_id)
            .first::<AssetDB>(&mut conn)
            .into_core()?;

        Asset::try_from(result).into_core()
    }

    fn find_by_symbol(&self, symbol: &str, asset_type: AssetType) -> Result<Option<Asset>> {
        let mut conn = get_connection(&self.pool)?;

        let result = assets::table
            .select(AssetDB::as_select())
            .filter(assets::symbol.eq(symbol))
            .filter(assets::asset_type.eq(asset_type.as_str()))
            .first::<AssetDB>(&mut conn)
            .optional()
            .into_core()?;

        result.map(|row| Asset::try_from(row).into_core()).transpose()
    }

    fn list(&self) -> Result<Vec<Asset>> {
        let mut conn = get_connection(&self.pool)?;

        let results = assets::table
            .select(AssetDB::as_select())
            .order(assets::symbol.asc())
            .load::<AssetDB>(&mut conn)
            .into_core()?;

        to_domain(results)
    }

    fn list_by_asset_ids(&self, asset_ids: &[String]) -> Result<Vec<Asset>> {
        let mut conn = get_connection(&self.pool)?;
        let mut results = Vec::with_capacity(asset_ids.len());

        for chunk in chunk_for_sqlite(asset_ids) {
            let rows = assets::table
                .select(AssetDB::as_select())
                .filter(assets::id.eq_any(chunk))
                .load::<AssetDB>(&mut conn)
                .into_core()?;
            results.extend(to_domain(rows)?);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_db;
    use quotesync_core::errors::{DatabaseError, Error};
    use serde_json::json;

    fn fund(symbol: &str) -> NewAsset {
        let mut metadata = serde_json::Map::new();
        metadata.insert("fundType".to_string(), json!("BALANCED"));
        NewAsset {
            id: None,
            symbol: symbol.to_string(),
            name: Some("Vinacapital Equity Special Access".to_string()),
            asset_type: AssetType::Fund,
            currency: "VND".to_string(),
            exchange: None,
            data_source: "VN_MARKET".to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let db = test_db();
        let repo = AssetRepository::new(db.pool.clone(), db.writer.clone());

        let created = repo.create(fund("VESAF")).await.unwrap();
        let loaded = repo.get_by_id(&created.id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.metadata["fundType"], json!("BALANCED"));

        let found = repo.find_by_symbol("VESAF", AssetType::Fund).unwrap();
        assert_eq!(found.map(|a| a.id), Some(created.id.clone()));
        assert!(repo.find_by_symbol("VESAF", AssetType::Equity).unwrap().is_none());

        let listed = repo
            .list_by_asset_ids(&[created.id.clone(), "missing".to_string()])
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_symbol_and_type_is_rejected() {
        let db = test_db();
        let repo = AssetRepository::new(db.pool.clone(), db.writer.clone());

        repo.create(fund("VESAF")).await.unwrap();
        let err = repo.create(fund("VESAF")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_data_source() {
        let db = test_db();
        let repo = AssetRepository::new(db.pool.clone(), db.writer.clone());
        let created = repo.create(fund("VESAF")).await.unwrap();

        let updated = repo.update_data_source(&created.id, "YAHOO").await.unwrap();
        assert_eq!(updated.data_source, "YAHOO");
        assert_eq!(repo.get_by_id(&created.id).unwrap().data_source, "YAHOO");

        assert!(repo
            .update_data_source("missing", "YAHOO")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
