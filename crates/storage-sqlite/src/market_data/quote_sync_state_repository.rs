use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use super::model::QuoteSyncStateDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::quote_sync_state::dsl as qss_dsl;
use crate::utils::chunk_for_sqlite;
use quotesync_core::quotes::{SyncState, SyncStateStore};
use quotesync_core::Result;

pub struct QuoteSyncStateRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl QuoteSyncStateRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncStateStore for QuoteSyncStateRepository {
    fn get_by_asset_id(&self, asset_id: &str) -> Result<Option<SyncState>> {
        let mut conn = get_connection(&self.pool)?;

        let row = qss_dsl::quote_sync_state
            .find(asset_id)
            .first::<QuoteSyncStateDB>(&mut conn)
            .optional()
            .into_core()?;

        row.map(|r| SyncState::try_from(r).into_core()).transpose()
    }

    fn get_by_asset_ids(&self, asset_ids: &[String]) -> Result<HashMap<String, SyncState>> {
        let mut conn = get_connection(&self.pool)?;
        let mut result = HashMap::with_capacity(asset_ids.len());

        for chunk in chunk_for_sqlite(asset_ids) {
            let rows = qss_dsl::quote_sync_state
                .filter(qss_dsl::asset_id.eq_any(chunk))
                .load::<QuoteSyncStateDB>(&mut conn)
                .into_core()?;
            for row in rows {
                let state = SyncState::try_from(row).into_core()?;
                result.insert(state.asset_id.clone(), state);
            }
        }

        Ok(result)
    }

    fn get_all(&self) -> Result<Vec<SyncState>> {
        let mut conn = get_connection(&self.pool)?;

        qss_dsl::quote_sync_state
            .order(qss_dsl::asset_id.asc())
            .load::<QuoteSyncStateDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(|r| SyncState::try_from(r).into_core())
            .collect()
    }

    async fn upsert(&self, state: &SyncState) -> Result<()> {
        let row = QuoteSyncStateDB::from(state);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(qss_dsl::quote_sync_state)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                debug!(
                    "Sync state for {}: failures={} degraded={}",
                    row.asset_id, row.consecutive_failures, row.degraded
                );
                Ok(())
            })
            .await
    }
}
