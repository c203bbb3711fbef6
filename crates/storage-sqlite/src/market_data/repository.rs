use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::sqlite::SqliteConnection;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::model::{MarketDataProviderSettingDB, QuoteDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::assets::dsl as assets_dsl;
use crate::schema::market_data_providers::dsl as providers_dsl;
use crate::schema::quotes::dsl as quotes_dsl;
use crate::utils::{chunk_for_sqlite, format_day};
use quotesync_core::errors::{DatabaseError, Error};
use quotesync_core::quotes::{
    decide_upsert, MarketDataProviderSetting, ProviderRebindStore, ProviderSettingsStore, Quote,
    QuoteStore, RebindSummary, UpdateMarketDataProviderSetting, UpsertDecision, UpsertSummary,
};
use quotesync_core::Result;

/// Quotes, provider settings and rebind, which all share the provider table.
pub struct MarketDataRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MarketDataRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn load_priorities(conn: &mut SqliteConnection) -> Result<HashMap<String, i32>> {
    let rows = providers_dsl::market_data_providers
        .select((providers_dsl::id, providers_dsl::priority))
        .load::<(String, i32)>(conn)
        .map_err(StorageError::from)?;
    Ok(rows.into_iter().collect())
}

/// Stored rows for `asset_id` on any of `days`, keyed by date.
fn load_existing(
    conn: &mut SqliteConnection,
    asset_id: &str,
    days: &[String],
) -> Result<HashMap<NaiveDate, Quote>> {
    let mut existing = HashMap::new();
    for chunk in chunk_for_sqlite(days) {
        let rows = quotes_dsl::quotes
            .filter(quotes_dsl::asset_id.eq(asset_id))
            .filter(quotes_dsl::day.eq_any(chunk))
            .load::<QuoteDB>(conn)
            .map_err(StorageError::from)?;
        for row in rows {
            let quote = Quote::try_from(row)?;
            existing.insert(quote.date, quote);
        }
    }
    Ok(existing)
}

// =============================================================================
// QuoteStore Implementation
// =============================================================================

#[async_trait]
impl QuoteStore for MarketDataRepository {
    async fn upsert_quotes(&self, input_quotes: &[Quote]) -> Result<UpsertSummary> {
        if input_quotes.is_empty() {
            return Ok(UpsertSummary::default());
        }
        let incoming = input_quotes.to_vec();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<UpsertSummary> {
                // Read inside the transaction so a concurrent reorder cannot
                // slip between the priority check and the write.
                let priorities = load_priorities(conn)?;

                let mut by_asset: BTreeMap<&str, Vec<&Quote>> = BTreeMap::new();
                for quote in &incoming {
                    by_asset.entry(quote.asset_id.as_str()).or_default().push(quote);
                }

                let mut summary = UpsertSummary::default();
                for (asset_id, rows) in by_asset {
                    let days: Vec<String> = rows.iter().map(|q| format_day(q.date)).collect();
                    let mut existing = load_existing(conn, asset_id, &days)?;

                    for quote in rows {
                        let decision = decide_upsert(existing.get(&quote.date), quote, |id| {
                            priorities.get(id).copied()
                        });
                        match decision {
                            UpsertDecision::Insert | UpsertDecision::Replace => {
                                diesel::replace_into(quotes_dsl::quotes)
                                    .values(&QuoteDB::from(quote))
                                    .execute(conn)
                                    .map_err(StorageError::from)?;
                                existing.insert(quote.date, quote.clone());
                            }
                            UpsertDecision::Reject => {
                                debug!(
                                    "Rejected {} quote for {} on {}: stored source is preferred",
                                    quote.data_source, asset_id, quote.date
                                );
                            }
                            UpsertDecision::Unchanged => {}
                        }
                        summary.record(decision);
                    }
                }

                if summary.rejected > 0 {
                    warn!(
                        "Upsert kept {} stored quotes from more preferred providers",
                        summary.rejected
                    );
                }
                Ok(summary)
            })
            .await
    }

    fn latest(&self, asset_id: &str) -> Result<Option<Quote>> {
        let mut conn = get_connection(&self.pool)?;

        let result = quotes_dsl::quotes
            .filter(quotes_dsl::asset_id.eq(asset_id))
            .order(quotes_dsl::day.desc())
            .first::<QuoteDB>(&mut conn)
            .optional()
            .into_core()?;

        result.map(|row| Quote::try_from(row).into_core()).transpose()
    }

    fn range(&self, asset_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Quote>> {
        let mut conn = get_connection(&self.pool)?;

        let results = quotes_dsl::quotes
            .filter(quotes_dsl::asset_id.eq(asset_id))
            .filter(quotes_dsl::day.ge(format_day(start)))
            .filter(quotes_dsl::day.le(format_day(end)))
            .order(quotes_dsl::day.asc())
            .load::<QuoteDB>(&mut conn)
            .into_core()?;

        results
            .into_iter()
            .map(|row| Quote::try_from(row).into_core())
            .collect()
    }

    fn latest_for_assets(&self, asset_ids: &[String]) -> Result<HashMap<String, Quote>> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = get_connection(&self.pool)?;
        let mut result: HashMap<String, Quote> = HashMap::new();

        for chunk in chunk_for_sqlite(asset_ids) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "WITH RankedQuotes AS ( \
                    SELECT \
                        q.*, \
                        ROW_NUMBER() OVER (PARTITION BY q.asset_id ORDER BY q.day DESC) as rn \
                    FROM quotes q WHERE q.asset_id IN ({}) \
                ) \
                SELECT * FROM RankedQuotes WHERE rn = 1 \
                ORDER BY asset_id",
                placeholders
            );

            let mut query_builder = sql_query(sql).into_boxed::<Sqlite>();
            for asset_id in chunk {
                query_builder = query_builder.bind::<Text, _>(asset_id);
            }

            let rows: Vec<QuoteDB> = query_builder.load::<QuoteDB>(&mut conn).into_core()?;
            for row in rows {
                let quote = Quote::try_from(row).into_core()?;
                result.insert(quote.asset_id.clone(), quote);
            }
        }

        Ok(result)
    }
}

// =============================================================================
// ProviderSettingsStore Implementation
// =============================================================================

#[async_trait]
impl ProviderSettingsStore for MarketDataRepository {
    fn get_all_providers(&self) -> Result<Vec<MarketDataProviderSetting>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = providers_dsl::market_data_providers
            .order((providers_dsl::priority.asc(), providers_dsl::id.asc()))
            .load::<MarketDataProviderSettingDB>(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| MarketDataProviderSetting::try_from(row).into_core())
            .collect()
    }

    fn get_provider(&self, id: &str) -> Result<MarketDataProviderSetting> {
        let mut conn = get_connection(&self.pool)?;

        let row = providers_dsl::market_data_providers
            .find(id)
            .first::<MarketDataProviderSettingDB>(&mut conn)
            .optional()
            .into_core()?
            .ok_or_else(|| DatabaseError::NotFound(format!("provider {}", id)))?;

        MarketDataProviderSetting::try_from(row).into_core()
    }

    async fn update_provider(
        &self,
        id: &str,
        changes: UpdateMarketDataProviderSetting,
    ) -> Result<MarketDataProviderSetting> {
        let id = id.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<MarketDataProviderSetting> {
                let row = providers_dsl::market_data_providers
                    .find(&id)
                    .first::<MarketDataProviderSettingDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| DatabaseError::NotFound(format!("provider {}", id)))?;

                let mut setting = MarketDataProviderSetting::try_from(row)?;
                changes.apply_to(&mut setting);

                let updated = MarketDataProviderSettingDB::try_from(&setting)?;
                diesel::update(providers_dsl::market_data_providers.find(&id))
                    .set(&updated)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(setting)
            })
            .await
    }
}

// =============================================================================
// ProviderRebindStore Implementation
// =============================================================================

fn count_references(conn: &mut SqliteConnection, provider_id: &str) -> Result<i64> {
    let providers: i64 = providers_dsl::market_data_providers
        .filter(providers_dsl::id.eq(provider_id))
        .count()
        .get_result(conn)
        .map_err(StorageError::from)?;
    let assets: i64 = assets_dsl::assets
        .filter(assets_dsl::data_source.eq(provider_id))
        .count()
        .get_result(conn)
        .map_err(StorageError::from)?;
    let quotes: i64 = quotes_dsl::quotes
        .filter(quotes_dsl::data_source.eq(provider_id))
        .count()
        .get_result(conn)
        .map_err(StorageError::from)?;
    Ok(providers + assets + quotes)
}

#[async_trait]
impl ProviderRebindStore for MarketDataRepository {
    async fn rebind_provider(&self, old_id: &str, new_id: &str) -> Result<RebindSummary> {
        let old_id = old_id.to_string();
        let new_id = new_id.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RebindSummary> {
                if old_id.is_empty() || new_id.is_empty() || old_id == new_id {
                    return Err(Error::MigrationConflict(format!(
                        "invalid rebind {} -> {}",
                        old_id, new_id
                    )));
                }

                let exists = |conn: &mut SqliteConnection, id: &str| -> Result<bool> {
                    let count: i64 = providers_dsl::market_data_providers
                        .filter(providers_dsl::id.eq(id))
                        .count()
                        .get_result(conn)
                        .map_err(StorageError::from)?;
                    Ok(count > 0)
                };
                if !exists(conn, &old_id)? {
                    return Err(Error::MigrationConflict(format!(
                        "provider {} does not exist",
                        old_id
                    )));
                }
                if exists(conn, &new_id)? {
                    return Err(Error::MigrationConflict(format!(
                        "provider {} already exists",
                        new_id
                    )));
                }

                diesel::update(providers_dsl::market_data_providers.find(&old_id))
                    .set(providers_dsl::id.eq(&new_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let assets_updated =
                    diesel::update(assets_dsl::assets.filter(assets_dsl::data_source.eq(&old_id)))
                        .set(assets_dsl::data_source.eq(&new_id))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                let quotes_updated =
                    diesel::update(quotes_dsl::quotes.filter(quotes_dsl::data_source.eq(&old_id)))
                        .set(quotes_dsl::data_source.eq(&new_id))
                        .execute(conn)
                        .map_err(StorageError::from)?;

                let residual = count_references(conn, &old_id)?;
                if residual > 0 {
                    return Err(Error::MigrationConflict(format!(
                        "{} rows still reference {} after rebind",
                        residual, old_id
                    )));
                }

                info!(
                    "Rebind {} -> {} touched {} assets and {} quotes",
                    old_id, new_id, assets_updated, quotes_updated
                );
                Ok(RebindSummary {
                    old_id,
                    new_id,
                    assets_updated,
                    quotes_updated,
                })
            })
            .await
    }
}
