//! In-memory stores and scripted providers shared by the unit tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quotesync_market_data::{
    AssetProfile, AssetType, Capability, CapabilitySet, InstrumentRef, MarketDataError,
    MarketDataProvider, ProviderConfig, ProviderFactory, ProviderKind, ProviderRegistry,
    Quote as ProviderQuote,
};

use crate::assets::{Asset, AssetRepositoryTrait, NewAsset};
use crate::errors::{DatabaseError, Error, Result};
use crate::quotes::{
    decide_upsert, MarketDataProviderSetting, ProviderRebindStore, ProviderSettingsStore, Quote,
    QuoteStore, RebindSummary, SyncState, SyncStateStore, UpdateMarketDataProviderSetting,
    UpsertSummary,
};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn provider_quote(source: &str, date: NaiveDate, value: Decimal) -> ProviderQuote {
    ProviderQuote::from_single_value(date, value, "VND", source)
}

/// Daily rows for every day in `[start, end]`.
pub fn daily_series(source: &str, start: NaiveDate, end: NaiveDate, value: Decimal) -> Vec<ProviderQuote> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| provider_quote(source, d, value))
        .collect()
}

pub fn fund_asset(symbol: &str, data_source: &str) -> NewAsset {
    NewAsset {
        id: None,
        symbol: symbol.to_string(),
        name: None,
        asset_type: AssetType::Fund,
        currency: "VND".to_string(),
        exchange: None,
        data_source: data_source.to_string(),
        metadata: Default::default(),
    }
}

pub fn equity_asset(symbol: &str, data_source: &str) -> NewAsset {
    NewAsset {
        asset_type: AssetType::Equity,
        currency: "USD".to_string(),
        ..fund_asset(symbol, data_source)
    }
}

// =============================================================================
// Provider configuration
// =============================================================================

fn config(id: &str, kind: ProviderKind, priority: i32, caps: Vec<Capability>) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        name: id.to_string(),
        kind,
        priority,
        endpoint: None,
        enabled: true,
        capabilities: caps,
        max_lookback_days: None,
        requests_per_minute: Some(60_000),
    }
}

/// Providers as seeded in a fresh database.
pub fn seeded_configs() -> Vec<ProviderConfig> {
    vec![
        config(
            "VN_MARKET",
            ProviderKind::VnMarket,
            1,
            vec![
                Capability::new(AssetType::Equity, r"^[A-Z0-9]{3}(\.VN)?$"),
                Capability::new(AssetType::Fund, "^[A-Z0-9]{2,12}$"),
                Capability::new(AssetType::Index, "^(VNINDEX|VN30|HNX|HNX30|UPCOM|VNXALL)$"),
            ],
        ),
        config(
            "YAHOO",
            ProviderKind::Yahoo,
            2,
            vec![
                Capability::new(AssetType::Equity, ".*"),
                Capability::new(AssetType::Index, ".*"),
                Capability::new(AssetType::Forex, ".*"),
                Capability::new(AssetType::Crypto, ".*"),
            ],
        ),
        config(
            "MANUAL",
            ProviderKind::Manual,
            100,
            vec![Capability::new(AssetType::Manual, ".*")],
        ),
    ]
}

/// Seeded providers with YAHOO also serving funds, so fund assets have a
/// second capable provider to fail over to.
pub fn test_configs() -> Vec<ProviderConfig> {
    let mut configs = seeded_configs();
    configs[1]
        .capabilities
        .push(Capability::new(AssetType::Fund, ".*"));
    configs
}

// =============================================================================
// Scripted provider
// =============================================================================

/// Behaviour of one scripted provider. Adjustable between calls.
pub struct ProviderScript {
    history: Mutex<std::result::Result<Vec<ProviderQuote>, MarketDataError>>,
    latest: Mutex<std::result::Result<ProviderQuote, MarketDataError>>,
    search: Mutex<Vec<AssetProfile>>,
    delay: Mutex<Option<Duration>>,
    unfiltered: Mutex<bool>,
    calls: AtomicUsize,
}

impl Default for ProviderScript {
    fn default() -> Self {
        Self {
            history: Mutex::new(Ok(Vec::new())),
            latest: Mutex::new(Err(MarketDataError::NotFound {
                provider: "script".to_string(),
                symbol: "unset".to_string(),
            })),
            search: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            unfiltered: Mutex::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ProviderScript {
    pub fn set_history(&self, rows: Vec<ProviderQuote>) {
        *self.history.lock().unwrap() = Ok(rows);
    }

    pub fn set_history_error(&self, error: MarketDataError) {
        *self.history.lock().unwrap() = Err(error);
    }

    pub fn set_latest(&self, result: std::result::Result<ProviderQuote, MarketDataError>) {
        *self.latest.lock().unwrap() = result;
    }

    pub fn set_search(&self, profiles: Vec<AssetProfile>) {
        *self.search.lock().unwrap() = profiles;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Return every scripted row regardless of the requested window.
    pub fn set_unfiltered(&self, unfiltered: bool) {
        *self.unfiltered.lock().unwrap() = unfiltered;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

struct ScriptedProvider {
    id: String,
    kind: ProviderKind,
    capabilities: CapabilitySet,
    script: Arc<ProviderScript>,
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn search(&self, query: &str) -> std::result::Result<Vec<AssetProfile>, MarketDataError> {
        let profiles = self.script.search.lock().unwrap().clone();
        if profiles.is_empty() {
            return Err(MarketDataError::NotFound {
                provider: self.id.clone(),
                symbol: query.to_string(),
            });
        }
        Ok(profiles)
    }

    async fn latest_quote(
        &self,
        _instrument: &InstrumentRef<'_>,
    ) -> std::result::Result<ProviderQuote, MarketDataError> {
        self.script.before_call().await;
        self.script.latest.lock().unwrap().clone()
    }

    async fn historical_quotes(
        &self,
        _instrument: &InstrumentRef<'_>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<ProviderQuote>, MarketDataError> {
        self.script.before_call().await;
        let unfiltered = *self.script.unfiltered.lock().unwrap();
        let rows = self.script.history.lock().unwrap().clone()?;
        Ok(rows
            .into_iter()
            .filter(|q| unfiltered || (q.date >= start && q.date <= end))
            .collect())
    }
}

struct ScriptedFactory {
    scripts: HashMap<String, Arc<ProviderScript>>,
}

impl ProviderFactory for ScriptedFactory {
    fn build(
        &self,
        config: &ProviderConfig,
        capabilities: CapabilitySet,
    ) -> std::result::Result<Arc<dyn MarketDataProvider>, MarketDataError> {
        Ok(Arc::new(ScriptedProvider {
            id: config.id.clone(),
            kind: config.kind,
            capabilities,
            script: self.scripts.get(&config.id).cloned().unwrap_or_default(),
        }))
    }
}

fn registry_from(configs: &[ProviderConfig], scripts: &[(&str, Arc<ProviderScript>)]) -> Arc<ProviderRegistry> {
    let factory = ScriptedFactory {
        scripts: scripts
            .iter()
            .map(|(id, script)| (id.to_string(), script.clone()))
            .collect(),
    };
    Arc::new(ProviderRegistry::from_configs(Arc::new(factory), configs).unwrap())
}

/// Registry over [`test_configs`] with the given scripts by provider id.
pub fn scripted_registry(scripts: &[(&str, Arc<ProviderScript>)]) -> Arc<ProviderRegistry> {
    registry_from(&test_configs(), scripts)
}

/// Registry over [`seeded_configs`] with inert providers.
pub fn standard_registry() -> Arc<ProviderRegistry> {
    registry_from(&seeded_configs(), &[])
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryState {
    pub providers: Vec<ProviderConfig>,
    pub assets: BTreeMap<String, Asset>,
    pub quotes: BTreeMap<(String, NaiveDate), Quote>,
    pub sync_states: BTreeMap<String, SyncState>,
}

/// Implements every store trait over one mutex, like a tiny database.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_quote_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_standard_providers() -> Self {
        let store = Self::default();
        store.state.lock().unwrap().providers = test_configs();
        store
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn set_fail_quote_writes(&self, fail: bool) {
        *self.fail_quote_writes.lock().unwrap() = fail;
    }

    pub fn quote_count(&self, asset_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .quotes
            .keys()
            .filter(|(id, _)| id == asset_id)
            .count()
    }

    /// Whether any row still names `provider_id`.
    pub fn references(&self, provider_id: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.providers.iter().any(|p| p.id == provider_id)
            || state.assets.values().any(|a| a.data_source == provider_id)
            || state.quotes.values().any(|q| q.data_source == provider_id)
    }
}

#[async_trait]
impl AssetRepositoryTrait for MemoryStore {
    async fn create(&self, new_asset: NewAsset) -> Result<Asset> {
        new_asset.validate()?;
        let now = Utc::now();
        let asset = Asset {
            id: new_asset
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            symbol: new_asset.symbol,
            name: new_asset.name,
            asset_type: new_asset.asset_type,
            currency: new_asset.currency,
            exchange: new_asset.exchange,
            data_source: new_asset.data_source,
            metadata: new_asset.metadata,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .assets
            .insert(asset.id.clone(), asset.clone());
        Ok(asset)
    }

    async fn update_data_source(&self, asset_id: &str, data_source: &str) -> Result<Asset> {
        let mut state = self.state.lock().unwrap();
        let asset = state
            .assets
            .get_mut(asset_id)
            .ok_or_else(|| DatabaseError::NotFound(asset_id.to_string()))?;
        asset.data_source = data_source.to_string();
        asset.updated_at = Utc::now();
        Ok(asset.clone())
    }

    fn get_by_id(&self, asset_id: &str) -> Result<Asset> {
        self.state
            .lock()
            .unwrap()
            .assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(asset_id.to_string()).into())
    }

    fn find_by_symbol(&self, symbol: &str, asset_type: AssetType) -> Result<Option<Asset>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .assets
            .values()
            .find(|a| a.symbol == symbol && a.asset_type == asset_type)
            .cloned())
    }

    fn list(&self) -> Result<Vec<Asset>> {
        Ok(self.state.lock().unwrap().assets.values().cloned().collect())
    }

    fn list_by_asset_ids(&self, asset_ids: &[String]) -> Result<Vec<Asset>> {
        let state = self.state.lock().unwrap();
        Ok(asset_ids
            .iter()
            .filter_map(|id| state.assets.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl QuoteStore for MemoryStore {
    async fn upsert_quotes(&self, quotes: &[Quote]) -> Result<UpsertSummary> {
        if *self.fail_quote_writes.lock().unwrap() {
            return Err(Error::Database(DatabaseError::TransactionFailed(
                "disk I/O error".to_string(),
            )));
        }
        let mut state = self.state.lock().unwrap();
        let priorities: HashMap<String, i32> = state
            .providers
            .iter()
            .map(|p| (p.id.clone(), p.priority))
            .collect();

        let mut summary = UpsertSummary::default();
        for quote in quotes {
            let key = (quote.asset_id.clone(), quote.date);
            let decision = decide_upsert(state.quotes.get(&key), quote, |id| {
                priorities.get(id).copied()
            });
            summary.record(decision);
            if matches!(
                decision,
                crate::quotes::UpsertDecision::Insert | crate::quotes::UpsertDecision::Replace
            ) {
                state.quotes.insert(key, quote.clone());
            }
        }
        Ok(summary)
    }

    fn latest(&self, asset_id: &str) -> Result<Option<Quote>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .quotes
            .values()
            .filter(|q| q.asset_id == asset_id)
            .max_by_key(|q| q.date)
            .cloned())
    }

    fn range(&self, asset_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Quote>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .quotes
            .values()
            .filter(|q| q.asset_id == asset_id && q.date >= start && q.date <= end)
            .cloned()
            .collect())
    }

    fn latest_for_assets(&self, asset_ids: &[String]) -> Result<HashMap<String, Quote>> {
        let mut result = HashMap::new();
        for id in asset_ids {
            if let Some(q) = self.latest(id)? {
                result.insert(id.clone(), q);
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl SyncStateStore for MemoryStore {
    fn get_by_asset_id(&self, asset_id: &str) -> Result<Option<SyncState>> {
        Ok(self.state.lock().unwrap().sync_states.get(asset_id).cloned())
    }

    fn get_by_asset_ids(&self, asset_ids: &[String]) -> Result<HashMap<String, SyncState>> {
        let state = self.state.lock().unwrap();
        Ok(asset_ids
            .iter()
            .filter_map(|id| state.sync_states.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }

    fn get_all(&self) -> Result<Vec<SyncState>> {
        Ok(self.state.lock().unwrap().sync_states.values().cloned().collect())
    }

    async fn upsert(&self, sync_state: &SyncState) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .sync_states
            .insert(sync_state.asset_id.clone(), sync_state.clone());
        Ok(())
    }
}

#[async_trait]
impl ProviderSettingsStore for MemoryStore {
    fn get_all_providers(&self) -> Result<Vec<MarketDataProviderSetting>> {
        let mut providers = self.state.lock().unwrap().providers.clone();
        providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(providers)
    }

    fn get_provider(&self, id: &str) -> Result<MarketDataProviderSetting> {
        self.state
            .lock()
            .unwrap()
            .providers
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(id.to_string()).into())
    }

    async fn update_provider(
        &self,
        id: &str,
        changes: UpdateMarketDataProviderSetting,
    ) -> Result<MarketDataProviderSetting> {
        let mut state = self.state.lock().unwrap();
        let provider = state
            .providers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(id.to_string()))?;
        changes.apply_to(provider);
        Ok(provider.clone())
    }
}

#[async_trait]
impl ProviderRebindStore for MemoryStore {
    async fn rebind_provider(&self, old_id: &str, new_id: &str) -> Result<RebindSummary> {
        let mut state = self.state.lock().unwrap();
        if state.providers.iter().any(|p| p.id == new_id) {
            return Err(Error::MigrationConflict(format!("{} already exists", new_id)));
        }
        let provider = state
            .providers
            .iter_mut()
            .find(|p| p.id == old_id)
            .ok_or_else(|| Error::MigrationConflict(format!("{} does not exist", old_id)))?;
        provider.id = new_id.to_string();

        let mut summary = RebindSummary {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
            ..Default::default()
        };
        for asset in state.assets.values_mut().filter(|a| a.data_source == old_id) {
            asset.data_source = new_id.to_string();
            summary.assets_updated += 1;
        }
        for quote in state.quotes.values_mut().filter(|q| q.data_source == old_id) {
            quote.data_source = new_id.to_string();
            summary.quotes_updated += 1;
        }
        Ok(summary)
    }
}
