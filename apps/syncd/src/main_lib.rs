use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quotesync_core::assets::{AssetService, AssetServiceTrait};
use quotesync_core::quotes::{ProviderSettingsStore, QuoteService, QuoteServiceTrait};
use quotesync_market_data::{DefaultProviderFactory, ProviderRegistry};
use quotesync_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, AssetRepository, MarketDataRepository,
    QuoteSyncStateRepository,
};

use crate::config::{Config, LogFormat};

pub struct AppState {
    pub quote_service: Arc<dyn QuoteServiceTrait>,
    pub asset_service: Arc<dyn AssetServiceTrait>,
}

pub fn init_tracing(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());

    let asset_repo = Arc::new(AssetRepository::new(pool.clone(), writer.clone()));
    let market_data_repo = Arc::new(MarketDataRepository::new(pool.clone(), writer.clone()));
    let sync_state_repo = Arc::new(QuoteSyncStateRepository::new(pool.clone(), writer));

    let factory = Arc::new(DefaultProviderFactory::new(config.sync.call_timeout));
    let providers = market_data_repo.get_all_providers()?;
    let registry = Arc::new(
        ProviderRegistry::from_configs(factory, &providers)?.with_call_timeout(config.sync.call_timeout),
    );
    tracing::info!(
        "Loaded {} providers: {}",
        providers.len(),
        providers
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let quote_service = QuoteService::new(
        asset_repo.clone(),
        market_data_repo.clone(),
        sync_state_repo,
        market_data_repo.clone(),
        market_data_repo,
        registry.clone(),
        config.sync.clone(),
    );
    let asset_service: Arc<dyn AssetServiceTrait> = Arc::new(AssetService::new(
        asset_repo,
        registry,
        quote_service.sync_gate(),
    ));
    let quote_service: Arc<dyn QuoteServiceTrait> = Arc::new(quote_service);

    Ok(Arc::new(AppState {
        quote_service,
        asset_service,
    }))
}
