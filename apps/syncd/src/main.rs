mod config;
mod main_lib;
mod scheduler;

use config::Config;
use main_lib::{build_state, init_tracing};
use quotesync_core::assets::AssetServiceTrait;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_format);
    let state = build_state(&config).await?;
    tracing::info!("Tracking {} assets", state.asset_service.get_assets()?.len());

    let cancel = CancellationToken::new();
    let scheduler = scheduler::start_quote_sync_scheduler(
        state.clone(),
        config.sync_interval,
        config.initial_delay,
        cancel.clone(),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, waiting for the running sync to settle");
    cancel.cancel();
    scheduler.await?;
    Ok(())
}
