//! Background scheduler for periodic quote sync.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use quotesync_core::quotes::SyncOutcome;

use crate::main_lib::AppState;

/// Starts the scheduler. The task ends once `cancel` fires; a sync already
/// running is handed a child token and finishes its in-flight writes.
pub fn start_quote_sync_scheduler(
    state: Arc<AppState>,
    every: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Quote sync scheduler started ({}s interval)", every.as_secs());

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(initial_delay) => {}
        }

        // First tick is immediate
        let mut sync_interval = interval(every);
        sync_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sync_interval.tick() => run_scheduled_sync(&state, cancel.child_token()).await,
            }
        }
        info!("Quote sync scheduler stopped");
    })
}

/// Runs a single scheduled sync over every tracked asset.
async fn run_scheduled_sync(state: &Arc<AppState>, cancel: CancellationToken) {
    info!("Running scheduled quote sync...");

    match state
        .quote_service
        .sync_market_data_with_cancel(None, cancel)
        .await
    {
        Ok(reports) => {
            let failed = reports
                .iter()
                .filter(|r| r.outcome == SyncOutcome::Failed)
                .count();
            if failed > 0 {
                warn!("Scheduled quote sync: {} of {} assets failed", failed, reports.len());
            }
            if let Ok(states) = state.quote_service.sync_states() {
                let degraded: Vec<&str> = states
                    .iter()
                    .filter(|s| s.degraded)
                    .map(|s| s.asset_id.as_str())
                    .collect();
                if !degraded.is_empty() {
                    warn!("Degraded assets: {}", degraded.join(", "));
                }
            }
        }
        Err(e) => warn!("Scheduled quote sync failed: {}", e),
    }
}
