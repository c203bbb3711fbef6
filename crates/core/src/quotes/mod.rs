//! Quote management module.
//!
//! - [`model`] - Stored quote rows, the upsert rule, live/stale outcome
//! - [`store`] - Storage traits for quotes and provider settings
//! - [`sync_state`] - Per-asset progress, backoff and degraded flag
//! - [`fallback`] - Cross-provider failover with stale cache
//! - [`sync`] - Bounded concurrent synchronization
//! - [`rebind`] - Atomic provider re-identification
//! - [`service`] - Unified service combining all operations
//! - [`provider_settings`] - Provider settings models
//! - [`constants`] - Configuration defaults
//!
//! # Architecture
//!
//! ```text
//! QuoteService → QuoteSyncService → FallbackResolver → ProviderRegistry (market-data)
//!       ↓                ↓
//! RebindManager    QuoteStore / SyncStateStore (DB)
//! ```

pub mod constants;
pub mod fallback;
pub mod model;
pub mod provider_settings;
pub mod rebind;
pub mod service;
pub mod store;
pub mod sync;
pub mod sync_state;


pub use model::{decide_upsert, Quote, QuoteOutcome, UpsertDecision, UpsertSummary};
pub use store::{ProviderSettingsStore, QuoteStore};

pub use sync_state::{fetch_window, BackoffPolicy, SyncState, SyncStateStore};

pub use fallback::{FallbackResolver, HistoryFetch};
pub use sync::{AssetSyncReport, QuoteSyncService, SyncConfig, SyncOutcome, SyncSkipReason};

pub use rebind::{ProviderRebindStore, RebindManager, RebindSummary};
pub use service::{QuoteService, QuoteServiceTrait};

pub use constants::*;

pub use provider_settings::{MarketDataProviderSetting, UpdateMarketDataProviderSetting};
