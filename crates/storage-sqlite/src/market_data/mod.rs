//! SQLite storage implementation for market data.

mod model;
mod quote_sync_state_repository;
mod repository;

pub use model::{MarketDataProviderSettingDB, QuoteDB, QuoteSyncStateDB};
pub use quote_sync_state_repository::QuoteSyncStateRepository;
pub use repository::MarketDataRepository;
