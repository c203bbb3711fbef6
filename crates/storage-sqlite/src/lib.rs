//! SQLite storage for the quote synchronization service.
//!
//! Implements the repository traits defined in `quotesync-core` with Diesel:
//! - Connection pooling, PRAGMAs and embedded migrations
//! - A single writer actor that serializes all mutations
//! - Repositories for assets, quotes, provider settings and sync state
//!
//! ```text
//!   core (traits)
//!        │
//!        ▼
//! storage-sqlite (this crate)
//!        │
//!        ▼
//!     SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

pub mod assets;
pub mod market_data;

#[cfg(test)]
mod test_utils;

pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use errors::{IntoCore, StorageError};

pub use assets::AssetRepository;
pub use market_data::{MarketDataRepository, QuoteSyncStateRepository};

pub use quotesync_core::errors::{DatabaseError, Error, Result};
