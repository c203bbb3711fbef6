//! QuoteSync Market Data Crate
//!
//! Provider-agnostic market data fetching for the quote synchronization
//! service.
//!
//! # Overview
//!
//! - Asset types: equities, funds, indices, FX, crypto, and manual assets
//! - Providers: the regional VN market proxy, Yahoo Finance, and a manual
//!   placeholder for user-maintained quotes
//! - Capability-driven resolution with priority ordering and hot reload
//! - Per-provider rate limiting and response validation
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |   Core Services  | --> |  InstrumentRef   |  (symbol, type, currency, source)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          | ProviderRegistry |  (priority + capability match)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (VN market, Yahoo, manual)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |     Quote        |  (canonical daily OHLCV)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`InstrumentRef`] - What the caller wants data for
//! - [`Quote`] - Canonical daily quote; fund NAV is replicated across OHLC
//! - [`AssetProfile`] - Search result
//! - [`ProviderConfig`] - Persisted provider settings
//! - [`MarketDataError`] - Error taxonomy with retry classification

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{MarketDataError, RetryClass};
pub use models::{AssetProfile, AssetType, InstrumentRef, ProviderKind, Quote};
pub use provider::{Capability, CapabilitySet, MarketDataProvider};
pub use registry::{
    DefaultProviderFactory, FetchDiagnostics, ProviderConfig, ProviderFactory, ProviderRegistry,
    QuoteValidator, RateLimiter, ResolvedProvider, SkipReason, DEFAULT_REQUEST_TIMEOUT,
    MAX_SEARCH_RESULTS,
};
