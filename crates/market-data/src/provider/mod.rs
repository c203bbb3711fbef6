//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all adapters implement
//! - The capability table (asset type x symbol pattern) that drives dispatch
//! - Concrete adapters: the regional VN market proxy, Yahoo, and the manual
//!   placeholder that owns user-maintained assets
//!
//! Adapters only normalize upstream data. Ordering, failover and persistence
//! live in the registry and in the core crate.

mod capabilities;
mod traits;

pub mod manual;
pub mod vn_market;
pub mod yahoo;

pub use capabilities::{Capability, CapabilitySet};
pub use traits::MarketDataProvider;
