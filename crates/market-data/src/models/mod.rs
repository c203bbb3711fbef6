//! Market data models
//!
//! - `types` - Asset classification and provider kinds
//! - `instrument` - What a caller asks a provider about (InstrumentRef)
//! - `quote` - Canonical daily quote produced by adapters
//! - `profile` - Asset profile returned by search

mod instrument;
mod profile;
mod quote;
mod types;

pub use instrument::InstrumentRef;
pub use profile::AssetProfile;
pub use quote::Quote;
pub(crate) use quote::{decimal_from_f64, parse_day};
pub use types::{AssetType, ProviderKind};
