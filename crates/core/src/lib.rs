//! QuoteSync Core - Domain entities, services, and traits.
//!
//! This crate contains the synchronization engine. It is database-agnostic
//! and defines traits that are implemented by the `storage-sqlite` crate.

pub mod assets;
pub mod errors;
pub mod quotes;

#[cfg(test)]
pub(crate) mod test_support;

pub use assets::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
