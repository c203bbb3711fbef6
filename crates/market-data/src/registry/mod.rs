//! Provider registry module.
//!
//! - Provider settings and the adapter factory
//! - Priority/capability resolution with hot reload
//! - Rate limiting per provider
//! - Response validation
//! - Attempt diagnostics for failover logging

mod config;
mod provider_registry;
mod rate_limiter;
mod skip_reason;
mod validator;

pub use config::{DefaultProviderFactory, ProviderConfig, ProviderFactory, DEFAULT_REQUEST_TIMEOUT};
pub use provider_registry::{ProviderRegistry, ResolvedProvider, MAX_SEARCH_RESULTS};
pub use rate_limiter::{RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use validator::{QuoteValidator, ValidationSeverity};
