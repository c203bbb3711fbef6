//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all provider operations
//! - [`RetryClass`]: Classification for determining failover/backoff behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via [`retry_class`](Self::retry_class).
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    /// The provider does not know the symbol. Permanent for this provider.
    #[error("Symbol not found: {symbol} ({provider})")]
    NotFound {
        /// The provider that reported the miss
        provider: String,
        /// The symbol that was requested
        symbol: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
        /// Provider-suggested delay before retrying, if any
        retry_after: Option<Duration>,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// Connection failure or upstream 5xx.
    #[error("Network error: {provider} - {message}")]
    Network {
        /// The provider that failed
        provider: String,
        /// Error detail
        message: String,
    },

    /// The provider answered with a payload that does not match the expected
    /// schema, or that failed validation.
    #[error("Invalid response from {provider}: {message} [payload {payload_ref}]")]
    InvalidResponse {
        /// The provider that returned the payload
        provider: String,
        /// What was wrong with it
        message: String,
        /// Digest of the raw payload, logged alongside the body for diagnosis
        payload_ref: String,
    },

    /// The provider does not implement this operation.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation attempted
        operation: String,
        /// The provider that refused it
        provider: String,
    },

    /// No enabled provider is capable of serving the instrument.
    #[error("No providers available for {0}")]
    NoProvidersAvailable(String),

    /// Provider settings could not be turned into a working adapter.
    #[error("Invalid provider configuration: {0}")]
    InvalidConfiguration(String),

    /// The caller cancelled the request before a provider was contacted.
    #[error("Request cancelled")]
    Cancelled,
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use quotesync_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Timeout { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::NotFound {
    ///     provider: "VN_MARKET".to_string(),
    ///     symbol: "ZZZ".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Network { .. }
            | Self::InvalidResponse { .. } => RetryClass::WithBackoff,

            Self::NotFound { .. } | Self::NotSupported { .. } => RetryClass::NextProvider,

            Self::NoProvidersAvailable(_) | Self::InvalidConfiguration(_) | Self::Cancelled => {
                RetryClass::Never
            }
        }
    }

    /// True for failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        self.retry_class() == RetryClass::WithBackoff
    }

    /// True when no provider can serve the request as asked.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::NotSupported { .. } | Self::NoProvidersAvailable(_)
        )
    }

    /// Provider-suggested retry delay, if the provider sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn network(provider: &str, message: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(provider: &str, symbol: &str) -> Self {
        Self::NotFound {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub(crate) fn not_supported(provider: &str, operation: &str) -> Self {
        Self::NotSupported {
            operation: operation.to_string(),
            provider: provider.to_string(),
        }
    }
}
