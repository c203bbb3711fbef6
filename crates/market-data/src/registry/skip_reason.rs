//! Per-request provider attempt tracking, for failover diagnostics.

use std::fmt;

/// Why a provider was passed over during a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider already reported the symbol unknown today.
    KnownMissToday,

    /// The provider does not serve this operation for the asset.
    NotSupported,

    /// The request was cancelled before this provider was reached.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::KnownMissToday => write!(f, "symbol unknown today"),
            SkipReason::NotSupported => write!(f, "not supported"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

/// Ordered log of provider attempts for one request.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&mut self, provider_id: &str, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id: provider_id.to_string(),
            skipped: Some(reason),
            error: None,
            success: false,
        });
    }

    pub fn record_error(&mut self, provider_id: &str, error: impl ToString) {
        self.attempts.push(ProviderAttempt {
            provider_id: provider_id.to_string(),
            skipped: None,
            error: Some(error.to_string()),
            success: false,
        });
    }

    pub fn record_success(&mut self, provider_id: &str) {
        self.attempts.push(ProviderAttempt {
            provider_id: provider_id.to_string(),
            skipped: None,
            error: None,
            success: true,
        });
    }

    /// `A: ERROR (timeout) -> B: SUCCESS`
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no providers attempted".to_string();
        }
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }
}
