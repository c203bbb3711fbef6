//! Provider response validation.
//!
//! A history response is committed only if every row passes. Hard issues
//! reject the whole response; soft issues are logged and accepted.
//!
//! Hard:
//! - date outside the requested window
//! - duplicate or descending dates
//! - negative prices or volume
//! - high below low
//! - currency or source missing
//!
//! Soft:
//! - open/close outside the high/low range
//! - zero close

use chrono::NaiveDate;
use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::Quote;

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject the whole response.
    Hard,
    /// Accept but log.
    Soft,
}

#[derive(Clone, Debug)]
struct ValidationIssue {
    severity: ValidationSeverity,
    message: String,
}

/// Quote data validator.
#[derive(Clone, Debug, Default)]
pub struct QuoteValidator;

impl QuoteValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single quote (latest-quote path).
    pub fn validate_quote(&self, provider: &str, quote: &Quote) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();
        self.check_row(quote, &mut issues);
        self.finish(provider, &issues)
    }

    /// Validate a full history response against the requested window.
    pub fn validate_history(
        &self,
        provider: &str,
        quotes: &[Quote],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();
        let mut previous: Option<NaiveDate> = None;

        for quote in quotes {
            if quote.date < start || quote.date > end {
                issues.push(hard(format!(
                    "{} is outside the requested window {} to {}",
                    quote.date, start, end
                )));
            }
            if let Some(prev) = previous {
                if quote.date == prev {
                    issues.push(hard(format!("duplicate row for {}", quote.date)));
                } else if quote.date < prev {
                    issues.push(hard(format!("{} follows {} (not ascending)", quote.date, prev)));
                }
            }
            previous = Some(quote.date);
            self.check_row(quote, &mut issues);
        }

        self.finish(provider, &issues)
    }

    fn check_row(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        let date = quote.date;
        for (field, value) in [
            ("open", quote.open),
            ("high", quote.high),
            ("low", quote.low),
            ("close", quote.close),
            ("adjclose", quote.adjclose),
            ("volume", quote.volume),
        ] {
            if value < Decimal::ZERO {
                issues.push(hard(format!("negative {} {} on {}", field, value, date)));
            }
        }

        if quote.high < quote.low {
            issues.push(hard(format!(
                "high {} below low {} on {}",
                quote.high, quote.low, date
            )));
        } else {
            if quote.open < quote.low || quote.open > quote.high {
                issues.push(soft(format!("open {} outside range on {}", quote.open, date)));
            }
            if quote.close < quote.low || quote.close > quote.high {
                issues.push(soft(format!("close {} outside range on {}", quote.close, date)));
            }
        }

        if quote.close.is_zero() {
            issues.push(soft(format!("zero close on {}", date)));
        }
        if quote.currency.trim().is_empty() {
            issues.push(hard(format!("missing currency on {}", date)));
        }
        if quote.source.trim().is_empty() {
            issues.push(hard(format!("missing source on {}", date)));
        }
    }

    fn finish(&self, provider: &str, issues: &[ValidationIssue]) -> Result<(), MarketDataError> {
        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Quote validation warning from {}: {}", provider, issue.message);
        }

        if errors.is_empty() {
            return Ok(());
        }
        Err(MarketDataError::InvalidResponse {
            provider: provider.to_string(),
            message: errors.join("; "),
            payload_ref: "validation".to_string(),
        })
    }
}

fn hard(message: String) -> ValidationIssue {
    ValidationIssue {
        severity: ValidationSeverity::Hard,
        message,
    }
}

fn soft(message: String) -> ValidationIssue {
    ValidationIssue {
        severity: ValidationSeverity::Soft,
        message,
    }
}
