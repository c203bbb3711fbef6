//! Quote domain models.
//!
//! This module contains the stored quote row, the rule that decides how an
//! incoming row interacts with a stored one, and the freshness wrapper
//! returned to callers.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quotesync_market_data::Quote as ProviderQuote;

// =============================================================================
// Quote
// =============================================================================

/// One daily data point for an asset. At most one row exists per
/// `(asset_id, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub asset_id: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub adjclose: Decimal,
    pub volume: Decimal,
    pub currency: String,
    /// Provider id that supplied the row.
    pub data_source: String,
}

impl Quote {
    /// Attach a provider quote to an asset. `data_source` is the id of the
    /// provider that answered, whatever the adapter wrote into `source`.
    pub fn from_provider(asset_id: &str, data_source: &str, quote: ProviderQuote) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            date: quote.date,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            adjclose: quote.adjclose,
            volume: quote.volume,
            currency: quote.currency,
            data_source: data_source.to_string(),
        }
    }

    /// A single observed value (manual price, NAV) spread across OHLC.
    pub fn single_value(
        asset_id: &str,
        date: NaiveDate,
        value: Decimal,
        currency: &str,
        data_source: &str,
    ) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            date,
            open: value,
            high: value,
            low: value,
            close: value,
            adjclose: value,
            volume: Decimal::ZERO,
            currency: currency.to_string(),
            data_source: data_source.to_string(),
        }
    }

    /// Full days between the quote and `today`.
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.date).num_days().max(0)
    }
}

// =============================================================================
// Upsert rule
// =============================================================================

/// What the store does with an incoming row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDecision {
    /// No row for `(asset_id, date)` yet.
    Insert,
    /// Incoming provider is at least as preferred as the stored one.
    Replace,
    /// Identical row already stored.
    Unchanged,
    /// Stored row comes from a more-preferred provider.
    Reject,
}

/// Decide how `incoming` interacts with the `existing` row for the same day.
///
/// `priority_of` returns the configured priority of a provider id; a source
/// without a provider row ranks below every known provider. Lower priority
/// values win, ties replace.
pub fn decide_upsert<F>(existing: Option<&Quote>, incoming: &Quote, priority_of: F) -> UpsertDecision
where
    F: Fn(&str) -> Option<i32>,
{
    let Some(existing) = existing else {
        return UpsertDecision::Insert;
    };
    if existing == incoming {
        return UpsertDecision::Unchanged;
    }

    let rank = |source: &str| priority_of(source).map_or(i64::MAX, i64::from);
    if rank(&incoming.data_source) <= rank(&existing.data_source) {
        UpsertDecision::Replace
    } else {
        UpsertDecision::Reject
    }
}

/// Per-batch upsert counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

impl UpsertSummary {
    pub fn record(&mut self, decision: UpsertDecision) {
        match decision {
            UpsertDecision::Insert => self.inserted += 1,
            UpsertDecision::Replace => self.replaced += 1,
            UpsertDecision::Unchanged => self.unchanged += 1,
            UpsertDecision::Reject => self.rejected += 1,
        }
    }

    /// Rows that changed the store.
    pub fn written(&self) -> usize {
        self.inserted + self.replaced
    }
}

// =============================================================================
// Freshness
// =============================================================================

/// Latest value for an asset as served to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QuoteOutcome {
    /// Fresh from a provider.
    Live { quote: Quote },
    /// Every capable provider failed; this is the newest stored row.
    Stale { quote: Quote, age_days: i64 },
}

impl QuoteOutcome {
    pub fn stale(quote: Quote) -> Self {
        let age_days = quote.age_days(Utc::now().date_naive());
        QuoteOutcome::Stale { quote, age_days }
    }

    pub fn quote(&self) -> &Quote {
        match self {
            QuoteOutcome::Live { quote } | QuoteOutcome::Stale { quote, .. } => quote,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, QuoteOutcome::Stale { .. })
    }
}
