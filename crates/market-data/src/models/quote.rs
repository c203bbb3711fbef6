use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day of market data in the canonical schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub adjclose: Decimal,
    pub volume: Decimal,
    pub currency: String,
    /// Provider id that produced the row.
    pub source: String,
}

impl Quote {
    /// Map a single daily value (e.g. a fund NAV) into OHLC.
    ///
    /// The value is replicated across open/high/low/close/adjclose and volume
    /// is zero. Every fund adapter goes through here.
    pub fn from_single_value(
        date: NaiveDate,
        value: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            date,
            open: value,
            high: value,
            low: value,
            close: value,
            adjclose: value,
            volume: Decimal::ZERO,
            currency: currency.into(),
            source: source.into(),
        }
    }
}

/// Convert a JSON float into a Decimal using its shortest round-trip form,
/// so `15234.56` stays `15234.56`. Non-finite values yield `None`.
pub(crate) fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Parse a provider date, accepting `YYYY-MM-DD` with or without a time part.
pub(crate) fn parse_day(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}
