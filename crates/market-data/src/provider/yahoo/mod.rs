//! Yahoo Finance market data provider.
//!
//! General international coverage:
//! - Equities/ETFs (e.g., AAPL, SHOP.TO)
//! - Indices (e.g., ^GSPC)
//! - Cryptocurrencies (e.g., BTC-USD)
//! - Foreign exchange rates (e.g., EURUSD=X)

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveTime, TimeZone, Utc};
use futures::future::join_all;
use log::{debug, warn};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{decimal_from_f64, AssetProfile, AssetType, InstrumentRef, ProviderKind, Quote};
use crate::provider::{CapabilitySet, MarketDataProvider};

pub struct YahooProvider {
    id: String,
    connector: yahoo::YahooConnector,
    capabilities: CapabilitySet,
}

impl YahooProvider {
    pub fn new(id: impl Into<String>, capabilities: CapabilitySet) -> Result<Self, MarketDataError> {
        let id = id.into();
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::InvalidConfiguration(format!(
                "failed to initialize Yahoo connector for {}: {}",
                id, e
            ))
        })?;
        Ok(Self {
            id,
            connector,
            capabilities,
        })
    }

    fn map_error(&self, symbol: &str, error: yahoo::YahooError) -> MarketDataError {
        match error {
            yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult => {
                MarketDataError::not_found(&self.id, symbol)
            }
            other => MarketDataError::network(&self.id, other.to_string()),
        }
    }

    fn day_start(day: NaiveDate) -> OffsetDateTime {
        let ts = day.and_time(NaiveTime::MIN).and_utc().timestamp();
        OffsetDateTime::from_unix_timestamp(ts).unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    /// Trading currency of a listing, from its chart metadata.
    async fn listing_currency(&self, symbol: &str) -> Option<String> {
        let meta = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .and_then(|response| response.metadata());
        match meta {
            Ok(meta) => meta.currency.filter(|c| !c.trim().is_empty()),
            Err(e) => {
                debug!("{} could not resolve the currency of {}: {}", self.id, symbol, e);
                None
            }
        }
    }
}

/// Yahoo `quoteType` to our classification.
fn map_quote_type(quote_type: &str) -> Option<AssetType> {
    match quote_type.to_ascii_uppercase().as_str() {
        "EQUITY" | "ETF" => Some(AssetType::Equity),
        "MUTUALFUND" => Some(AssetType::Fund),
        "INDEX" => Some(AssetType::Index),
        "CURRENCY" => Some(AssetType::Forex),
        "CRYPTOCURRENCY" => Some(AssetType::Crypto),
        _ => None,
    }
}

/// Profile for one search hit. An unresolved currency stays empty.
fn hit_profile(
    provider_id: &str,
    item: &yahoo::YQuoteItem,
    asset_type: AssetType,
    currency: Option<String>,
) -> AssetProfile {
    let name = if item.long_name.is_empty() {
        item.short_name.clone()
    } else {
        item.long_name.clone()
    };
    AssetProfile::new(
        item.symbol.clone(),
        asset_type,
        currency.unwrap_or_default(),
        provider_id,
    )
    .with_name(Some(name))
    .with_exchange(Some(item.exchange.clone()))
    .with_score(item.score)
}

/// Reads one chart bar, dated in exchange time.
///
/// The chart API reports a missing open, high, low or adjusted close as zero;
/// those take the close. Anything non-finite fails the bar.
fn bar_to_quote(
    provider_id: &str,
    symbol: &str,
    bar: &yahoo::Quote,
    utc_offset: i32,
    currency: &str,
) -> Result<Quote, MarketDataError> {
    let invalid = |message: String| MarketDataError::InvalidResponse {
        provider: provider_id.to_string(),
        message,
        payload_ref: format!("{}@{}", symbol, bar.timestamp),
    };

    let date = Utc
        .timestamp_opt(bar.timestamp + i64::from(utc_offset), 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| invalid(format!("bad timestamp for {}", symbol)))?;
    let close = decimal_from_f64(bar.close)
        .ok_or_else(|| invalid(format!("unusable close {} for {} on {}", bar.close, symbol, date)))?;
    let or_close = |field: &str, value: f64| -> Result<Decimal, MarketDataError> {
        if value == 0.0 {
            return Ok(close);
        }
        decimal_from_f64(value)
            .ok_or_else(|| invalid(format!("unusable {} {} for {} on {}", field, value, symbol, date)))
    };

    Ok(Quote {
        date,
        open: or_close("open", bar.open)?,
        high: or_close("high", bar.high)?,
        low: or_close("low", bar.low)?,
        close,
        adjclose: or_close("adjclose", bar.adjclose)?,
        volume: Decimal::from(bar.volume),
        currency: currency.to_string(),
        source: provider_id.to_string(),
    })
}

/// Converts the bars of one history response, in the order Yahoo sent them.
///
/// `sent` is how many timestamps the response carried; the library silently
/// skips bars without a close, so fewer bars than that fails the response.
/// A bar dated the day before `start` is the previous session leaking across
/// `period1` and is dropped. Everything else, including rows past the window
/// or repeated dates, is left for validation.
fn history_rows(
    provider_id: &str,
    symbol: &str,
    bars: &[yahoo::Quote],
    sent: usize,
    utc_offset: i32,
    currency: &str,
    start: NaiveDate,
) -> Result<Vec<Quote>, MarketDataError> {
    if bars.len() < sent {
        return Err(MarketDataError::InvalidResponse {
            provider: provider_id.to_string(),
            message: format!(
                "{} of {} bars for {} have no close",
                sent - bars.len(),
                sent,
                symbol
            ),
            payload_ref: format!("{}@{}", symbol, start),
        });
    }

    let leaked_day = start.pred_opt();
    let mut rows = Vec::with_capacity(bars.len());
    for bar in bars {
        let quote = bar_to_quote(provider_id, symbol, bar, utc_offset, currency)?;
        if Some(quote.date) == leaked_day {
            debug!("Dropping {} bar for {} before the window", quote.date, symbol);
            continue;
        }
        rows.push(quote);
    }
    Ok(rows)
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Yahoo
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn search(&self, query: &str) -> Result<Vec<AssetProfile>, MarketDataError> {
        debug!("Searching {} for '{}'", self.id, query);
        let result = self
            .connector
            .search_ticker(query)
            .await
            .map_err(|e| self.map_error(query, e))?;

        let hits: Vec<(&yahoo::YQuoteItem, AssetType)> = result
            .quotes
            .iter()
            .filter_map(|item| map_quote_type(&item.quote_type).map(|t| (item, t)))
            .collect();
        let currencies =
            join_all(hits.iter().map(|(item, _)| self.listing_currency(&item.symbol))).await;

        let profiles: Vec<AssetProfile> = hits
            .into_iter()
            .zip(currencies)
            .map(|((item, asset_type), currency)| hit_profile(&self.id, item, asset_type, currency))
            .collect();

        if profiles.is_empty() {
            return Err(MarketDataError::not_found(&self.id, query));
        }
        Ok(profiles)
    }

    async fn latest_quote(&self, instrument: &InstrumentRef<'_>) -> Result<Quote, MarketDataError> {
        let symbol = instrument.symbol;
        let response = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| self.map_error(symbol, e))?;

        let raw = response.last_quote().map_err(|e| {
            warn!("No quotes returned for {}: {}", symbol, e);
            MarketDataError::not_found(&self.id, symbol)
        })?;

        let utc_offset = response.metadata().map(|m| m.gmtoffset).unwrap_or(0);
        bar_to_quote(&self.id, symbol, &raw, utc_offset, instrument.currency)
    }

    async fn historical_quotes(
        &self,
        instrument: &InstrumentRef<'_>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let symbol = instrument.symbol;
        let until = end.checked_add_days(Days::new(1)).unwrap_or(end);

        let response = self
            .connector
            .get_quote_history(symbol, Self::day_start(start), Self::day_start(until))
            .await
            .map_err(|e| self.map_error(symbol, e))?;

        let raw_quotes = match response.quotes() {
            Ok(quotes) => quotes,
            // An empty window (weekend, holiday) is not an error.
            Err(yahoo::YahooError::NoQuotes) => return Ok(Vec::new()),
            Err(e) => return Err(self.map_error(symbol, e)),
        };

        let sent = response
            .chart
            .result
            .as_ref()
            .and_then(|blocks| blocks.first())
            .and_then(|block| block.timestamp.as_ref())
            .map_or(raw_quotes.len(), Vec::len);
        let utc_offset = response.metadata().map(|m| m.gmtoffset).unwrap_or(0);

        history_rows(&self.id, symbol, &raw_quotes, sent, utc_offset, instrument.currency, start)
            .map_err(|e| {
                warn!("Rejecting {} history for {}: {}", self.id, symbol, e);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// Bar stamped at 14:30 UTC, the New York open.
    fn bar(d: u32, close: f64) -> yahoo::Quote {
        yahoo::Quote {
            timestamp: day(d).and_hms_opt(14, 30, 0).unwrap().and_utc().timestamp(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            volume: 1_000,
            close,
            adjclose: close,
        }
    }

    fn rows(bars: &[yahoo::Quote], start: NaiveDate) -> Result<Vec<Quote>, MarketDataError> {
        history_rows("YAHOO", "AAPL", bars, bars.len(), -18_000, "USD", start)
    }

    #[test]
    fn test_map_quote_type() {
        assert_eq!(map_quote_type("equity"), Some(AssetType::Equity));
        assert_eq!(map_quote_type("ETF"), Some(AssetType::Equity));
        assert_eq!(map_quote_type("CRYPTOCURRENCY"), Some(AssetType::Crypto));
        assert_eq!(map_quote_type("FUTURE"), None);
    }

    #[test]
    fn test_hit_profile_currency_is_never_invented() {
        let item = yahoo::YQuoteItem {
            exchange: "TOR".to_string(),
            short_name: "Shopify".to_string(),
            quote_type: "EQUITY".to_string(),
            symbol: "SHOP.TO".to_string(),
            index: "quotes".to_string(),
            score: 20.0,
            type_display: "Equity".to_string(),
            long_name: String::new(),
            is_yahoo_finance: true,
        };

        let known = hit_profile("YAHOO", &item, AssetType::Equity, Some("CAD".to_string()));
        assert_eq!(known.currency, "CAD");
        assert_eq!(known.name.as_deref(), Some("Shopify"));

        let unknown = hit_profile("YAHOO", &item, AssetType::Equity, None);
        assert_eq!(unknown.currency, "");
    }

    #[test]
    fn test_history_rows_keep_order_and_fill_missing_fields() {
        let mut second = bar(3, 11.0);
        second.high = 0.0;
        second.adjclose = 0.0;

        let quotes = rows(&[bar(2, 10.0), second], day(2)).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].date, day(2));
        assert_eq!(quotes[0].low, dec!(8));
        assert_eq!(quotes[1].high, dec!(11));
        assert_eq!(quotes[1].adjclose, dec!(11));
        assert_eq!(quotes[1].currency, "USD");
        assert_eq!(quotes[1].source, "YAHOO");
    }

    #[test]
    fn test_unusable_bar_fails_whole_response() {
        let mut broken = bar(3, 11.0);
        broken.close = f64::NAN;

        let err = rows(&[bar(2, 10.0), broken, bar(4, 12.0)], day(2)).unwrap_err();
        assert!(
            matches!(err, MarketDataError::InvalidResponse { ref payload_ref, .. } if payload_ref.starts_with("AAPL@"))
        );

        let mut broken = bar(3, 11.0);
        broken.low = f64::INFINITY;
        assert!(rows(&[broken], day(2)).is_err());
    }

    #[test]
    fn test_bars_skipped_by_library_fail_response() {
        let bars = [bar(2, 10.0), bar(4, 12.0)];
        let err = history_rows("YAHOO", "AAPL", &bars, 3, -18_000, "USD", day(2)).unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidResponse { .. }));
    }

    #[test]
    fn test_only_previous_session_is_clipped() {
        // Duplicates and rows outside the window reach validation untouched.
        let bars = [bar(1, 9.0), bar(2, 10.0), bar(2, 10.5), bar(9, 13.0)];
        let quotes = rows(&bars, day(2)).unwrap();

        let dates: Vec<NaiveDate> = quotes.iter().map(|q| q.date).collect();
        assert_eq!(dates, vec![day(2), day(2), day(9)]);
        assert_eq!(quotes[1].close, dec!(10.5));
    }

    #[test]
    fn test_bar_date_uses_exchange_offset() {
        // 17:00 UTC on the 1st is midnight of the 2nd in Ho Chi Minh City.
        let mut hcm = bar(1, 10.0);
        hcm.timestamp = day(1).and_hms_opt(17, 0, 0).unwrap().and_utc().timestamp();

        let quote = bar_to_quote("YAHOO", "VNM", &hcm, 25_200, "VND").unwrap();
        assert_eq!(quote.date, day(2));
    }
}
