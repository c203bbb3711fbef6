//! Regional market proxy provider.
//!
//! Reaches Vietnamese equities, open-ended funds and indices through a local
//! HTTP proxy that exposes one route family per asset class:
//!
//! - `GET /health`
//! - `GET /{class}/search/{symbol}`
//! - `GET /{class}/quote/{symbol}`
//! - `GET /{class}/history/{symbol}?start_date&end_date`
//!
//! Funds only publish a daily NAV, which is replicated into OHLC with zero
//! volume.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{
    decimal_from_f64, parse_day, AssetProfile, AssetType, InstrumentRef, ProviderKind, Quote,
};
use crate::provider::{CapabilitySet, MarketDataProvider};

pub use models::HealthResponse;
use models::{HistoryItem, HistoryResponse, QuoteResponse, SearchItem};

/// Where the proxy listens unless the provider row overrides it.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8765";

/// Commodity names the global providers own. Local gold series are not served.
const GLOBAL_SYMBOLS: &[&str] = &["GOLD", "SILVER", "OIL", "GAS", "COPPER", "PLATINUM"];

/// Index names served by the proxy.
pub const VN_INDICES: &[&str] = &["VNINDEX", "VN30", "HNX", "HNX30", "UPCOM", "VNXALL"];

/// Exchanges whose tickers are stored with a `.VN` suffix.
const VN_EXCHANGES: &[&str] = &["HOSE", "HSX", "HNX", "UPCOM"];

const SEARCH_CLASSES: [(&str, AssetType); 3] = [
    ("stocks", AssetType::Equity),
    ("funds", AssetType::Fund),
    ("indices", AssetType::Index),
];

pub struct VnMarketProvider {
    id: String,
    base_url: String,
    client: Client,
    capabilities: CapabilitySet,
}

impl VnMarketProvider {
    pub fn new(
        id: impl Into<String>,
        base_url: Option<&str>,
        capabilities: CapabilitySet,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        let id = id.into();
        // Loopback service; a system proxy would only get in the way.
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| {
                MarketDataError::InvalidConfiguration(format!(
                    "failed to build HTTP client for {}: {}",
                    id, e
                ))
            })?;

        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            id,
            base_url,
            client,
            capabilities,
        })
    }

    /// Proxy liveness check.
    pub async fn health(&self) -> Result<HealthResponse, MarketDataError> {
        let (health, _) = self.get_json::<HealthResponse>("/health", &[], "health").await?;
        Ok(health)
    }

    // ========================================================================
    // Symbol handling
    // ========================================================================

    /// Strip the `.VN` exchange suffix and upper-case.
    pub fn normalize_symbol(symbol: &str) -> String {
        let upper = symbol.trim().to_ascii_uppercase();
        upper
            .strip_suffix(".VN")
            .map(str::to_string)
            .unwrap_or(upper)
    }

    /// Whether a free-text query plausibly names a local instrument.
    pub fn should_search(query: &str) -> bool {
        let upper = query.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return false;
        }
        if upper.ends_with(".VN") || VN_INDICES.contains(&upper.as_str()) {
            return true;
        }
        if GLOBAL_SYMBOLS.contains(&upper.as_str()) {
            return false;
        }
        (2..=12).contains(&upper.len()) && upper.chars().all(|c| c.is_ascii_alphanumeric())
    }

    fn class_for(&self, asset_type: AssetType) -> Result<&'static str, MarketDataError> {
        match asset_type {
            AssetType::Equity => Ok("stocks"),
            AssetType::Fund => Ok("funds"),
            AssetType::Index => Ok("indices"),
            other => Err(MarketDataError::not_supported(
                &self.id,
                &format!("{} quotes", other),
            )),
        }
    }

    // ========================================================================
    // HTTP
    // ========================================================================

    /// GET a route and decode the body. Returns the value and an md5 digest of
    /// the raw payload for diagnostics.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<(T, String), MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} GET {}", self.id, url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MarketDataError::not_found(&self.id, symbol));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(MarketDataError::RateLimited {
                provider: self.id.clone(),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(MarketDataError::network(
                &self.id,
                format!("{} returned {}", path, status),
            ));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let payload_ref = format!("{:x}", md5::compute(body.as_bytes()));
        match serde_json::from_str::<T>(&body) {
            Ok(value) => Ok((value, payload_ref)),
            Err(e) => Err(self.invalid_payload(&payload_ref, &body, e.to_string())),
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> MarketDataError {
        if error.is_timeout() {
            MarketDataError::Timeout {
                provider: self.id.clone(),
            }
        } else {
            MarketDataError::network(&self.id, error.to_string())
        }
    }

    fn invalid_payload(&self, payload_ref: &str, body: &str, message: String) -> MarketDataError {
        warn!(
            "{} returned an undecodable payload [{}]: {}",
            self.id, payload_ref, message
        );
        debug!("{} payload [{}]: {}", self.id, payload_ref, body);
        MarketDataError::InvalidResponse {
            provider: self.id.clone(),
            message,
            payload_ref: payload_ref.to_string(),
        }
    }

    fn malformed(&self, payload_ref: &str, message: String) -> MarketDataError {
        warn!("{} payload [{}] rejected: {}", self.id, payload_ref, message);
        MarketDataError::InvalidResponse {
            provider: self.id.clone(),
            message,
            payload_ref: payload_ref.to_string(),
        }
    }

    // ========================================================================
    // Mapping
    // ========================================================================

    fn profile_from_search(&self, item: SearchItem, asset_type: AssetType, query: &str) -> AssetProfile {
        let bare = Self::normalize_symbol(&item.symbol);
        let qualified = match (&asset_type, item.exchange.as_deref()) {
            (AssetType::Equity, Some(exchange))
                if VN_EXCHANGES.contains(&exchange.to_ascii_uppercase().as_str()) =>
            {
                format!("{}.VN", bare)
            }
            _ => bare.clone(),
        };
        let score = if bare == Self::normalize_symbol(query) {
            1.0
        } else {
            0.7
        };

        AssetProfile::new(qualified, asset_type, item.currency, self.id.clone())
            .with_name(item.name)
            .with_exchange(item.exchange)
            .with_score(score)
            .with_meta("industry", item.industry)
            .with_meta("companyType", item.company_type)
            .with_meta("fundType", item.fund_type)
            .with_meta("managementCompany", item.management_company)
            .with_meta("inceptionDate", item.inception_date)
            .with_meta("navPerUnit", item.nav_per_unit)
    }

    fn map_history_item(
        &self,
        item: &HistoryItem,
        asset_type: AssetType,
        currency: &str,
        payload_ref: &str,
    ) -> Result<Quote, MarketDataError> {
        let date = parse_day(&item.date)
            .ok_or_else(|| self.malformed(payload_ref, format!("invalid date '{}'", item.date)))?;
        let to_decimal = |field: &str, value: f64| {
            decimal_from_f64(value)
                .ok_or_else(|| self.malformed(payload_ref, format!("{} {} on {}", field, value, date)))
        };

        if asset_type == AssetType::Fund {
            let nav = item
                .nav
                .or(item.close)
                .ok_or_else(|| self.malformed(payload_ref, format!("missing nav on {}", date)))?;
            return Ok(Quote::from_single_value(
                date,
                to_decimal("nav", nav)?,
                currency,
                self.id.clone(),
            ));
        }

        let close = item
            .close
            .ok_or_else(|| self.malformed(payload_ref, format!("missing close on {}", date)))?;
        let close = to_decimal("close", close)?;
        let or_close = |field: &str, value: Option<f64>| -> Result<Decimal, MarketDataError> {
            value.map_or(Ok(close), |v| to_decimal(field, v))
        };

        Ok(Quote {
            date,
            open: or_close("open", item.open)?,
            high: or_close("high", item.high)?,
            low: or_close("low", item.low)?,
            close,
            adjclose: or_close("adjclose", item.adjclose)?,
            volume: item
                .volume
                .map_or(Ok(Decimal::ZERO), |v| to_decimal("volume", v))?,
            currency: currency.to_string(),
            source: self.id.clone(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for VnMarketProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::VnMarket
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    async fn search(&self, query: &str) -> Result<Vec<AssetProfile>, MarketDataError> {
        let query = query.trim();
        if !Self::should_search(query) {
            return Err(MarketDataError::not_found(&self.id, query));
        }
        let symbol = Self::normalize_symbol(query);

        let mut results = Vec::new();
        let mut last_error = None;
        for (class, asset_type) in SEARCH_CLASSES {
            if !self.capabilities.supports_type(asset_type) {
                continue;
            }
            let path = format!("/{}/search/{}", class, encode(&symbol));
            match self.get_json::<SearchItem>(&path, &[], &symbol).await {
                Ok((item, _)) => results.push(self.profile_from_search(item, asset_type, query)),
                Err(MarketDataError::NotFound { .. }) => {}
                Err(e) => {
                    debug!("{} {} search for '{}' failed: {}", self.id, class, symbol, e);
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            return Err(last_error.unwrap_or_else(|| MarketDataError::not_found(&self.id, query)));
        }
        Ok(results)
    }

    async fn latest_quote(&self, instrument: &InstrumentRef<'_>) -> Result<Quote, MarketDataError> {
        let class = self.class_for(instrument.asset_type)?;
        let symbol = Self::normalize_symbol(instrument.symbol);
        let path = format!("/{}/quote/{}", class, encode(&symbol));

        let (response, payload_ref) = self.get_json::<QuoteResponse>(&path, &[], &symbol).await?;
        let date = parse_day(&response.date).ok_or_else(|| {
            self.malformed(&payload_ref, format!("invalid date '{}'", response.date))
        })?;
        let raw = if instrument.asset_type == AssetType::Fund {
            response.nav.or(response.close)
        } else {
            response.close.or(response.nav)
        };
        let value = raw
            .ok_or_else(|| self.malformed(&payload_ref, format!("no price for {}", response.symbol)))?;
        let value = decimal_from_f64(value)
            .ok_or_else(|| self.malformed(&payload_ref, format!("price {} is not a number", value)))?;

        // The quote route only reports a single value per day.
        Ok(Quote::from_single_value(
            date,
            value,
            response.currency,
            self.id.clone(),
        ))
    }

    async fn historical_quotes(
        &self,
        instrument: &InstrumentRef<'_>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let class = self.class_for(instrument.asset_type)?;
        let symbol = Self::normalize_symbol(instrument.symbol);
        let path = format!("/{}/history/{}", class, encode(&symbol));
        let query = [
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ];

        // The proxy answers 404 for a window with no rows as well as for an
        // unknown symbol. Assets are checked at creation, so read it as empty.
        let (response, payload_ref) = match self.get_json::<HistoryResponse>(&path, &query, &symbol).await {
            Ok(found) => found,
            Err(MarketDataError::NotFound { .. }) => {
                debug!("{} has no history for {} ({} to {})", self.id, symbol, start, end);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        debug!(
            "{} returned {} rows for {} ({} to {})",
            self.id,
            response.history.len(),
            response.symbol,
            start,
            end
        );

        let mut quotes = response
            .history
            .iter()
            .map(|item| self.map_history_item(item, instrument.asset_type, &response.currency, &payload_ref))
            .collect::<Result<Vec<_>, _>>()?;
        quotes.sort_by_key(|q| q.date);
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Capability;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn capabilities() -> CapabilitySet {
        CapabilitySet::compile(&[
            Capability::new(AssetType::Equity, r"^[A-Z0-9]{3}(\.VN)?$"),
            Capability::new(AssetType::Fund, r"^[A-Z0-9]{2,12}$"),
            Capability::new(AssetType::Index, r"^(VNINDEX|VN30|HNX|HNX30|UPCOM|VNXALL)$"),
        ])
        .unwrap()
    }

    fn provider(url: &str) -> VnMarketProvider {
        VnMarketProvider::new("VN_MARKET", Some(url), capabilities(), Duration::from_secs(5)).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(VnMarketProvider::normalize_symbol("fpt.vn"), "FPT");
        assert_eq!(VnMarketProvider::normalize_symbol("VESAF"), "VESAF");
    }

    #[test]
    fn test_should_search() {
        assert!(VnMarketProvider::should_search("FPT"));
        assert!(VnMarketProvider::should_search("fpt.vn"));
        assert!(VnMarketProvider::should_search("VN30"));
        assert!(!VnMarketProvider::should_search("VN_GOLD"));
        assert!(!VnMarketProvider::should_search("GOLD"));
        assert!(!VnMarketProvider::should_search("Apple Inc"));
        assert!(!VnMarketProvider::should_search(""));
    }

    #[tokio::test]
    async fn test_fund_history_replicates_nav() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/funds/history/VESAF")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start_date".into(), "2024-10-25".into()),
                Matcher::UrlEncoded("end_date".into(), "2024-10-26".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"symbol":"VESAF","history":[
                    {"date":"2024-10-26","nav":15234.56},
                    {"date":"2024-10-25","nav":15200.0}
                ],"currency":"VND","data_source":"VN_MARKET"}"#,
            )
            .create_async()
            .await;

        let instrument = InstrumentRef::new("VESAF", AssetType::Fund, "VND");
        let quotes = provider(&server.url())
            .historical_quotes(&instrument, day(2024, 10, 25), day(2024, 10, 26))
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].date, day(2024, 10, 25));
        let q = &quotes[1];
        assert_eq!(q.date, day(2024, 10, 26));
        assert_eq!(q.open, dec!(15234.56));
        assert_eq!(q.high, dec!(15234.56));
        assert_eq!(q.low, dec!(15234.56));
        assert_eq!(q.close, dec!(15234.56));
        assert_eq!(q.volume, Decimal::ZERO);
        assert_eq!(q.source, "VN_MARKET");
    }

    #[tokio::test]
    async fn test_stock_history_defaults_missing_fields_to_close() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/stocks/history/FPT")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"symbol":"FPT","history":[
                    {"date":"2024-01-02","open":95.1,"high":96.0,"low":94.5,"close":95.8,"volume":1200300},
                    {"date":"2024-01-03","close":96.2}
                ]}"#,
            )
            .create_async()
            .await;

        let instrument = InstrumentRef::new("FPT.VN", AssetType::Equity, "VND");
        let quotes = provider(&server.url())
            .historical_quotes(&instrument, day(2024, 1, 2), day(2024, 1, 3))
            .await
            .unwrap();

        assert_eq!(quotes[0].volume, dec!(1200300));
        assert_eq!(quotes[0].low, dec!(94.5));
        assert_eq!(quotes[1].open, dec!(96.2));
        assert_eq!(quotes[1].volume, Decimal::ZERO);
        assert_eq!(quotes[1].currency, "VND");
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/stocks/quote/ZZZ")
            .with_status(404)
            .with_body(r#"{"detail":"Stock ZZZ not found"}"#)
            .create_async()
            .await;

        let instrument = InstrumentRef::new("ZZZ.VN", AssetType::Equity, "VND");
        let err = provider(&server.url()).latest_quote(&instrument).await.unwrap_err();
        assert!(matches!(err, MarketDataError::NotFound { ref symbol, .. } if symbol == "ZZZ"));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_history_404_is_empty_window() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/funds/history/VESAF")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"detail":"No history found for VESAF"}"#)
            .create_async()
            .await;

        let instrument = InstrumentRef::new("VESAF", AssetType::Fund, "VND");
        let quotes = provider(&server.url())
            .historical_quotes(&instrument, day(2024, 10, 26), day(2024, 10, 27))
            .await
            .unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_5xx_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/indices/quote/VNINDEX")
            .with_status(503)
            .create_async()
            .await;

        let instrument = InstrumentRef::new("VNINDEX", AssetType::Index, "VND");
        let err = provider(&server.url()).latest_quote(&instrument).await.unwrap_err();
        assert!(matches!(err, MarketDataError::Network { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_429_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/funds/quote/VESAF")
            .with_status(429)
            .with_header("retry-after", "12")
            .create_async()
            .await;

        let instrument = InstrumentRef::new("VESAF", AssetType::Fund, "VND");
        let err = provider(&server.url()).latest_quote(&instrument).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_schema_mismatch_references_payload() {
        let body = r#"{"symbol":"VESAF","rows":[]}"#;
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/funds/history/VESAF")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let instrument = InstrumentRef::new("VESAF", AssetType::Fund, "VND");
        let err = provider(&server.url())
            .historical_quotes(&instrument, day(2024, 1, 1), day(2024, 1, 31))
            .await
            .unwrap_err();

        match err {
            MarketDataError::InvalidResponse { payload_ref, .. } => {
                assert_eq!(payload_ref, format!("{:x}", md5::compute(body.as_bytes())));
            }
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fund_quote_uses_nav() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/funds/quote/VESAF")
            .with_status(200)
            .with_body(r#"{"symbol":"VESAF","nav":15234.56,"date":"2024-10-26","currency":"VND"}"#)
            .create_async()
            .await;

        let instrument = InstrumentRef::new("VESAF", AssetType::Fund, "VND");
        let quote = provider(&server.url()).latest_quote(&instrument).await.unwrap();
        assert_eq!(quote.date, day(2024, 10, 26));
        assert_eq!(quote.close, dec!(15234.56));
        assert_eq!(quote.high, dec!(15234.56));
        assert_eq!(quote.volume, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_search_collects_class_hits() {
        let mut server = mockito::Server::new_async().await;
        let _stocks = server
            .mock("GET", "/stocks/search/FPT")
            .with_status(200)
            .with_body(
                r#"{"symbol":"FPT","company_name":"FPT Corporation","exchange":"HOSE","industry":"Technology"}"#,
            )
            .create_async()
            .await;
        let _funds = server
            .mock("GET", "/funds/search/FPT")
            .with_status(404)
            .create_async()
            .await;
        let _indices = server
            .mock("GET", "/indices/search/FPT")
            .with_status(404)
            .create_async()
            .await;

        let results = provider(&server.url()).search("fpt").await.unwrap();
        assert_eq!(results.len(), 1);
        let profile = &results[0];
        assert_eq!(profile.symbol, "FPT.VN");
        assert_eq!(profile.asset_type, AssetType::Equity);
        assert_eq!(profile.name.as_deref(), Some("FPT Corporation"));
        assert_eq!(profile.currency, "VND");
        assert_eq!(profile.metadata.get("industry").and_then(|v| v.as_str()), Some("Technology"));
        assert_eq!(profile.score, 1.0);
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"healthy","service":"vn-market-service","version":"1.0.0"}"#)
            .create_async()
            .await;

        let health = provider(&server.url()).health().await.unwrap();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_unsupported_class() {
        let provider = provider("http://127.0.0.1:9");
        let instrument = InstrumentRef::new("BTC-USD", AssetType::Crypto, "USD");
        let err = provider.latest_quote(&instrument).await.unwrap_err();
        assert!(matches!(err, MarketDataError::NotSupported { .. }));
    }
}
