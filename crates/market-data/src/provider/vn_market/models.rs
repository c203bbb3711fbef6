//! Wire types for the regional market proxy.

use serde::{Deserialize, Serialize};

fn default_currency() -> String {
    "VND".to_string()
}

/// `GET /{class}/search/{symbol}`
///
/// Each asset class names its display field differently, so the aliases fold
/// them into `name`.
#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub symbol: String,
    #[serde(alias = "company_name", alias = "fund_name", alias = "index_name")]
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub industry: Option<String>,
    pub company_type: Option<String>,
    pub fund_type: Option<String>,
    pub management_company: Option<String>,
    pub inception_date: Option<String>,
    pub nav_per_unit: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// `GET /{class}/quote/{symbol}`; funds report `nav`, the rest `close`.
#[derive(Debug, Deserialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub close: Option<f64>,
    pub nav: Option<f64>,
    pub date: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryItem {
    pub date: String,
    pub nav: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjclose: Option<f64>,
    pub volume: Option<f64>,
}

/// `GET /{class}/history/{symbol}?start_date&end_date`
#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub history: Vec<HistoryItem>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
