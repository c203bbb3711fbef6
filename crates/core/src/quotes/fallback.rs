//! Cross-provider failover.
//!
//! Providers are tried in the order the registry resolves for the asset. A
//! transient failure moves on to the next capable provider; a `NotFound` is
//! remembered per operation for the rest of the UTC day, so the provider is
//! not asked the same thing about that symbol again until tomorrow. When every provider fails, the latest
//! committed quote is served flagged stale.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use quotesync_market_data::{
    FetchDiagnostics, MarketDataError, ProviderRegistry, QuoteValidator, ResolvedProvider,
    SkipReason,
};

use super::model::{Quote, QuoteOutcome};
use super::store::QuoteStore;
use crate::assets::Asset;
use crate::errors::Result;

/// History fetched and validated from one provider.
#[derive(Debug, Clone)]
pub struct HistoryFetch {
    pub provider_id: String,
    /// Ascending by date, already attached to the asset.
    pub quotes: Vec<Quote>,
}

impl HistoryFetch {
    pub fn newest_date(&self) -> Option<NaiveDate> {
        self.quotes.iter().map(|q| q.date).max()
    }
}

pub struct FallbackResolver {
    registry: Arc<ProviderRegistry>,
    quote_store: Arc<dyn QuoteStore>,
    call_timeout: Duration,
    validator: QuoteValidator,
    /// `(operation, provider, symbol)` that returned NotFound, with the UTC day.
    known_misses: Mutex<HashMap<MissKey, NaiveDate>>,
}

impl FallbackResolver {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        quote_store: Arc<dyn QuoteStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            quote_store,
            call_timeout,
            validator: QuoteValidator::new(),
            known_misses: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch `[start, end]` for an asset from the first provider that answers
    /// with a valid response. Each provider's window is clipped to its
    /// lookback.
    pub async fn fetch_history(
        &self,
        asset: &Asset,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> std::result::Result<HistoryFetch, MarketDataError> {
        let instrument = asset.instrument();
        let validator = &self.validator;

        let (provider, rows) = self
            .run_chain(asset, "history", cancel, |provider| async move {
                let start = clip_start(start, end, provider.max_lookback_days);
                let rows = provider
                    .adapter
                    .historical_quotes(&instrument, start, end)
                    .await?;
                validator.validate_history(&provider.id, &rows, start, end)?;
                Ok(rows)
            })
            .await?;

        let quotes = rows
            .into_iter()
            .map(|row| Quote::from_provider(&asset.id, &provider.id, row))
            .collect();
        Ok(HistoryFetch {
            provider_id: provider.id,
            quotes,
        })
    }

    /// Latest value for an asset: live from a provider, or the newest stored
    /// row flagged stale when no provider could answer.
    pub async fn latest_quote(
        &self,
        asset: &Asset,
        cancel: &CancellationToken,
    ) -> Result<QuoteOutcome> {
        let instrument = asset.instrument();
        let validator = &self.validator;

        let fetched = self
            .run_chain(asset, "quote", cancel, |provider| async move {
                let quote = provider.adapter.latest_quote(&instrument).await?;
                validator.validate_quote(&provider.id, &quote)?;
                Ok(quote)
            })
            .await;

        match fetched {
            Ok((provider, quote)) => Ok(QuoteOutcome::Live {
                quote: Quote::from_provider(&asset.id, &provider.id, quote),
            }),
            Err(err) => match self.quote_store.latest(&asset.id)? {
                Some(cached) => {
                    let outcome = QuoteOutcome::stale(cached);
                    info!(
                        "Serving cached quote for {} ({}): {}",
                        asset.symbol,
                        outcome.quote().date,
                        err
                    );
                    Ok(outcome)
                }
                None => Err(err.into()),
            },
        }
    }

    /// Try each candidate provider in order until one call succeeds.
    async fn run_chain<T, F, Fut>(
        &self,
        asset: &Asset,
        operation: &str,
        cancel: &CancellationToken,
        call: F,
    ) -> std::result::Result<(ResolvedProvider, T), MarketDataError>
    where
        F: Fn(ResolvedProvider) -> Fut,
        Fut: Future<Output = std::result::Result<T, MarketDataError>>,
    {
        let instrument = asset.instrument();
        let candidates = self.registry.candidates(&instrument);
        if candidates.is_empty() {
            return Err(MarketDataError::NoProvidersAvailable(format!(
                "{} ({})",
                asset.symbol, asset.asset_type
            )));
        }

        let today = Utc::now().date_naive();
        let mut diagnostics = FetchDiagnostics::new();
        let mut last_transient: Option<MarketDataError> = None;
        let mut first_not_found: Option<MarketDataError> = None;
        let mut first_permanent: Option<MarketDataError> = None;

        for provider in candidates {
            if cancel.is_cancelled() {
                diagnostics.record_skip(&provider.id, SkipReason::Cancelled);
                debug!("{} {} cancelled: {}", operation, asset.symbol, diagnostics.summary());
                return Err(MarketDataError::Cancelled);
            }
            if self.is_known_miss(operation, &provider.id, &asset.symbol, today) {
                diagnostics.record_skip(&provider.id, SkipReason::KnownMissToday);
                first_not_found.get_or_insert_with(|| MarketDataError::NotFound {
                    provider: provider.id.clone(),
                    symbol: asset.symbol.clone(),
                });
                continue;
            }

            self.registry.throttle(&provider.id).await;
            let provider_id = provider.id.clone();
            let attempt = tokio::time::timeout(self.call_timeout, call(provider.clone()));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    diagnostics.record_skip(&provider_id, SkipReason::Cancelled);
                    debug!("{} {} cancelled: {}", operation, asset.symbol, diagnostics.summary());
                    return Err(MarketDataError::Cancelled);
                }
                res = attempt => res.unwrap_or_else(|_| Err(MarketDataError::Timeout {
                    provider: provider_id.clone(),
                })),
            };

            match result {
                Ok(value) => {
                    diagnostics.record_success(&provider_id);
                    debug!("{} {}: {}", operation, asset.symbol, diagnostics.summary());
                    return Ok((provider, value));
                }
                Err(err @ MarketDataError::NotSupported { .. }) => {
                    diagnostics.record_skip(&provider_id, SkipReason::NotSupported);
                    first_permanent.get_or_insert(err);
                }
                Err(err) => {
                    if matches!(err, MarketDataError::NotFound { .. }) {
                        self.remember_miss(operation, &provider_id, &asset.symbol, today);
                    }
                    diagnostics.record_error(&provider_id, &err);
                    if err.is_transient() {
                        last_transient = Some(err);
                    } else if matches!(err, MarketDataError::NotFound { .. }) {
                        first_not_found.get_or_insert(err);
                    } else {
                        first_permanent.get_or_insert(err);
                    }
                }
            }
        }

        warn!(
            "All providers failed for {} {}: {}",
            operation,
            asset.symbol,
            diagnostics.summary()
        );
        Err(last_transient
            .or(first_not_found)
            .or(first_permanent)
            .unwrap_or_else(|| MarketDataError::NoProvidersAvailable(asset.symbol.clone())))
    }

    fn is_known_miss(
        &self,
        operation: &str,
        provider_id: &str,
        symbol: &str,
        today: NaiveDate,
    ) -> bool {
        let misses = self.known_misses.lock().unwrap_or_else(|poisoned| {
            warn!("Known-miss cache lock was poisoned, recovering");
            poisoned.into_inner()
        });
        misses.get(&miss_key(operation, provider_id, symbol)) == Some(&today)
    }

    fn remember_miss(&self, operation: &str, provider_id: &str, symbol: &str, today: NaiveDate) {
        let mut misses = self.known_misses.lock().unwrap_or_else(|poisoned| {
            warn!("Known-miss cache lock was poisoned, recovering");
            poisoned.into_inner()
        });
        misses.retain(|_, day| *day == today);
        misses.insert(miss_key(operation, provider_id, symbol), today);
    }
}

type MissKey = (String, String, String);

fn miss_key(operation: &str, provider_id: &str, symbol: &str) -> MissKey {
    (
        operation.to_string(),
        provider_id.to_string(),
        symbol.to_ascii_uppercase(),
    )
}

fn clip_start(start: NaiveDate, end: NaiveDate, max_lookback_days: Option<i64>) -> NaiveDate {
    match max_lookback_days {
        Some(days) => start.max(end - ChronoDuration::days(days.max(0))),
        None => start,
    }
}
