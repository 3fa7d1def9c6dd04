//! Price series loader: one bounded worker per ticker, joined before any
//! analysis runs.
//!
//! Each worker owns its ticker's slot and returns either a `PriceSeries` or a
//! `FetchFailure`; a failure never touches the other slots. Handles are
//! awaited in input order, so the report preserves the caller's ticker order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, PriceCache};
use crate::error::{FetchFailure, NameResolutionFailure};
use crate::models::{DateRange, PriceSeries, TickerInfo, TickerWarning};
use crate::provider::PriceHistoryProvider;

/// What happened to one requested ticker.
#[derive(Debug)]
pub struct TickerOutcome {
    pub info: TickerInfo,
    pub result: Result<PriceSeries, FetchFailure>,
    pub name_error: Option<NameResolutionFailure>,
}

impl TickerOutcome {
    fn failed(ticker: String, failure: FetchFailure) -> Self {
        Self {
            info: TickerInfo {
                symbol: ticker.clone(),
                name: ticker,
            },
            result: Err(failure),
            name_error: None,
        }
    }
}

/// Per-ticker outcomes in request order.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub outcomes: Vec<TickerOutcome>,
}

impl LoadReport {
    /// Successfully loaded series, in request order.
    pub fn series(&self) -> Vec<PriceSeries> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect()
    }

    /// Display info for the tickers that loaded.
    pub fn loaded_tickers(&self) -> Vec<TickerInfo> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.info.clone())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &FetchFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.info.symbol.as_str(), e)))
    }

    pub fn warnings(&self) -> Vec<TickerWarning> {
        self.failures()
            .map(|(ticker, e)| TickerWarning {
                ticker: ticker.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

pub struct PriceLoader {
    provider: Arc<dyn PriceHistoryProvider>,
    cache: Arc<dyn PriceCache>,
    concurrency: usize,
    resolve_names: bool,
}

impl PriceLoader {
    pub fn new(provider: Arc<dyn PriceHistoryProvider>, cache: Arc<dyn PriceCache>) -> Self {
        Self {
            provider,
            cache,
            concurrency: 4,
            resolve_names: true,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_name_resolution(mut self, enabled: bool) -> Self {
        self.resolve_names = enabled;
        self
    }

    /// Fetch every ticker over `range`. Never fails as a whole; inspect the
    /// report for per-ticker failures.
    pub async fn load(&self, tickers: &[String], range: DateRange) -> LoadReport {
        info!(
            "Loading {} tickers from {} ({} → {})",
            tickers.len(),
            self.provider.name(),
            range.start,
            range.end
        );

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(tickers.len());

        for ticker in tickers {
            let symbol = ticker.clone();
            let provider = Arc::clone(&self.provider);
            let cache = Arc::clone(&self.cache);
            let sem = Arc::clone(&sem);
            let resolve_names = self.resolve_names;

            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return TickerOutcome::failed(symbol, FetchFailure::Task(e.to_string())),
                };

                let result = fetch_one(provider.as_ref(), cache.as_ref(), &symbol, range).await;

                let (name, name_error) = if resolve_names && result.is_ok() {
                    match provider.resolve_name(&symbol).await {
                        Ok(name) => (name, None),
                        Err(e) => (symbol.clone(), Some(e)),
                    }
                } else {
                    (symbol.clone(), None)
                };

                TickerOutcome {
                    info: TickerInfo { symbol, name },
                    result,
                    name_error,
                }
            });

            handles.push((ticker.clone(), handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (ticker, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Task panic for {}: {}", ticker, e);
                    TickerOutcome::failed(ticker, FetchFailure::Task(e.to_string()))
                }
            };

            match &outcome.result {
                Ok(series) => info!(
                    "{}: {} closes ({:?} → {:?})",
                    outcome.info.symbol,
                    series.len(),
                    series.first_date(),
                    series.last_date()
                ),
                Err(e) => warn!("{}: {}", outcome.info.symbol, e),
            }
            if let Some(e) = &outcome.name_error {
                warn!("{}; showing identifier", e);
            }

            outcomes.push(outcome);
        }

        LoadReport { outcomes }
    }
}

async fn fetch_one(
    provider: &dyn PriceHistoryProvider,
    cache: &dyn PriceCache,
    ticker: &str,
    range: DateRange,
) -> Result<PriceSeries, FetchFailure> {
    let key = CacheKey::new(ticker, range);
    if let Some(series) = cache.get(&key) {
        return Ok(series);
    }

    let points = provider.fetch_daily_closes(ticker, range).await?;
    let points: Vec<_> = points.into_iter().filter(|p| range.contains(p.date)).collect();
    if points.is_empty() {
        return Err(FetchFailure::DataUnavailable {
            ticker: ticker.to_string(),
            start: range.start,
            end: range.end,
        });
    }

    let series = PriceSeries::new(ticker, points);
    debug!("{}: caching {} closes", ticker, series.len());
    cache.put(key, series.clone());
    Ok(series)
}
