//! Pipeline orchestrator: ties loader → analytics together.
//!
//! ## Stages
//!
//!   1. Load closes for every ticker over the window plus a lookback buffer
//!      (concurrent, failures isolated per ticker)
//!   2. Align on date, compute daily returns, clip to the requested window
//!   3. Weighted portfolio return, cumulative growth, per-ticker growth
//!   4. Drawdown, max drawdown, contribution ranking
//!
//! Stage 2 starts only after every fetch has finished. Any batch-level failure
//! stops the run before a report exists, so nothing partial is rendered.

use crate::analytics::{
    EqualWeight, WeightingScheme, aggregate, align_prices, clip_to_window, compute_returns,
    drawdown, max_drawdown, per_ticker_growth, rank_contributions,
};
use crate::cache::PriceCache;
use crate::config::{AlignmentPolicy, AppConfig};
use crate::error::PipelineError;
use crate::loader::{LoadReport, PriceLoader};
use crate::models::{DateRange, PortfolioReport, PriceSeries, TickerInfo, TickerWarning};
use crate::provider::PriceHistoryProvider;
use std::sync::Arc;
use tracing::info;

/// One backtest invocation: ordered tickers and the user-visible window.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub tickers: Vec<String>,
    pub window: DateRange,
}

impl BacktestRequest {
    pub fn new(tickers: Vec<String>, window: DateRange) -> Result<Self, PipelineError> {
        if tickers.is_empty() {
            return Err(PipelineError::NoTickers);
        }
        Ok(Self { tickers, window })
    }
}

pub struct Pipeline {
    loader: PriceLoader,
    lookback_days: u32,
    alignment: AlignmentPolicy,
    weighting: Box<dyn WeightingScheme>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn PriceHistoryProvider>,
        cache: Arc<dyn PriceCache>,
    ) -> Self {
        let loader = PriceLoader::new(provider, cache)
            .with_concurrency(config.pipeline.concurrency)
            .with_name_resolution(config.pipeline.resolve_names);

        Self {
            loader,
            lookback_days: config.pipeline.lookback_days,
            alignment: config.pipeline.alignment,
            weighting: Box::new(EqualWeight),
        }
    }

    /// Fetch range: the window with the lookback buffer in front.
    pub fn fetch_range(&self, window: &DateRange) -> DateRange {
        window.with_lookback(self.lookback_days)
    }

    /// Stage 1 only.
    pub async fn load(&self, request: &BacktestRequest) -> LoadReport {
        self.loader
            .load(&request.tickers, self.fetch_range(&request.window))
            .await
    }

    pub async fn run(&self, request: &BacktestRequest) -> Result<PortfolioReport, PipelineError> {
        info!("=== Step 1: Loading price history ===");
        let loaded = self.load(request).await;

        info!("=== Step 2: Aligning {} series ===", loaded.loaded_count());
        let report = self.analyse(
            &loaded.series(),
            loaded.loaded_tickers(),
            loaded.warnings(),
            &request.window,
        )?;

        info!(
            "=== Done: {} tickers | {} days | total {:+.2}% | max drawdown {:.2}% ===",
            report.tickers.len(),
            report.dates.len(),
            report.total_return * 100.0,
            report.max_drawdown.depth * 100.0,
        );

        Ok(report)
    }

    /// Stages 2–4 over already-loaded series. Pure and synchronous.
    pub fn analyse(
        &self,
        series: &[PriceSeries],
        names: Vec<TickerInfo>,
        warnings: Vec<TickerWarning>,
        window: &DateRange,
    ) -> Result<PortfolioReport, PipelineError> {
        let prices = align_prices(series, self.alignment)?;
        let returns = clip_to_window(compute_returns(&prices), window)?;

        info!(
            "=== Step 3: Aggregating {} days ({}) ===",
            returns.dates.len(),
            self.weighting.name()
        );
        let portfolio = aggregate(&returns, self.weighting.as_ref());
        let per_ticker = per_ticker_growth(&returns);

        info!("=== Step 4: Drawdown and ranking ===");
        let dd = drawdown(&portfolio.growth);
        let max_dd = max_drawdown(&portfolio.dates, &dd);
        let ranking = rank_contributions(&per_ticker, &names);
        let total_return = portfolio.growth.last().map(|g| g - 1.0).unwrap_or(0.0);

        Ok(PortfolioReport {
            window: *window,
            tickers: names,
            dates: portfolio.dates,
            portfolio_returns: portfolio.returns,
            cumulative_growth: portfolio.growth,
            drawdown: dd,
            per_ticker,
            ranking,
            total_return,
            max_drawdown: max_dd,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoCache;
    use crate::error::{FetchFailure, NameResolutionFailure};
    use crate::models::PricePoint;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    struct FixedProvider(HashMap<&'static str, Vec<PricePoint>>);

    #[async_trait]
    impl PriceHistoryProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_daily_closes(
            &self,
            ticker: &str,
            _range: DateRange,
        ) -> Result<Vec<PricePoint>, FetchFailure> {
            self.0
                .get(ticker)
                .cloned()
                .ok_or_else(|| FetchFailure::Api("no such ticker".into()))
        }

        async fn resolve_name(&self, ticker: &str) -> Result<String, NameResolutionFailure> {
            Ok(format!("Name {}", ticker))
        }
    }

    fn pipeline(provider: FixedProvider) -> Pipeline {
        Pipeline::new(&AppConfig::default(), Arc::new(provider), Arc::new(NoCache))
    }

    fn provider() -> FixedProvider {
        let mut data = HashMap::new();
        // Jan 5 is a lookback day; the window starts Jan 8
        data.insert(
            "A",
            vec![
                PricePoint::new(d(1, 5), 100.0),
                PricePoint::new(d(1, 8), 110.0),
                PricePoint::new(d(1, 9), 99.0),
                PricePoint::new(d(1, 10), 108.9),
            ],
        );
        data.insert(
            "B",
            vec![
                PricePoint::new(d(1, 5), 50.0),
                PricePoint::new(d(1, 8), 50.0),
                PricePoint::new(d(1, 9), 55.0),
                PricePoint::new(d(1, 10), 55.0),
            ],
        );
        data.insert("LATE", vec![PricePoint::new(d(3, 1), 10.0)]);
        FixedProvider(data)
    }

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let window = DateRange::new(d(1, 8), d(1, 31)).unwrap();
        let req = BacktestRequest::new(tickers(&["A", "B", "MISSING"]), window).unwrap();

        let report = pipeline(provider()).run(&req).await.unwrap();

        // First visible day has a return thanks to the lookback close
        assert_eq!(report.dates, vec![d(1, 8), d(1, 9), d(1, 10)]);
        let want = [0.05, (-0.10 + 0.10) / 2.0, (0.10 + 0.0) / 2.0];
        for (got, want) in report.portfolio_returns.iter().zip(want) {
            assert!((got - want).abs() < 1e-9);
        }

        let g = &report.cumulative_growth;
        assert!((g[2] - 1.05 * 1.0 * 1.05).abs() < 1e-9);
        assert!(report.drawdown.iter().all(|&x| x <= 0.0));
        assert!((report.total_return - (1.05 * 1.05 - 1.0)).abs() < 1e-9);

        let order: Vec<&str> = report.ranking.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert_eq!(report.ranking[0].name, "Name B");

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].ticker, "MISSING");
    }

    #[tokio::test]
    async fn test_disjoint_tickers_fail_alignment() {
        let window = DateRange::new(d(1, 8), d(3, 31)).unwrap();
        let req = BacktestRequest::new(tickers(&["A", "LATE"]), window).unwrap();

        let err = pipeline(provider()).run(&req).await.unwrap_err();
        assert_eq!(err, PipelineError::InsufficientData { loaded: 2 });
    }

    #[tokio::test]
    async fn test_all_fetches_failing_is_insufficient_data() {
        let window = DateRange::new(d(1, 8), d(1, 31)).unwrap();
        let req = BacktestRequest::new(tickers(&["X", "Y"]), window).unwrap();

        let err = pipeline(provider()).run(&req).await.unwrap_err();
        assert_eq!(err, PipelineError::InsufficientData { loaded: 0 });
    }

    #[test]
    fn test_start_after_data_is_no_data_in_range() {
        let p = pipeline(provider());
        let series = vec![PriceSeries::new("A", provider().0["A"].clone())];
        let window = DateRange::new(d(2, 1), d(2, 28)).unwrap();

        let err = p.analyse(&series, vec![], vec![], &window).unwrap_err();
        assert!(matches!(err, PipelineError::NoDataInRange { .. }));
    }

    #[test]
    fn test_empty_ticker_list_rejected() {
        let window = DateRange::new(d(1, 8), d(1, 31)).unwrap();
        assert_eq!(
            BacktestRequest::new(vec![], window).unwrap_err(),
            PipelineError::NoTickers
        );
    }
}
