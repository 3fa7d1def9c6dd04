use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ── Date range ────────────────────────────────────────────────────────────────

/// Inclusive calendar range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Same end, start pulled back by `days` calendar days.
    pub fn with_lookback(&self, days: u32) -> Self {
        Self {
            start: self.start - chrono::Duration::days(i64::from(days)),
            end: self.end,
        }
    }
}

// ── Price series ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Daily closes for one ticker. Dates strictly increasing, no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date; on duplicate dates the later row wins.
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for p in points {
            match deduped.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => deduped.push(p),
            }
        }
        Self {
            ticker: ticker.into(),
            points: deduped,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

// ── Matrices ──────────────────────────────────────────────────────────────────

/// Date-aligned closes. Rows ascending by date, columns in ticker input order.
/// Every cell is defined once alignment has run.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

/// Simple daily returns, same column layout as the `PriceMatrix` it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// One ticker's returns, in date order.
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[idx]).collect()
    }
}

// ── Pipeline outputs ──────────────────────────────────────────────────────────

/// Ticker identifier plus the name shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerInfo {
    pub symbol: String,
    pub name: String,
}

/// Portfolio return and compounded growth, one entry per date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSeries {
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
    pub growth: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerGrowth {
    pub ticker: String,
    pub growth: Vec<f64>,
}

impl TickerGrowth {
    /// Total period return: final growth minus one.
    pub fn total_return(&self) -> f64 {
        self.growth.last().map(|g| g - 1.0).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub ticker: String,
    pub name: String,
    pub total_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaxDrawdown {
    pub depth: f64,
    pub peak: Option<NaiveDate>,
    pub trough: Option<NaiveDate>,
}

/// A ticker that dropped out of the batch, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerWarning {
    pub ticker: String,
    pub message: String,
}

/// Everything the rendering layer needs for one backtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub window: DateRange,
    pub tickers: Vec<TickerInfo>,
    pub dates: Vec<NaiveDate>,
    pub portfolio_returns: Vec<f64>,
    pub cumulative_growth: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub per_ticker: Vec<TickerGrowth>,
    pub ranking: Vec<RankingEntry>,
    pub total_return: f64,
    pub max_drawdown: MaxDrawdown,
    pub warnings: Vec<TickerWarning>,
}
