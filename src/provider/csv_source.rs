//! Offline price source backed by a directory of CSV exports.
//!
//! Each `<TICKER>[_suffix].csv` holds a header row with a date column and a
//! close column (`Date`/`日期`, `Close`/`Price`/`收盘`). When no header
//! matches, the investing.com layout is assumed: Date, Price, ...
//! An optional `tickers.csv` (`symbol,name`) supplies display names.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::PriceHistoryProvider;
use super::cleaner::{normalise_symbol, parse_date, parse_price};
use crate::error::{FetchFailure, NameResolutionFailure};
use crate::models::{DateRange, PricePoint};

const NAMES_FILE: &str = "tickers.csv";
const DATE_HEADERS: &[&str] = &["date", "日期", "trade_date"];
const CLOSE_HEADERS: &[&str] = &["close", "price", "收盘", "adj close"];

pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn find_file(&self, ticker: &str) -> Result<PathBuf, FetchFailure> {
        let wanted = normalise_symbol(ticker);
        discover_csv_files(&self.dir)?
            .into_iter()
            .find(|p| extract_symbol_from_filename(p).as_deref() == Some(wanted.as_str()))
            .ok_or_else(|| FetchFailure::InvalidTicker(ticker.to_string()))
    }
}

/// Extract symbol from CSV filename.
pub fn extract_symbol_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let symbol = stem
        .split(['_', ' ', '.'])
        .next()?
        .trim()
        .to_uppercase();

    if symbol.is_empty() { None } else { Some(symbol) }
}

pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>, FetchFailure> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn column_index(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().trim_start_matches('\u{feff}').to_lowercase().as_str()))
}

/// Parse closes out of a CSV body, keeping rows inside `range`.
pub fn parse_price_csv(
    ticker: &str,
    body: &str,
    range: &DateRange,
) -> Result<Vec<PricePoint>, FetchFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let date_col = column_index(&headers, DATE_HEADERS).unwrap_or(0);
    let close_col = column_index(&headers, CLOSE_HEADERS).unwrap_or(1);

    let mut points = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: row {}: {}", ticker, i + 1, e);
                continue;
            }
        };

        let Some(date) = record.get(date_col).and_then(parse_date) else {
            continue;
        };
        if !range.contains(date) {
            continue;
        }
        match record.get(close_col).and_then(parse_price) {
            Some(close) if close > 0.0 => points.push(PricePoint::new(date, close)),
            other => warn!("Invalid close {:?} for {} on {}", other, ticker, date),
        }
    }

    Ok(points)
}

/// Look `ticker` up in a `symbol,name` CSV body.
pub fn lookup_name(body: &str, ticker: &str) -> Option<String> {
    let wanted = normalise_symbol(ticker);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    reader
        .records()
        .filter_map(|r| r.ok())
        .find(|r| r.get(0).map(normalise_symbol).as_deref() == Some(wanted.as_str()))
        .and_then(|r| r.get(1).map(|n| n.trim().to_string()))
        .filter(|n| !n.is_empty())
}

#[async_trait]
impl PriceHistoryProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<PricePoint>, FetchFailure> {
        let path = self.find_file(ticker)?;
        debug!("Loading {} from {:?}", ticker, path);

        let body = tokio::fs::read_to_string(&path).await?;
        parse_price_csv(ticker, &body, &range)
    }

    async fn resolve_name(&self, ticker: &str) -> Result<String, NameResolutionFailure> {
        let body = tokio::fs::read_to_string(self.dir.join(NAMES_FILE))
            .await
            .map_err(|e| NameResolutionFailure::new(ticker, e))?;

        lookup_name(&body, ticker)
            .ok_or_else(|| NameResolutionFailure::new(ticker, format!("not listed in {}", NAMES_FILE)))
    }
}
