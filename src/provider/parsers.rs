//! Eastmoney payload parsing and ticker → `secid` mapping.

use crate::error::FetchFailure;
use crate::models::PricePoint;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use super::cleaner::parse_price;

// ── secid ─────────────────────────────────────────────────────────────────────

fn is_code(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit())
}

fn market_for_exchange(ex: &str) -> Option<&'static str> {
    match ex.to_ascii_lowercase().as_str() {
        "sh" | "ss" => Some("1"),
        "sz" | "bj" => Some("0"),
        _ => None,
    }
}

/// Map a ticker to Eastmoney's `market.code` form.
///
/// "600118" → "1.600118" | "002050" → "0.002050" | "sh600118", "600118.SH",
/// "1.600118" are accepted as explicit forms.
pub fn secid_for(ticker: &str) -> Option<String> {
    let t = ticker.trim();

    if let Some((head, tail)) = t.split_once('.') {
        if (head == "0" || head == "1") && is_code(tail) {
            return Some(format!("{}.{}", head, tail));
        }
        if is_code(head) {
            return market_for_exchange(tail).map(|m| format!("{}.{}", m, head));
        }
        return None;
    }

    if t.len() == 8 && t.is_char_boundary(2) {
        let (ex, code) = t.split_at(2);
        if is_code(code) {
            return market_for_exchange(ex).map(|m| format!("{}.{}", m, code));
        }
    }

    if is_code(t) {
        // Shanghai A and B shares start with 6 and 9
        let market = if t.starts_with('6') || t.starts_with('9') { "1" } else { "0" };
        return Some(format!("{}.{}", market, t));
    }

    None
}

// ── Kline payload ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    rc: i64,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    f58: Option<String>,
}

/// One kline row: "date,open,close,high,low,volume,...". Only date and close
/// are read.
pub fn parse_kline_row(ticker: &str, line: &str) -> Option<PricePoint> {
    let mut parts = line.split(',');
    let date = NaiveDate::parse_from_str(parts.next()?.trim(), "%Y-%m-%d").ok()?;
    let close = parse_price(parts.nth(1)?)?;

    if close <= 0.0 {
        warn!("Invalid close {} for {} on {}", close, ticker, date);
        return None;
    }

    Some(PricePoint::new(date, close))
}

/// Daily closes from a kline response. A null `data` block (unknown code)
/// yields an empty list.
pub fn parse_kline_payload(ticker: &str, body: &str) -> Result<Vec<PricePoint>, FetchFailure> {
    let env: Envelope<KlineData> =
        serde_json::from_str(body.trim()).map_err(|e| FetchFailure::Parse(e.to_string()))?;

    if env.rc != 0 {
        return Err(FetchFailure::Api(format!("kline rc={}", env.rc)));
    }

    let Some(data) = env.data else {
        return Ok(Vec::new());
    };

    let total = data.klines.len();
    let points: Vec<PricePoint> = data
        .klines
        .iter()
        .filter_map(|line| parse_kline_row(ticker, line))
        .collect();

    if points.len() < total {
        warn!("{}: skipped {} unparsable kline rows", ticker, total - points.len());
    }

    Ok(points)
}

/// Security name (`f58`) from a quote response.
pub fn parse_quote_name(body: &str) -> Result<Option<String>, FetchFailure> {
    let env: Envelope<QuoteData> =
        serde_json::from_str(body.trim()).map_err(|e| FetchFailure::Parse(e.to_string()))?;

    if env.rc != 0 {
        return Err(FetchFailure::Api(format!("quote rc={}", env.rc)));
    }

    Ok(env
        .data
        .and_then(|d| d.f58)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty()))
}
