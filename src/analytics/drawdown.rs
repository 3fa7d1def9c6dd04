//! Drawdown from running maximum, plus the contribution ranking.

use chrono::NaiveDate;

use crate::models::{MaxDrawdown, RankingEntry, TickerGrowth, TickerInfo};

/// `(g[t] - max(g[..=t])) / max(g[..=t])`. Always <= 0; exactly 0 at new highs.
pub fn drawdown(growth: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    growth
        .iter()
        .map(|&g| {
            if g >= peak {
                peak = g;
                0.0
            } else {
                (g - peak) / peak
            }
        })
        .collect()
}

/// Deepest point of `dd`, with the date of the preceding peak.
pub fn max_drawdown(dates: &[NaiveDate], dd: &[f64]) -> MaxDrawdown {
    let mut worst = MaxDrawdown {
        depth: 0.0,
        peak: None,
        trough: None,
    };
    let mut last_peak: Option<NaiveDate> = None;

    for (&date, &v) in dates.iter().zip(dd) {
        if v == 0.0 {
            last_peak = Some(date);
        } else if v < worst.depth {
            worst = MaxDrawdown {
                depth: v,
                peak: last_peak,
                trough: Some(date),
            };
        }
    }
    worst
}

/// Tickers by total period return, best first. Ties keep `growth` order.
pub fn rank_contributions(growth: &[TickerGrowth], names: &[TickerInfo]) -> Vec<RankingEntry> {
    let mut ranking: Vec<RankingEntry> = growth
        .iter()
        .map(|g| RankingEntry {
            ticker: g.ticker.clone(),
            name: names
                .iter()
                .find(|n| n.symbol == g.ticker)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| g.ticker.clone()),
            total_return: g.total_return(),
        })
        .collect();

    ranking.sort_by(|a, b| b.total_return.total_cmp(&a.total_return));
    ranking
}
