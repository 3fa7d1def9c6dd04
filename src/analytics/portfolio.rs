//! Portfolio aggregation: weighted daily return and compounded growth.

use crate::models::{PortfolioSeries, ReturnMatrix, TickerGrowth};

/// Assigns a weight to each of `n` constituents. Weights should sum to 1.
pub trait WeightingScheme: Send + Sync {
    fn name(&self) -> &str;
    fn weights(&self, n: usize) -> Vec<f64>;
}

/// Every constituent gets `1/N`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeight;

impl WeightingScheme for EqualWeight {
    fn name(&self) -> &str {
        "equal_weight"
    }

    fn weights(&self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        vec![1.0 / n as f64; n]
    }
}

/// Running product of `(1 + r)` from an implicit base of 1.
pub fn compound(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// Portfolio return per date under `scheme`, and its cumulative growth.
pub fn aggregate(returns: &ReturnMatrix, scheme: &dyn WeightingScheme) -> PortfolioSeries {
    let weights = scheme.weights(returns.tickers.len());

    let portfolio: Vec<f64> = returns
        .rows
        .iter()
        .map(|row| row.iter().zip(&weights).map(|(r, w)| r * w).sum::<f64>())
        .collect();

    PortfolioSeries {
        dates: returns.dates.clone(),
        growth: compound(&portfolio),
        returns: portfolio,
    }
}

/// Each ticker's own compounded growth, in column order.
pub fn per_ticker_growth(returns: &ReturnMatrix) -> Vec<TickerGrowth> {
    returns
        .tickers
        .iter()
        .enumerate()
        .map(|(idx, ticker)| TickerGrowth {
            ticker: ticker.clone(),
            growth: compound(&returns.column(idx)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn matrix(rows: Vec<Vec<f64>>) -> ReturnMatrix {
        let n = rows.first().map(|r| r.len()).unwrap_or(0);
        ReturnMatrix {
            tickers: (0..n).map(|i| format!("T{}", i)).collect(),
            dates: (0..rows.len())
                .map(|i| NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32).unwrap())
                .collect(),
            rows,
        }
    }

    #[test]
    fn test_equal_weight_is_unweighted_mean() {
        let m = matrix(vec![vec![0.02, -0.01, 0.03]]);
        let p = aggregate(&m, &EqualWeight);
        assert!((p.returns[0] - 0.04 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_compound_round_trip() {
        let returns = [0.01, -0.02, 0.035, 0.0, -0.005];
        let growth = compound(&returns);

        let product: f64 = returns.iter().map(|r| 1.0 + r).product();
        assert!((growth[4] - product).abs() < 1e-12);

        assert!((growth[0] - 1.01).abs() < 1e-12);
        for t in 1..returns.len() {
            let rebuilt = growth[t] / growth[t - 1] - 1.0;
            assert!((rebuilt - returns[t]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_per_ticker_growth_is_independent() {
        let m = matrix(vec![vec![0.10, -0.05], vec![0.10, 0.0]]);
        let g = per_ticker_growth(&m);

        assert_eq!(g.len(), 2);
        assert!((g[0].total_return() - 0.21).abs() < 1e-12);
        assert!((g[1].total_return() + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_equal_weights_sum_to_one() {
        let w = EqualWeight.weights(7);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(EqualWeight.weights(0).is_empty());
    }
}
