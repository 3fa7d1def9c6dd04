//! Alignment of per-ticker closes into one matrix, and simple daily returns.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::config::AlignmentPolicy;
use crate::error::PipelineError;
use crate::models::{DateRange, PriceMatrix, PriceSeries, ReturnMatrix};

/// Outer-join `series` on date and resolve missing cells per `policy`.
///
/// Columns keep the order of `series`. Fails with `InsufficientData` when no
/// row survives (including when `series` is empty).
pub fn align_prices(
    series: &[PriceSeries],
    policy: AlignmentPolicy,
) -> Result<PriceMatrix, PipelineError> {
    let n = series.len();
    let mut joined: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();

    for (col, s) in series.iter().enumerate() {
        for p in s.points() {
            joined.entry(p.date).or_insert_with(|| vec![None; n])[col] = Some(p.close);
        }
    }

    let total = joined.len();
    let mut dates = Vec::with_capacity(total);
    let mut rows = Vec::with_capacity(total);

    match policy {
        AlignmentPolicy::StrictIntersection => {
            for (date, cells) in joined {
                if let Some(row) = cells.into_iter().collect::<Option<Vec<f64>>>() {
                    dates.push(date);
                    rows.push(row);
                }
            }
            let dropped = total - dates.len();
            if dropped > 0 {
                warn!(
                    "Strict alignment dropped {} of {} dates with a missing close",
                    dropped, total
                );
            }
        }
        AlignmentPolicy::ForwardFill => {
            let mut last: Vec<Option<f64>> = vec![None; n];
            let mut filled = 0usize;
            let mut leading = 0usize;

            for (date, cells) in joined {
                for (col, cell) in cells.into_iter().enumerate() {
                    match cell {
                        Some(v) => last[col] = Some(v),
                        None if last[col].is_some() => filled += 1,
                        None => {}
                    }
                }
                match last.iter().copied().collect::<Option<Vec<f64>>>() {
                    Some(row) => {
                        dates.push(date);
                        rows.push(row);
                    }
                    None => leading += 1,
                }
            }
            if filled > 0 || leading > 0 {
                warn!(
                    "Forward fill: {} cells filled, {} leading dates dropped",
                    filled, leading
                );
            }
        }
    }

    if dates.is_empty() {
        return Err(PipelineError::InsufficientData { loaded: n });
    }

    debug!("Aligned {} tickers over {} dates", n, dates.len());

    Ok(PriceMatrix {
        tickers: series.iter().map(|s| s.ticker().to_string()).collect(),
        dates,
        rows,
    })
}

/// `(p[t] - p[t-1]) / p[t-1]` per column. The first row yields no return.
pub fn compute_returns(prices: &PriceMatrix) -> ReturnMatrix {
    let mut dates = Vec::with_capacity(prices.dates.len().saturating_sub(1));
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(dates.capacity());

    for (i, pair) in prices.rows.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        rows.push(
            prev.iter()
                .zip(cur)
                .map(|(p0, p1)| (p1 - p0) / p0)
                .collect(),
        );
        dates.push(prices.dates[i + 1]);
    }

    ReturnMatrix {
        tickers: prices.tickers.clone(),
        dates,
        rows,
    }
}

/// Keep return rows inside `window`. Fails with `NoDataInRange` when none do.
pub fn clip_to_window(
    returns: ReturnMatrix,
    window: &DateRange,
) -> Result<ReturnMatrix, PipelineError> {
    let last_available = returns.dates.last().copied();

    let (dates, rows): (Vec<_>, Vec<_>) = returns
        .dates
        .into_iter()
        .zip(returns.rows)
        .filter(|(date, _)| window.contains(*date))
        .unzip();

    let clipped = ReturnMatrix {
        tickers: returns.tickers,
        dates,
        rows,
    };
    if clipped.is_empty() {
        return Err(PipelineError::NoDataInRange {
            start: window.start,
            end: window.end,
            last_available,
        });
    }

    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricePoint;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(ticker: &str, pts: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(
            ticker,
            pts.iter().map(|&(day, c)| PricePoint::new(d(day), c)).collect(),
        )
    }

    #[test]
    fn test_strict_alignment_keeps_intersection() {
        let a = series("A", &[(2, 10.0), (3, 11.0), (4, 12.0), (5, 13.0)]);
        let b = series("B", &[(3, 20.0), (5, 22.0), (8, 23.0)]);

        let m = align_prices(&[a, b], AlignmentPolicy::StrictIntersection).unwrap();
        assert_eq!(m.tickers, vec!["A", "B"]);
        assert_eq!(m.dates, vec![d(3), d(5)]);
        assert_eq!(m.rows, vec![vec![11.0, 20.0], vec![13.0, 22.0]]);
    }

    #[test]
    fn test_empty_intersection_is_insufficient_data() {
        let a = series("A", &[(2, 10.0), (3, 11.0)]);
        let b = series("B", &[(4, 20.0), (5, 21.0)]);

        let err = align_prices(&[a, b], AlignmentPolicy::StrictIntersection).unwrap_err();
        assert_eq!(err, PipelineError::InsufficientData { loaded: 2 });
    }

    #[test]
    fn test_no_series_is_insufficient_data() {
        let err = align_prices(&[], AlignmentPolicy::StrictIntersection).unwrap_err();
        assert_eq!(err, PipelineError::InsufficientData { loaded: 0 });
    }

    #[test]
    fn test_forward_fill_carries_last_close() {
        let a = series("A", &[(2, 10.0), (3, 11.0), (4, 12.0)]);
        let b = series("B", &[(3, 20.0), (5, 22.0)]);

        let m = align_prices(&[a, b], AlignmentPolicy::ForwardFill).unwrap();
        // Jan 2 has no prior close for B and is dropped
        assert_eq!(m.dates, vec![d(3), d(4), d(5)]);
        assert_eq!(
            m.rows,
            vec![vec![11.0, 20.0], vec![12.0, 20.0], vec![12.0, 22.0]]
        );
    }

    #[test]
    fn test_return_definition() {
        let a = series("A", &[(2, 100.0), (3, 110.0), (4, 99.0)]);
        let m = align_prices(&[a], AlignmentPolicy::StrictIntersection).unwrap();
        let r = compute_returns(&m);

        assert_eq!(r.dates, vec![d(3), d(4)]);
        let col = r.column(0);
        assert!((col[0] - 0.10).abs() < 1e-9);
        assert!((col[1] + 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_single_row_has_no_returns() {
        let a = series("A", &[(2, 100.0)]);
        let m = align_prices(&[a], AlignmentPolicy::StrictIntersection).unwrap();
        assert!(compute_returns(&m).is_empty());
    }

    #[test]
    fn test_clip_keeps_window_rows() {
        let a = series("A", &[(2, 100.0), (3, 101.0), (4, 102.0), (5, 103.0)]);
        let m = align_prices(&[a], AlignmentPolicy::StrictIntersection).unwrap();
        let window = DateRange::new(d(4), d(31)).unwrap();

        let clipped = clip_to_window(compute_returns(&m), &window).unwrap();
        assert_eq!(clipped.dates, vec![d(4), d(5)]);
    }

    #[test]
    fn test_start_after_data_is_no_data_in_range() {
        let a = series("A", &[(2, 100.0), (3, 101.0), (4, 102.0)]);
        let m = align_prices(&[a], AlignmentPolicy::StrictIntersection).unwrap();
        let window = DateRange::new(d(10), d(20)).unwrap();

        let err = clip_to_window(compute_returns(&m), &window).unwrap_err();
        assert_eq!(
            err,
            PipelineError::NoDataInRange {
                start: d(10),
                end: d(20),
                last_available: Some(d(4)),
            }
        );
    }
}
