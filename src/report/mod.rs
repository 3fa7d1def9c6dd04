//! Rendering of a finished `PortfolioReport`: console table, CSV, JSON.
//!
//! Values stay fractional in CSV/JSON; only the table formats percentages.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::loader::LoadReport;
use crate::models::PortfolioReport;
use crate::utils::fmt_pct;

const RULE: &str = "─────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

pub fn write_report<W: Write>(report: &PortfolioReport, format: OutputFormat, out: W) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(report, out),
        OutputFormat::Csv => write_csv(report, out),
        OutputFormat::Json => write_json(report, out),
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Console layout of a finished report.
struct TableView<'a>(&'a PortfolioReport);

impl fmt::Display for TableView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let names: Vec<&str> = report.tickers.iter().map(|t| t.name.as_str()).collect();

        writeln!(f, "{}", RULE)?;
        writeln!(f, "  Equal-weight portfolio backtest")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "  Window       : {} → {}", report.window.start, report.window.end)?;
        writeln!(f, "  Tickers      : {}", names.join(", "))?;
        writeln!(f, "  Trading days : {}", report.dates.len())?;
        writeln!(f, "  Total return : {}", fmt_pct(report.total_return))?;
        write!(f, "  Max drawdown : {}", fmt_pct(report.max_drawdown.depth))?;
        match (report.max_drawdown.peak, report.max_drawdown.trough) {
            (Some(p), Some(t)) => writeln!(f, " ({} → {})", p, t)?,
            (None, Some(t)) => writeln!(f, " (trough {})", t)?,
            _ => writeln!(f)?,
        }

        if !report.warnings.is_empty() {
            writeln!(f, "  Skipped      :")?;
            for w in &report.warnings {
                writeln!(f, "    {} — {}", w.ticker, w.message)?;
            }
        }

        writeln!(f, "{}", RULE)?;
        writeln!(f, "  Contribution ranking")?;
        for (i, r) in report.ranking.iter().enumerate() {
            writeln!(
                f,
                "  {:>2}. {:<12} {:<16} {:>10}",
                i + 1,
                r.ticker,
                r.name,
                fmt_pct(r.total_return)
            )?;
        }

        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "  {:<10}  {:>10}  {:>10}  {:>10}",
            "Date", "Return", "Net value", "Drawdown"
        )?;
        for (i, date) in report.dates.iter().enumerate() {
            writeln!(
                f,
                "  {:<10}  {:>10}  {:>10.4}  {:>10}",
                date.to_string(),
                fmt_pct(report.portfolio_returns[i]),
                report.cumulative_growth[i],
                fmt_pct(report.drawdown[i])
            )?;
        }
        writeln!(f, "{}", RULE)
    }
}

pub fn render_table(report: &PortfolioReport) -> String {
    TableView(report).to_string()
}

fn write_table<W: Write>(report: &PortfolioReport, mut out: W) -> Result<()> {
    out.write_all(render_table(report).as_bytes())
        .context("Failed to write table")?;
    out.flush()?;
    Ok(())
}

// ── CSV ───────────────────────────────────────────────────────────────────────

/// One row per date: date, portfolio_return, cumulative_growth, drawdown,
/// then `growth_<ticker>` per ticker.
pub fn write_csv<W: Write>(report: &PortfolioReport, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec![
        "date".to_string(),
        "portfolio_return".to_string(),
        "cumulative_growth".to_string(),
        "drawdown".to_string(),
    ];
    header.extend(report.per_ticker.iter().map(|g| format!("growth_{}", g.ticker)));
    wtr.write_record(&header)?;

    for (i, date) in report.dates.iter().enumerate() {
        let mut row = vec![
            date.to_string(),
            report.portfolio_returns[i].to_string(),
            report.cumulative_growth[i].to_string(),
            report.drawdown[i].to_string(),
        ];
        row.extend(report.per_ticker.iter().map(|g| g.growth[i].to_string()));
        wtr.write_record(&row)
            .with_context(|| format!("write csv row {}", date))?;
    }

    wtr.flush().context("Failed to flush CSV")?;
    Ok(())
}

// ── JSON ──────────────────────────────────────────────────────────────────────

pub fn write_json<W: Write>(report: &PortfolioReport, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, report).context("Failed to serialise report")?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

// ── Load summary ──────────────────────────────────────────────────────────────

/// Per-ticker coverage after the load stage only.
struct LoadView<'a>(&'a LoadReport);

impl fmt::Display for LoadView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded = self.0;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "  {} of {} tickers loaded",
            loaded.loaded_count(),
            loaded.outcomes.len()
        )?;
        writeln!(f, "{}", RULE)?;

        for o in &loaded.outcomes {
            match &o.result {
                Ok(series) => writeln!(
                    f,
                    "  {:<10} {:<16} {:>5} closes  {} → {}",
                    o.info.symbol,
                    o.info.name,
                    series.len(),
                    series.first_date().map(|d| d.to_string()).unwrap_or("—".into()),
                    series.last_date().map(|d| d.to_string()).unwrap_or("—".into()),
                )?,
                Err(e) => writeln!(f, "  {:<10} FAILED: {}", o.info.symbol, e)?,
            }
        }
        writeln!(f, "{}", RULE)
    }
}

pub fn render_load_report(loaded: &LoadReport) -> String {
    LoadView(loaded).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DateRange, MaxDrawdown, RankingEntry, TickerGrowth, TickerInfo, TickerWarning,
    };
    use chrono::NaiveDate;

    fn report() -> PortfolioReport {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        PortfolioReport {
            window: DateRange::new(d(2), d(31)).unwrap(),
            tickers: vec![
                TickerInfo { symbol: "600118".into(), name: "中国卫星".into() },
                TickerInfo { symbol: "002050".into(), name: "002050".into() },
            ],
            dates: vec![d(2), d(3)],
            portfolio_returns: vec![0.05, -0.02],
            cumulative_growth: vec![1.05, 1.029],
            drawdown: vec![0.0, -0.02],
            per_ticker: vec![
                TickerGrowth { ticker: "600118".into(), growth: vec![1.1, 1.1] },
                TickerGrowth { ticker: "002050".into(), growth: vec![1.0, 0.96] },
            ],
            ranking: vec![
                RankingEntry { ticker: "600118".into(), name: "中国卫星".into(), total_return: 0.1 },
                RankingEntry { ticker: "002050".into(), name: "002050".into(), total_return: -0.04 },
            ],
            total_return: 0.029,
            max_drawdown: MaxDrawdown { depth: -0.02, peak: Some(d(2)), trough: Some(d(3)) },
            warnings: vec![TickerWarning { ticker: "BAD".into(), message: "HTTP 404".into() }],
        }
    }

    #[test]
    fn test_table_contains_summary() {
        let table = render_table(&report());
        assert!(table.contains("Total return : +2.90%"));
        assert!(table.contains("Max drawdown : -2.00% (2024-01-02 → 2024-01-03)"));
        assert!(table.contains("中国卫星"));
        assert!(table.contains("BAD — HTTP 404"));
    }

    #[test]
    fn test_load_summary_lists_failures() {
        use crate::error::FetchFailure;
        use crate::loader::TickerOutcome;
        use crate::models::{PricePoint, PriceSeries};

        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let loaded = LoadReport {
            outcomes: vec![
                TickerOutcome {
                    info: TickerInfo { symbol: "600118".into(), name: "中国卫星".into() },
                    result: Ok(PriceSeries::new(
                        "600118",
                        vec![PricePoint::new(d(2), 10.0), PricePoint::new(d(3), 10.5)],
                    )),
                    name_error: None,
                },
                TickerOutcome {
                    info: TickerInfo { symbol: "BAD".into(), name: "BAD".into() },
                    result: Err(FetchFailure::Api("HTTP 404".into())),
                    name_error: None,
                },
            ],
        };

        let text = render_load_report(&loaded);
        assert!(text.contains("1 of 2 tickers loaded"));
        assert!(text.contains("2 closes  2024-01-02 → 2024-01-03"));
        assert!(text.contains("BAD        FAILED:"));
        assert!(text.ends_with(&format!("{}\n", RULE)));
    }

    #[test]
    fn test_csv_layout() {
        let mut buf = Vec::new();
        write_csv(&report(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "date,portfolio_return,cumulative_growth,drawdown,growth_600118,growth_002050"
        );
        assert_eq!(lines[1], "2024-01-02,0.05,1.05,0,1.1,1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_is_fractional() {
        let mut buf = Vec::new();
        write_json(&report(), &mut buf).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["total_return"], serde_json::json!(0.029));
        assert_eq!(v["ranking"][0]["ticker"], "600118");
        assert_eq!(v["window"]["start"], "2024-01-02");
    }
}
