mod analytics;
mod cache;
mod config;
mod error;
mod loader;
mod models;
mod pipeline;
mod provider;
mod report;
mod utils;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cache::{NoCache, PriceCache, TtlCache};
use crate::config::AppConfig;
use crate::models::DateRange;
use crate::pipeline::{BacktestRequest, Pipeline};
use crate::provider::cleaner::{parse_date, parse_ticker_list};
use crate::provider::{CsvDirectoryProvider, EastmoneyProvider, PriceHistoryProvider};
use crate::report::{OutputFormat, render_load_report, write_report};

#[derive(Parser)]
#[command(
    name = "portfolio-backtest",
    about = "Equal-weight portfolio backtest over daily closes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct RequestArgs {
    /// Comma-separated ticker codes, e.g. 002050,600118
    #[arg(short, long)]
    tickers: String,

    /// First day of the window (YYYYMMDD or YYYY-MM-DD)
    #[arg(short, long, value_parser = parse_date_arg)]
    start: NaiveDate,

    /// Last day of the window (default: today)
    #[arg(short, long, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,

    /// Read prices from a directory of CSV files instead of Eastmoney
    #[arg(long)]
    csv_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the backtest and print/write the report
    Run {
        #[command(flatten)]
        request: RequestArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch price history only and show per-ticker coverage
    Inspect {
        #[command(flatten)]
        request: RequestArgs,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("unrecognised date {:?}", s))
}

fn build_request(args: &RequestArgs) -> Result<BacktestRequest> {
    let end = args.end.unwrap_or_else(|| Local::now().date_naive());
    let window = DateRange::new(args.start, end)?;
    Ok(BacktestRequest::new(parse_ticker_list(&args.tickers), window)?)
}

fn build_pipeline(config: &AppConfig, args: &RequestArgs) -> Result<Pipeline> {
    let provider: Arc<dyn PriceHistoryProvider> = match &args.csv_dir {
        Some(dir) => Arc::new(CsvDirectoryProvider::new(dir)),
        None => Arc::new(
            EastmoneyProvider::new(&config.provider).context("Failed to build HTTP client")?,
        ),
    };

    let cache: Arc<dyn PriceCache> = if config.cache.enabled {
        Arc::new(TtlCache::new(Duration::from_secs(config.cache.ttl_secs)))
    } else {
        Arc::new(NoCache)
    };

    Ok(Pipeline::new(config, provider, cache))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "portfolio_backtest=info,warn",
        1 => "portfolio_backtest=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Run {
            request,
            format,
            output,
        } => {
            let _t = utils::Timer::start("Backtest");
            let req = build_request(&request)?;
            let pipeline = build_pipeline(&config, &request)?;

            let report = pipeline.run(&req).await?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Could not create {:?}", path))?;
                    write_report(&report, format, std::io::BufWriter::new(file))?;
                    info!("Report written to {:?}", path);
                }
                None => write_report(&report, format, std::io::stdout().lock())?,
            }
        }

        Command::Inspect { request } => {
            let _t = utils::Timer::start("Price history load");
            let req = build_request(&request)?;
            let pipeline = build_pipeline(&config, &request)?;

            let range = pipeline.fetch_range(&req.window);
            println!("Fetch range: {} → {}", range.start, range.end);
            let loaded = pipeline.load(&req).await;
            print!("{}", render_load_report(&loaded));
        }
    }

    Ok(())
}
