use chrono::NaiveDate;
use thiserror::Error;

// ── Per-ticker fetch failures ─────────────────────────────────────────────────

/// Why a single ticker produced no usable price series.
///
/// These never abort a batch: the loader records them next to the ticker and
/// the ticker drops out of the aligned matrix.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// Network failure, timeout or body decoding error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The provider answered but flagged an error in its payload.
    #[error("provider error: {0}")]
    Api(String),

    #[error("malformed provider payload: {0}")]
    Parse(String),

    /// The provider returned zero usable rows for the requested range.
    #[error("no price data for {ticker} in {start} → {end}")]
    DataUnavailable {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("unrecognised ticker {0:?}")]
    InvalidTicker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// The fetch worker panicked or was cancelled.
    #[error("fetch task aborted: {0}")]
    Task(String),
}

/// Display-name lookup failed. Always degrades to the raw identifier.
#[derive(Debug, Error)]
#[error("name lookup for {ticker} failed: {reason}")]
pub struct NameResolutionFailure {
    pub ticker: String,
    pub reason: String,
}

impl NameResolutionFailure {
    pub fn new(ticker: &str, reason: impl ToString) -> Self {
        Self {
            ticker: ticker.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ── Batch failures ────────────────────────────────────────────────────────────

/// Terminal failures for a whole backtest request.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("request: no tickers given")]
    NoTickers,

    #[error("request: start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Alignment left zero dates (no series loaded, or no common trading days).
    #[error("alignment: no common trading dates across {loaded} loaded series")]
    InsufficientData { loaded: usize },

    /// Alignment worked but nothing survives the clip to the requested window.
    #[error(
        "range clip: no returns between {start} and {end} (last available date: {})",
        fmt_opt_date(.last_available)
    )]
    NoDataInRange {
        start: NaiveDate,
        end: NaiveDate,
        last_available: Option<NaiveDate>,
    },
}

fn fmt_opt_date(d: &Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "none".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_in_range_message_names_stage() {
        let err = PipelineError::NoDataInRange {
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            last_available: NaiveDate::from_ymd_opt(2024, 3, 29),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("range clip:"));
        assert!(msg.contains("2024-03-29"));
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = PipelineError::InsufficientData { loaded: 2 };
        assert_eq!(
            err.to_string(),
            "alignment: no common trading dates across 2 loaded series"
        );
    }
}
