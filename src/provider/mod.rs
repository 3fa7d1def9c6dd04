pub mod cleaner;
pub mod csv_source;
pub mod http_client;
pub mod parsers;

use crate::config::{PriceAdjust, ProviderConfig};
use crate::error::{FetchFailure, NameResolutionFailure};
use crate::models::{DateRange, PricePoint};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use self::http_client::HttpClient;
use self::parsers::{parse_kline_payload, parse_quote_name, secid_for};

pub use self::csv_source::CsvDirectoryProvider;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable price history source.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily closes for `ticker` within `range` (inclusive). May be unsorted.
    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<PricePoint>, FetchFailure>;

    /// Human-readable security name.
    async fn resolve_name(&self, ticker: &str) -> Result<String, NameResolutionFailure>;
}

// ── Eastmoney ─────────────────────────────────────────────────────────────────

const EASTMONEY_UT: &str = "7eea3edcaed734bea9cbfc24409ed989";
const KLINE_FIELDS1: &str = "f1,f2,f3,f4,f5,f6";
const KLINE_FIELDS2: &str = "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61";
const KLT_DAILY: &str = "101";

/// A-share daily history from Eastmoney's public kline endpoint.
pub struct EastmoneyProvider {
    client: HttpClient,
    kline_url: String,
    quote_url: String,
    adjust: PriceAdjust,
}

impl EastmoneyProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchFailure> {
        Ok(Self {
            client: HttpClient::new(config)?,
            kline_url: config.kline_url.clone(),
            quote_url: config.quote_url.clone(),
            adjust: config.adjust,
        })
    }

    fn kline_url(&self, secid: &str, range: &DateRange) -> Result<Url, FetchFailure> {
        let beg = range.start.format("%Y%m%d").to_string();
        let end = range.end.format("%Y%m%d").to_string();
        let params: [(&str, &str); 8] = [
            ("secid", secid),
            ("fields1", KLINE_FIELDS1),
            ("fields2", KLINE_FIELDS2),
            ("ut", EASTMONEY_UT),
            ("klt", KLT_DAILY),
            ("fqt", self.adjust.fqt()),
            ("beg", beg.as_str()),
            ("end", end.as_str()),
        ];
        Url::parse_with_params(&self.kline_url, params)
            .map_err(|e| FetchFailure::Parse(format!("kline url: {}", e)))
    }

    fn quote_url(&self, secid: &str) -> Result<Url, FetchFailure> {
        Url::parse_with_params(
            &self.quote_url,
            [("secid", secid), ("fields", "f57,f58"), ("ut", EASTMONEY_UT)],
        )
        .map_err(|e| FetchFailure::Parse(format!("quote url: {}", e)))
    }
}

#[async_trait]
impl PriceHistoryProvider for EastmoneyProvider {
    fn name(&self) -> &str {
        "eastmoney"
    }

    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<Vec<PricePoint>, FetchFailure> {
        let secid =
            secid_for(ticker).ok_or_else(|| FetchFailure::InvalidTicker(ticker.to_string()))?;
        let url = self.kline_url(&secid, &range)?;

        let body = self.client.get_text(&url).await?;
        let points = parse_kline_payload(ticker, &body)?;
        debug!("{}: {} kline rows ({})", ticker, points.len(), secid);

        Ok(points)
    }

    async fn resolve_name(&self, ticker: &str) -> Result<String, NameResolutionFailure> {
        let secid = secid_for(ticker)
            .ok_or_else(|| NameResolutionFailure::new(ticker, "unrecognised ticker"))?;
        let url = self
            .quote_url(&secid)
            .map_err(|e| NameResolutionFailure::new(ticker, e))?;

        let body = self
            .client
            .get_text(&url)
            .await
            .map_err(|e| NameResolutionFailure::new(ticker, e))?;

        parse_quote_name(&body)
            .map_err(|e| NameResolutionFailure::new(ticker, e))?
            .ok_or_else(|| NameResolutionFailure::new(ticker, "no name in quote"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_kline_url_query() {
        let provider = EastmoneyProvider::new(&ProviderConfig::default()).unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2022, 12, 22).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap();

        let url = provider.kline_url("0.002050", &range).unwrap();
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(query.contains(&("secid".into(), "0.002050".into())));
        assert!(query.contains(&("fqt".into(), "1".into())));
        assert!(query.contains(&("beg".into(), "20221222".into())));
        assert!(query.contains(&("end".into(), "20240101".into())));
        assert_eq!(url.host_str(), Some("push2his.eastmoney.com"));
    }

    #[test]
    fn test_quote_url_query() {
        let provider = EastmoneyProvider::new(&ProviderConfig::default()).unwrap();
        let url = provider.quote_url("1.600118").unwrap();
        assert!(url.as_str().contains("fields=f57%2Cf58"));
    }
}
