use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Price provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_kline_url")]
    pub kline_url: String,

    #[serde(default = "default_quote_url")]
    pub quote_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub adjust: PriceAdjust,
}

/// Price adjustment applied by the provider to historical closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceAdjust {
    /// Forward-adjusted (前复权)
    #[default]
    Qfq,
    /// Backward-adjusted (后复权)
    Hfq,
    None,
}

impl PriceAdjust {
    /// Eastmoney `fqt` query value.
    pub fn fqt(self) -> &'static str {
        match self {
            PriceAdjust::None => "0",
            PriceAdjust::Qfq => "1",
            PriceAdjust::Hfq => "2",
        }
    }
}

/// How calendar gaps between tickers are handled during alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Keep only dates where every ticker has a close.
    #[default]
    StrictIntersection,
    /// Carry each ticker's last close into dates it is missing.
    ForwardFill,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Calendar days fetched before the requested start so the first
    /// visible day has a prior close to compute its return from.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default)]
    pub alignment: AlignmentPolicy,

    #[serde(default = "default_true")]
    pub resolve_names: bool,
}

/// Price cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_kline_url() -> String {
    "https://push2his.eastmoney.com/api/qt/stock/kline/get".to_string()
}
fn default_quote_url() -> String {
    "https://push2.eastmoney.com/api/qt/stock/get".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_jitter_ms() -> u64 {
    200
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    4
}
fn default_lookback_days() -> u32 {
    10
}
fn default_ttl_secs() -> u64 {
    3600
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kline_url: default_kline_url(),
            quote_url: default_quote_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: 0,
            jitter_ms: default_jitter_ms(),
            user_agent: default_user_agent(),
            adjust: PriceAdjust::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            lookback_days: default_lookback_days(),
            alignment: AlignmentPolicy::default(),
            resolve_names: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("PORTFOLIO").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}
