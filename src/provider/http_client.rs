use crate::config::ProviderConfig;
use crate::error::FetchFailure;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

pub struct HttpClient {
    inner: reqwest::Client,
    request_delay_ms: u64,
    jitter_ms: u64,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchFailure> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner,
            request_delay_ms: config.request_delay_ms,
            jitter_ms: config.jitter_ms,
        })
    }

    /// Fetch a URL as text after the polite delay. Single attempt.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchFailure> {
        self.polite_delay().await;
        debug!("GET {}", url);

        let resp = self.inner.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.text().await?)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::random_range(0..=self.jitter_ms);
        let total = self.request_delay_ms + jitter;
        if total > 0 {
            sleep(Duration::from_millis(total)).await;
        }
    }
}
