//! Read-through price cache sitting in front of the provider.
//!
//! The loader takes an `Arc<dyn PriceCache>`; nothing here is global, so each
//! test gets its own instance. `TtlCache` stores `(series, expires_at)` per
//! key and reads time through a [`Clock`] so expiry can be driven by hand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::{DateRange, PriceSeries};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: String,
    pub range: DateRange,
}

impl CacheKey {
    pub fn new(ticker: &str, range: DateRange) -> Self {
        Self {
            ticker: ticker.to_string(),
            range,
        }
    }
}

pub trait PriceCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<PriceSeries>;
    fn put(&self, key: CacheKey, series: PriceSeries);
}

/// Never stores anything.
#[derive(Debug, Default)]
pub struct NoCache;

impl PriceCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Option<PriceSeries> {
        None
    }

    fn put(&self, _key: CacheKey, _series: PriceSeries) {}
}

// ── Clock ─────────────────────────────────────────────────────────────────────

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ── TTL cache ─────────────────────────────────────────────────────────────────

pub struct TtlCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<CacheKey, (PriceSeries, Instant)>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, (PriceSeries, Instant)>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PriceCache for TtlCache {
    fn get(&self, key: &CacheKey) -> Option<PriceSeries> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let (series, expires_at) = entries.get(key)?;
        if *expires_at > now {
            debug!("cache hit: {}", key.ticker);
            return Some(series.clone());
        }

        debug!("cache expired: {}", key.ticker);
        entries.remove(key);
        None
    }

    fn put(&self, key: CacheKey, series: PriceSeries) {
        let expires_at = self.clock.now() + self.ttl;
        self.lock().insert(key, (series, expires_at));
    }
}
