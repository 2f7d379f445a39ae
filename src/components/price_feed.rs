//! Price supplier with TTL caching
//!
//! Quotes are cached per pair in an explicit [`PriceCache`] that reads time
//! from the injected [`Clock`], so expiry is testable without sleeping.

use crate::clock::Clock;
use crate::errors::SupplierError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const SUPPLIER_NAME: &str = "price_feed";

/// External price supplier
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price of one CATH in SOL
    async fn cath_price_in_sol(&self) -> Result<f64, SupplierError>;

    /// Price of one SOL in USD
    async fn sol_price_in_usd(&self) -> Result<f64, SupplierError>;
}

/// Fixed mock prices
pub struct MockPriceSource {
    cath_in_sol: f64,
    sol_in_usd: f64,
    fetches: AtomicUsize,
}

impl Default for MockPriceSource {
    fn default() -> Self {
        Self::new(0.005, 100.0)
    }
}

impl MockPriceSource {
    pub fn new(cath_in_sol: f64, sol_in_usd: f64) -> Self {
        Self {
            cath_in_sol,
            sol_in_usd,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of supplier round-trips so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn cath_price_in_sol(&self) -> Result<f64, SupplierError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.cath_in_sol)
    }

    async fn sol_price_in_usd(&self) -> Result<f64, SupplierError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.sol_in_usd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CachedQuote {
    value: f64,
    updated_at: DateTime<Utc>,
}

/// Single cached value with a time-to-live
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    slot: Mutex<Option<CachedQuote>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Cached value if younger than the TTL at `now`
    pub fn get(&self, now: DateTime<Utc>) -> Option<f64> {
        let slot = self.slot.lock();
        slot.filter(|q| now - q.updated_at < self.ttl).map(|q| q.value)
    }

    pub fn store(&self, value: f64, now: DateTime<Utc>) {
        *self.slot.lock() = Some(CachedQuote {
            value,
            updated_at: now,
        });
    }

    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}

/// A USD list price converted to SOL and CATH
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub usd: f64,
    pub sol: f64,
    pub cath: f64,
}

/// Cached view over a [`PriceSource`]
pub struct PriceFeed {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    cath_in_sol: PriceCache,
    sol_in_usd: PriceCache,
}

impl PriceFeed {
    pub fn new(source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            cath_in_sol: PriceCache::new(ttl),
            sol_in_usd: PriceCache::new(ttl),
        }
    }

    pub async fn cath_price_in_sol(&self) -> Result<f64, SupplierError> {
        let now = self.clock.now();
        if let Some(price) = self.cath_in_sol.get(now) {
            return Ok(price);
        }
        let price = checked_price(self.source.cath_price_in_sol().await?)?;
        self.cath_in_sol.store(price, now);
        debug!(price, "Refreshed CATH/SOL quote");
        Ok(price)
    }

    pub async fn sol_price_in_usd(&self) -> Result<f64, SupplierError> {
        let now = self.clock.now();
        if let Some(price) = self.sol_in_usd.get(now) {
            return Ok(price);
        }
        let price = checked_price(self.source.sol_price_in_usd().await?)?;
        self.sol_in_usd.store(price, now);
        debug!(price, "Refreshed SOL/USD quote");
        Ok(price)
    }

    pub async fn usd_to_sol(&self, usd: f64) -> Result<f64, SupplierError> {
        Ok(usd / self.sol_price_in_usd().await?)
    }

    pub async fn sol_to_cath(&self, sol: f64) -> Result<f64, SupplierError> {
        Ok(sol / self.cath_price_in_sol().await?)
    }

    pub async fn usd_to_cath(&self, usd: f64) -> Result<f64, SupplierError> {
        let sol = self.usd_to_sol(usd).await?;
        self.sol_to_cath(sol).await
    }

    /// Convert a USD list price into SOL and CATH
    pub async fn quote_usd(&self, usd: f64) -> Result<PriceQuote, SupplierError> {
        let sol = self.usd_to_sol(usd).await?;
        let cath = self.sol_to_cath(sol).await?;
        Ok(PriceQuote { usd, sol, cath })
    }
}

/// Prices are divisors; zero, negative or non-finite values are unusable
fn checked_price(price: f64) -> Result<f64, SupplierError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(SupplierError::InvalidResponse {
            supplier: SUPPLIER_NAME,
            reason: format!("unusable price {}", price),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn feed() -> (PriceFeed, Arc<MockPriceSource>, Arc<ManualClock>) {
        let source = Arc::new(MockPriceSource::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ));
        let feed = PriceFeed::new(source.clone(), clock.clone(), Duration::seconds(60));
        (feed, source, clock)
    }

    #[test]
    fn test_cache_expiry() {
        let cache = PriceCache::new(Duration::seconds(60));
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(cache.get(t0), None);

        cache.store(1.5, t0);
        assert_eq!(cache.get(t0 + Duration::seconds(59)), Some(1.5));
        assert_eq!(cache.get(t0 + Duration::seconds(60)), None);

        cache.invalidate();
        assert_eq!(cache.get(t0), None);
    }

    #[tokio::test]
    async fn test_feed_caches_until_ttl() {
        let (feed, source, clock) = feed();

        assert_eq!(feed.cath_price_in_sol().await.unwrap(), 0.005);
        assert_eq!(feed.cath_price_in_sol().await.unwrap(), 0.005);
        assert_eq!(source.fetch_count(), 1);

        clock.advance(Duration::seconds(61));
        feed.cath_price_in_sol().await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_conversions() {
        let (feed, _, _) = feed();
        assert!((feed.usd_to_sol(100.0).await.unwrap() - 1.0).abs() < 1e-12);
        assert!((feed.sol_to_cath(0.01).await.unwrap() - 2.0).abs() < 1e-9);
        assert!((feed.usd_to_cath(1.0).await.unwrap() - 2.0).abs() < 1e-9);

        let quote = feed.quote_usd(29.99).await.unwrap();
        assert!((quote.sol - 0.2999).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rejects_zero_price() {
        let source = Arc::new(MockPriceSource::new(0.0, 100.0));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let feed = PriceFeed::new(source, clock, Duration::seconds(60));
        assert!(matches!(
            feed.cath_price_in_sol().await,
            Err(SupplierError::InvalidResponse { .. })
        ));
    }
}
