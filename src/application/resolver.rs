//! Price Resolver
//!
//! Spot rates per (coin id, quote currency) behind a short TTL cache.
//! Fiat-to-fiat rates share the same TTL. Concurrent misses for the same
//! pair are not de-duplicated; the worst case is a redundant upstream call.
//! The quote map is bounded: at capacity, expired entries go first, then the
//! oldest one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::{CoinId, ConversionError, FiatCode};
use crate::ports::{FiatRateSource, PriceSource, SpotPrice};

/// Default quote lifetime
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(30);

/// Default quote cache capacity
pub const DEFAULT_MAX_QUOTES: usize = 2048;

/// A cached spot price. Superseded by a newer quote, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub id: CoinId,
    pub quote: String,
    pub rate: Decimal,
    pub change_24h: Option<Decimal>,
    pub fetched_at: Instant,
}

impl PriceQuote {
    fn from_spot(id: CoinId, quote: &str, spot: SpotPrice) -> Self {
        Self {
            id,
            quote: quote.to_string(),
            rate: spot.rate,
            change_24h: spot.change_24h,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Debug, Clone, Copy)]
struct FiatQuote {
    rate: Decimal,
    fetched_at: Instant,
}

/// TTL-cached price lookups shared by message handling and the alert loop
pub struct PriceResolver {
    prices: Arc<dyn PriceSource>,
    fiat: Arc<dyn FiatRateSource>,
    ttl: Duration,
    max_entries: usize,
    quotes: RwLock<HashMap<(CoinId, String), PriceQuote>>,
    fiat_quotes: RwLock<HashMap<(FiatCode, FiatCode), FiatQuote>>,
}

impl PriceResolver {
    pub fn new(prices: Arc<dyn PriceSource>, fiat: Arc<dyn FiatRateSource>, ttl: Duration) -> Self {
        Self {
            prices,
            fiat,
            ttl,
            max_entries: DEFAULT_MAX_QUOTES,
            quotes: RwLock::new(HashMap::new()),
            fiat_quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Builder method to cap the quote cache
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Rate of one `id` in `quote` units
    pub async fn get_rate(&self, id: &CoinId, quote: &str) -> Result<Decimal, ConversionError> {
        Ok(self.get_quote(id, quote).await?.rate)
    }

    /// Full quote (with 24h change) for one pair
    pub async fn get_quote(&self, id: &CoinId, quote: &str) -> Result<PriceQuote, ConversionError> {
        let quote = quote.trim().to_lowercase();
        if let Some(hit) = self.cached(id, &quote).await {
            tracing::debug!("price cache hit {}/{}", id, quote);
            return Ok(hit);
        }

        let fetched = self
            .prices
            .fetch_prices(std::slice::from_ref(id), &quote)
            .await
            .map_err(|e| {
                tracing::warn!("Price fetch failed for {}/{}: {}", id, quote, e);
                ConversionError::PriceUnavailable(format!("{}/{}: {}", id, quote, e))
            })?;

        let spot = fetched
            .get(id)
            .copied()
            .ok_or_else(|| ConversionError::UnknownSymbol(id.to_string()))?;

        let entry = PriceQuote::from_spot(id.clone(), &quote, spot);
        let mut cache = self.quotes.write().await;
        self.store(&mut cache, (id.clone(), quote), entry.clone());
        Ok(entry)
    }

    /// Quotes for many ids at once; uncached ids go out in a single request.
    ///
    /// Ids unknown upstream are simply absent from the result.
    pub async fn get_quotes(
        &self,
        ids: &[CoinId],
        quote: &str,
    ) -> Result<HashMap<CoinId, PriceQuote>, ConversionError> {
        let quote = quote.trim().to_lowercase();
        let mut result = HashMap::new();
        let mut missing: Vec<CoinId> = Vec::new();

        {
            let cache = self.quotes.read().await;
            for id in ids {
                match cache.get(&(id.clone(), quote.clone())) {
                    Some(q) if q.is_fresh(self.ttl) => {
                        result.insert(id.clone(), q.clone());
                    }
                    _ => {
                        if !missing.contains(id) {
                            missing.push(id.clone());
                        }
                    }
                }
            }
        }

        if missing.is_empty() {
            return Ok(result);
        }

        let fetched = self.prices.fetch_prices(&missing, &quote).await.map_err(|e| {
            tracing::warn!("Batch price fetch failed ({} ids, {}): {}", missing.len(), quote, e);
            ConversionError::PriceUnavailable(format!("{}: {}", quote, e))
        })?;

        let mut cache = self.quotes.write().await;
        for (id, spot) in fetched {
            let entry = PriceQuote::from_spot(id.clone(), &quote, spot);
            self.store(&mut cache, (id.clone(), quote.clone()), entry.clone());
            result.insert(id, entry);
        }
        Ok(result)
    }

    /// Units of `to` per one `from`
    pub async fn get_fiat_rate(&self, from: FiatCode, to: FiatCode) -> Result<Decimal, ConversionError> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        if let Some(hit) = self.fiat_quotes.read().await.get(&(from, to)) {
            if hit.fetched_at.elapsed() < self.ttl {
                return Ok(hit.rate);
            }
        }

        let rate = self.fiat.fiat_rate(from, to).await.map_err(|e| {
            tracing::warn!("Fiat rate fetch failed for {}/{}: {}", from, to, e);
            ConversionError::PriceUnavailable(format!("{}/{}: {}", from, to, e))
        })?;

        self.fiat_quotes.write().await.insert(
            (from, to),
            FiatQuote {
                rate,
                fetched_at: Instant::now(),
            },
        );
        Ok(rate)
    }

    /// Number of cached quotes still inside the TTL
    pub async fn fresh_count(&self) -> usize {
        self.quotes
            .read()
            .await
            .values()
            .filter(|q| q.is_fresh(self.ttl))
            .count()
    }

    /// Number of cached quotes, fresh or not
    pub async fn cached_count(&self) -> usize {
        self.quotes.read().await.len()
    }

    /// Drop expired quotes and fiat rates
    pub async fn purge_expired(&self) {
        let ttl = self.ttl;
        self.quotes.write().await.retain(|_, q| q.is_fresh(ttl));
        self.fiat_quotes
            .write()
            .await
            .retain(|_, q| q.fetched_at.elapsed() < ttl);
    }

    fn store(
        &self,
        cache: &mut HashMap<(CoinId, String), PriceQuote>,
        key: (CoinId, String),
        entry: PriceQuote,
    ) {
        if !cache.contains_key(&key) && cache.len() >= self.max_entries {
            let ttl = self.ttl;
            cache.retain(|_, q| q.is_fresh(ttl));

            if cache.len() >= self.max_entries {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, q)| q.fetched_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    cache.remove(&oldest);
                }
            }
        }
        cache.insert(key, entry);
    }

    async fn cached(&self, id: &CoinId, quote: &str) -> Option<PriceQuote> {
        self.quotes
            .read()
            .await
            .get(&(id.clone(), quote.to_string()))
            .filter(|q| q.is_fresh(self.ttl))
            .cloned()
    }
}
