use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{CoinEntry, CoinId, FiatCode};
use super::chat::{ChatTransport, InboundMessage, TransportError};
use super::completion::{CompletionError, CompletionParams, CompletionPort};
use super::market_data::{
    Candle, CoinListSource, FearGreed, FiatRateSource, GasOracle, GasPrices, MarketCoin,
    MarketDataError, MarketOverviewSource, PriceSource, SentimentSource, SpotPrice,
};

/// Mock price source that records calls and serves configured prices
#[derive(Debug, Default, Clone)]
pub struct MockPriceSource {
    calls: Arc<Mutex<Vec<(Vec<CoinId>, String)>>>,
    prices: Arc<Mutex<HashMap<(CoinId, String), SpotPrice>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a price for a given coin id and quote
    pub fn with_price(self, id: &str, quote: &str, rate: Decimal) -> Self {
        self.set_price(id, quote, rate);
        self
    }

    pub fn set_price(&self, id: &str, quote: &str, rate: Decimal) {
        self.prices
            .lock()
            .unwrap()
            .insert((CoinId::new(id), quote.to_lowercase()), SpotPrice::new(rate));
    }

    /// Builder method to set a price together with its 24h change
    pub fn with_change(self, id: &str, quote: &str, rate: Decimal, change_24h: Decimal) -> Self {
        self.prices.lock().unwrap().insert(
            (CoinId::new(id), quote.to_lowercase()),
            SpotPrice {
                rate,
                change_24h: Some(change_24h),
            },
        );
        self
    }

    /// Make every subsequent fetch fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<(Vec<CoinId>, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_prices(
        &self,
        ids: &[CoinId],
        quote: &str,
    ) -> Result<HashMap<CoinId, SpotPrice>, MarketDataError> {
        self.calls.lock().unwrap().push((ids.to_vec(), quote.to_string()));
        if *self.failing.lock().unwrap() {
            return Err(MarketDataError::Http("connection refused".into()));
        }

        let prices = self.prices.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                prices
                    .get(&(id.clone(), quote.to_lowercase()))
                    .map(|p| (id.clone(), *p))
            })
            .collect())
    }
}

/// Mock coin list that serves a fixed list or fails on demand
#[derive(Debug, Default, Clone)]
pub struct MockCoinList {
    coins: Arc<Mutex<Vec<CoinEntry>>>,
    failing: Arc<Mutex<bool>>,
    calls: Arc<Mutex<usize>>,
}

impl MockCoinList {
    pub fn new(coins: Vec<CoinEntry>) -> Self {
        Self {
            coins: Arc::new(Mutex::new(coins)),
            ..Default::default()
        }
    }

    pub fn set_coins(&self, coins: Vec<CoinEntry>) {
        *self.coins.lock().unwrap() = coins;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CoinListSource for MockCoinList {
    async fn fetch_coin_list(&self) -> Result<Vec<CoinEntry>, MarketDataError> {
        *self.calls.lock().unwrap() += 1;
        if *self.failing.lock().unwrap() {
            return Err(MarketDataError::RestError("503 Service Unavailable".into()));
        }
        Ok(self.coins.lock().unwrap().clone())
    }
}

/// Mock fiat rate source keyed by (from, to)
#[derive(Debug, Default, Clone)]
pub struct MockFiatRates {
    rates: Arc<Mutex<HashMap<(FiatCode, FiatCode), Decimal>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockFiatRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, from: FiatCode, to: FiatCode, rate: Decimal) -> Self {
        self.rates.lock().unwrap().insert((from, to), rate);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FiatRateSource for MockFiatRates {
    async fn fiat_rate(&self, from: FiatCode, to: FiatCode) -> Result<Decimal, MarketDataError> {
        *self.calls.lock().unwrap() += 1;
        self.rates
            .lock()
            .unwrap()
            .get(&(from, to))
            .copied()
            .ok_or_else(|| MarketDataError::RestError(format!("no rate {} -> {}", from, to)))
    }
}

/// Mock market overview with fixed data
#[derive(Debug, Default, Clone)]
pub struct MockMarketOverview {
    pub coins: Vec<MarketCoin>,
    pub dominance: f64,
    pub candles: Vec<Candle>,
}

#[async_trait]
impl MarketOverviewSource for MockMarketOverview {
    async fn top_markets(&self, _quote: &str, limit: usize) -> Result<Vec<MarketCoin>, MarketDataError> {
        Ok(self.coins.iter().take(limit).cloned().collect())
    }

    async fn btc_dominance(&self) -> Result<f64, MarketDataError> {
        Ok(self.dominance)
    }

    async fn ohlc(&self, _id: &CoinId, _quote: &str, days: u32) -> Result<Vec<Candle>, MarketDataError> {
        if days == 0 {
            return Err(MarketDataError::RestError("days must be positive".to_string()));
        }
        Ok(self.candles.clone())
    }
}

/// Mock sentiment index; `None` fails every call
#[derive(Debug, Default, Clone)]
pub struct MockSentiment {
    pub reading: Option<FearGreed>,
}

#[async_trait]
impl SentimentSource for MockSentiment {
    async fn fear_greed(&self) -> Result<FearGreed, MarketDataError> {
        self.reading
            .clone()
            .ok_or_else(|| MarketDataError::RestError("no data".to_string()))
    }
}

/// Mock gas oracle; `None` behaves like a missing API key
#[derive(Debug, Default, Clone)]
pub struct MockGasOracle {
    pub prices: Option<GasPrices>,
}

#[async_trait]
impl GasOracle for MockGasOracle {
    async fn gas_prices(&self) -> Result<GasPrices, MarketDataError> {
        self.prices
            .ok_or_else(|| MarketDataError::Unsupported("ETHERSCAN_API_KEY is not set".to_string()))
    }
}

/// Mock chat transport: queued inbound batches, recorded outbound messages
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inbound: Arc<Mutex<VecDeque<Vec<InboundMessage>>>>,
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    typing: Arc<Mutex<Vec<i64>>>,
    username: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to report a bot username
    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn push_batch(&self, batch: Vec<InboundMessage>) {
        self.inbound.lock().unwrap().push_back(batch);
    }

    /// Get all sent (chat_id, text) pairs
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Chat ids that received a typing indicator, in order
    pub fn typing(&self) -> Vec<i64> {
        self.typing.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn poll_messages(&self) -> Result<Vec<InboundMessage>, TransportError> {
        Ok(self.inbound.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        self.typing.lock().unwrap().push(chat_id);
        Ok(())
    }

    async fn bot_username(&self) -> Result<Option<String>, TransportError> {
        Ok(self.username.clone())
    }
}

/// Mock completion that echoes the prompt back with a prefix
#[derive(Debug, Default, Clone)]
pub struct MockCompletion {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionPort for MockCompletion {
    async fn complete(&self, prompt: &str, _params: CompletionParams) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("AI: {}", prompt))
    }
}
