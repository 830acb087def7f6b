use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{CoinEntry, CoinId, FiatCode};

/// Market data error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Rate limited, try again later")]
    RateLimited,

    /// Source needs configuration it does not have (e.g. an API key)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for MarketDataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            MarketDataError::ParseError(e.to_string())
        } else {
            MarketDataError::Http(e.to_string())
        }
    }
}

/// Spot price of one coin against one quote currency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotPrice {
    pub rate: Decimal,
    /// 24h change in percent, when the source reports it
    pub change_24h: Option<Decimal>,
}

impl SpotPrice {
    pub fn new(rate: Decimal) -> Self {
        Self { rate, change_24h: None }
    }
}

/// Row of the market-cap leaderboard
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCoin {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h: Option<f64>,
}

/// One OHLC candle, opening at `time`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Crypto Fear & Greed index reading (0 = extreme fear, 100 = extreme greed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FearGreed {
    pub value: u8,
    pub classification: String,
}

/// Ethereum gas price tiers in gwei
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPrices {
    pub safe: Decimal,
    pub propose: Decimal,
    pub fast: Decimal,
}

/// Full coin list used to (re)build the symbol registry
#[async_trait]
pub trait CoinListSource: Send + Sync {
    async fn fetch_coin_list(&self) -> Result<Vec<CoinEntry>, MarketDataError>;
}

/// Spot prices by canonical id
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch prices for `ids` quoted in `quote` (lowercase code).
    ///
    /// Ids the source does not know are absent from the returned map.
    async fn fetch_prices(
        &self,
        ids: &[CoinId],
        quote: &str,
    ) -> Result<HashMap<CoinId, SpotPrice>, MarketDataError>;
}

/// Fiat-to-fiat exchange rates
#[async_trait]
pub trait FiatRateSource: Send + Sync {
    /// Units of `to` per one unit of `from`
    async fn fiat_rate(&self, from: FiatCode, to: FiatCode) -> Result<Decimal, MarketDataError>;
}

/// Whole-market snapshots (leaderboard, dominance)
#[async_trait]
pub trait MarketOverviewSource: Send + Sync {
    async fn top_markets(&self, quote: &str, limit: usize) -> Result<Vec<MarketCoin>, MarketDataError>;

    /// Bitcoin share of total market cap, in percent
    async fn btc_dominance(&self) -> Result<f64, MarketDataError>;

    /// Candles for `id` in `quote` over the last `days`, oldest first
    async fn ohlc(&self, id: &CoinId, quote: &str, days: u32) -> Result<Vec<Candle>, MarketDataError>;
}

/// Market sentiment index
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fear_greed(&self) -> Result<FearGreed, MarketDataError>;
}

/// Ethereum gas oracle
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// `Unsupported` when the oracle is not configured
    async fn gas_prices(&self) -> Result<GasPrices, MarketDataError>;
}
