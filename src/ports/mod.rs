//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement:
//! - Market data (coin list, spot prices, fiat rates, market overview,
//!   sentiment, gas)
//! - Chat transport (message receipt and delivery)
//! - AI completion

pub mod market_data;
pub mod chat;
pub mod completion;
pub mod mocks;

pub use market_data::{
    Candle, CoinListSource, FearGreed, FiatRateSource, GasOracle, GasPrices, MarketCoin,
    MarketDataError, MarketOverviewSource, PriceSource, SentimentSource, SpotPrice,
};
pub use chat::{ChatTransport, InboundMessage, TransportError};
pub use completion::{CompletionError, CompletionParams, CompletionPort};
