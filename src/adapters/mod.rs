//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - CoinGecko: coin list, spot prices and market overview
//! - Frankfurter: fiat exchange rates
//! - Fear & Greed (alternative.me): sentiment index
//! - Etherscan: Ethereum gas oracle
//! - Telegram: Bot API long-polling transport
//! - OpenAI: chat completions for the AI fallback
//! - CLI: Command-line interface definitions

pub mod coingecko;
pub mod frankfurter;
pub mod feargreed;
pub mod etherscan;
pub mod telegram;
pub mod openai;
pub mod cli;

pub use coingecko::{CoinGeckoClient, CoinGeckoConfig};
pub use frankfurter::{FrankfurterClient, FrankfurterConfig};
pub use feargreed::{FearGreedClient, FearGreedConfig};
pub use etherscan::{EtherscanClient, EtherscanConfig};
pub use telegram::{TelegramConfig, TelegramTransport};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use cli::CliApp;
