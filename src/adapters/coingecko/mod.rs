//! CoinGecko Adapter
//!
//! Coin list, simple price, markets and global endpoints.

mod client;
mod types;

pub use client::{CoinGeckoClient, CoinGeckoConfig};
