//! Coin identifiers and registry entries

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry-unique coin identifier (e.g. `bitcoin`, `binancecoin`).
///
/// Distinct from the display ticker: many coins share a ticker, only one
/// owns an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoinId(String);

impl CoinId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CoinId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One coin as listed by the remote coin-list source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinEntry {
    pub id: CoinId,
    /// Display ticker, lowercase (e.g. "btc")
    pub symbol: String,
    /// Extra lookup keys (full name, legacy tickers)
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CoinEntry {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: CoinId::new(id),
            symbol: normalize_token(&symbol.into()),
            aliases: Vec::new(),
        }
    }

    /// Builder method to add a lookup alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = normalize_token(&alias.into());
        if !alias.is_empty() {
            self.aliases.push(alias);
        }
        self
    }
}

/// Tickers pinned to a canonical id regardless of what the remote list says.
///
/// Popular tickers are claimed by dozens of copycat tokens upstream; these
/// always win.
pub const SEED_ALIASES: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("xbt", "bitcoin"),
    ("eth", "ethereum"),
    ("bnb", "binancecoin"),
    ("sol", "solana"),
    ("usdt", "tether"),
    ("usdc", "usd-coin"),
    ("xrp", "ripple"),
    ("ada", "cardano"),
    ("doge", "dogecoin"),
    ("ton", "the-open-network"),
    ("dot", "polkadot"),
    ("matic", "matic-network"),
    ("pol", "polygon-ecosystem-token"),
    ("avax", "avalanche-2"),
    ("ltc", "litecoin"),
    ("shib", "shiba-inu"),
    ("link", "chainlink"),
    ("trx", "tron"),
    ("op", "optimism"),
    ("arb", "arbitrum"),
    ("sui", "sui"),
    ("sei", "sei-network"),
    ("near", "near"),
    ("atom", "cosmos"),
    ("cake", "pancakeswap-token"),
    ("pepe", "pepe"),
];

/// Lowercase, trim and drop a leading `$` ("$BTC" -> "btc")
pub fn normalize_token(token: &str) -> String {
    token.trim().trim_start_matches('$').trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_id_is_lowercased() {
        assert_eq!(CoinId::new(" Bitcoin ").as_str(), "bitcoin");
        assert_eq!(CoinId::from("ETHEREUM"), CoinId::new("ethereum"));
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("$BTC"), "btc");
        assert_eq!(normalize_token("  Eth "), "eth");
        assert_eq!(normalize_token("$"), "");
    }

    #[test]
    fn test_entry_aliases_are_normalized() {
        let entry = CoinEntry::new("bitcoin", "BTC").with_alias("Bitcoin").with_alias("  ");
        assert_eq!(entry.symbol, "btc");
        assert_eq!(entry.aliases, vec!["bitcoin".to_string()]);
    }

    #[test]
    fn test_seed_aliases_unique_keys() {
        let mut keys: Vec<&str> = SEED_ALIASES.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }
}
