//! Symbol Registry
//!
//! Case-insensitive alias -> canonical id table. Seeded with pinned aliases,
//! rebuilt wholesale from the remote coin list on first use and then every
//! refresh interval. A failed refresh keeps serving the previous table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::domain::{normalize_token, CoinEntry, CoinId, ConversionError, SEED_ALIASES};
use crate::ports::CoinListSource;

/// Refresh policy for the registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Age after which the table is reloaded
    pub refresh_interval: Duration,
    /// Minimum spacing between reload attempts (success or failure)
    pub retry_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(6 * 3600),
            retry_interval: Duration::from_secs(60),
        }
    }
}

/// Immutable lookup table; replaced, never mutated
#[derive(Debug, Default)]
struct RegistryTable {
    aliases: HashMap<String, CoinId>,
    ids: HashSet<CoinId>,
    /// False until one remote load succeeded
    loaded_remote: bool,
    /// Keys skipped because several coins claim them
    ambiguous: usize,
}

impl RegistryTable {
    fn seed() -> Self {
        let mut table = Self::default();
        for (alias, id) in SEED_ALIASES {
            let id = CoinId::new(*id);
            table.ids.insert(id.clone());
            table.aliases.insert((*alias).to_string(), id);
        }
        table
    }

    fn from_entries(entries: &[CoinEntry]) -> Self {
        let mut table = Self::seed();
        table.loaded_remote = true;

        let mut claims: HashMap<&str, HashSet<&CoinId>> = HashMap::new();
        for entry in entries {
            table.ids.insert(entry.id.clone());
            for key in std::iter::once(&entry.symbol).chain(entry.aliases.iter()) {
                if !key.is_empty() {
                    claims.entry(key.as_str()).or_default().insert(&entry.id);
                }
            }
        }

        for (key, owners) in claims {
            // Seed aliases are pinned
            if table.aliases.contains_key(key) {
                continue;
            }
            let mut owners = owners.into_iter();
            match (owners.next(), owners.next()) {
                (Some(id), None) => {
                    table.aliases.insert(key.to_string(), id.clone());
                }
                _ => table.ambiguous += 1,
            }
        }

        table
    }

    fn lookup(&self, key: &str) -> Option<CoinId> {
        if let Some(id) = self.aliases.get(key) {
            return Some(id.clone());
        }
        let literal = CoinId::new(key);
        if self.ids.contains(&literal) || !self.loaded_remote {
            return Some(literal);
        }
        None
    }
}

#[derive(Debug)]
struct RegistryState {
    table: Arc<RegistryTable>,
    loaded_at: Option<Instant>,
    last_attempt: Option<Instant>,
}

/// Registry statistics for status output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub aliases: usize,
    pub coins: usize,
    pub ambiguous: usize,
    pub loaded_remote: bool,
    pub age: Option<Duration>,
}

/// Owned alias table with a refresh lifecycle
pub struct SymbolRegistry {
    source: Arc<dyn CoinListSource>,
    config: RegistryConfig,
    state: RwLock<RegistryState>,
}

impl SymbolRegistry {
    pub fn new(source: Arc<dyn CoinListSource>, config: RegistryConfig) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(RegistryState {
                table: Arc::new(RegistryTable::seed()),
                loaded_at: None,
                last_attempt: None,
            }),
        }
    }

    /// Resolve a ticker, alias or id to its canonical id
    pub async fn resolve(&self, token: &str) -> Result<CoinId, ConversionError> {
        let key = normalize_token(token);
        if key.is_empty() {
            return Err(ConversionError::UnknownSymbol(token.trim().to_string()));
        }

        if self.needs_refresh().await {
            if let Err(e) = self.refresh().await {
                tracing::warn!("{} - serving cached symbol table", e);
            }
        }

        let table = self.state.read().await.table.clone();
        table
            .lookup(&key)
            .ok_or(ConversionError::UnknownSymbol(key))
    }

    /// Reload the alias table from the remote list.
    ///
    /// On failure the previous table stays in place and a
    /// `StaleRegistry` error is returned for logging.
    pub async fn refresh(&self) -> Result<usize, ConversionError> {
        self.state.write().await.last_attempt = Some(Instant::now());

        let entries = self
            .source
            .fetch_coin_list()
            .await
            .map_err(|e| ConversionError::StaleRegistry(e.to_string()))?;
        if entries.is_empty() {
            return Err(ConversionError::StaleRegistry("remote coin list was empty".into()));
        }

        let table = RegistryTable::from_entries(&entries);
        tracing::info!(
            "Symbol registry loaded: {} coins, {} aliases ({} ambiguous skipped)",
            entries.len(),
            table.aliases.len(),
            table.ambiguous
        );

        let mut state = self.state.write().await;
        state.table = Arc::new(table);
        state.loaded_at = Some(Instant::now());
        Ok(entries.len())
    }

    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        RegistryStats {
            aliases: state.table.aliases.len(),
            coins: state.table.ids.len(),
            ambiguous: state.table.ambiguous,
            loaded_remote: state.table.loaded_remote,
            age: state.loaded_at.map(|t| t.elapsed()),
        }
    }

    async fn needs_refresh(&self) -> bool {
        let state = self.state.read().await;
        let may_retry = state
            .last_attempt
            .map_or(true, |t| t.elapsed() >= self.config.retry_interval);
        let expired = state
            .loaded_at
            .map_or(true, |t| t.elapsed() >= self.config.refresh_interval);
        expired && may_retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockCoinList;

    fn coins() -> Vec<CoinEntry> {
        vec![
            CoinEntry::new("bitcoin", "btc").with_alias("Bitcoin"),
            CoinEntry::new("batcat", "btc"),
            CoinEntry::new("ethereum", "eth").with_alias("ethereum"),
            CoinEntry::new("dogwifcoin", "wif").with_alias("dogwifhat"),
            CoinEntry::new("frog-a", "frog"),
            CoinEntry::new("frog-b", "frog"),
        ]
    }

    fn registry(source: &MockCoinList, config: RegistryConfig) -> SymbolRegistry {
        SymbolRegistry::new(Arc::new(source.clone()), config)
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive() {
        let source = MockCoinList::new(coins());
        let reg = registry(&source, RegistryConfig::default());

        let upper = reg.resolve("BTC").await.unwrap();
        let lower = reg.resolve("btc").await.unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper, CoinId::new("bitcoin"));
        assert_eq!(reg.resolve("$Wif").await.unwrap(), CoinId::new("dogwifcoin"));
    }

    #[tokio::test]
    async fn test_first_use_loads_once() {
        let source = MockCoinList::new(coins());
        let reg = registry(&source, RegistryConfig::default());

        reg.resolve("eth").await.unwrap();
        reg.resolve("wif").await.unwrap();
        assert_eq!(source.call_count(), 1);
        assert!(reg.stats().await.loaded_remote);
    }

    #[tokio::test]
    async fn test_seed_alias_beats_copycats() {
        let source = MockCoinList::new(coins());
        let reg = registry(&source, RegistryConfig::default());
        // "btc" is claimed by two remote coins but pinned by the seed table
        assert_eq!(reg.resolve("btc").await.unwrap(), CoinId::new("bitcoin"));
    }

    #[tokio::test]
    async fn test_ambiguous_symbol_fails_but_id_resolves() {
        let source = MockCoinList::new(coins());
        let reg = registry(&source, RegistryConfig::default());

        assert_eq!(
            reg.resolve("frog").await,
            Err(ConversionError::UnknownSymbol("frog".into()))
        );
        assert_eq!(reg.resolve("frog-b").await.unwrap(), CoinId::new("frog-b"));
        assert_eq!(reg.stats().await.ambiguous, 1);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let source = MockCoinList::new(coins());
        let reg = registry(&source, RegistryConfig::default());
        assert_eq!(
            reg.resolve("xyzzy123").await,
            Err(ConversionError::UnknownSymbol("xyzzy123".into()))
        );
        assert!(matches!(reg.resolve("  ").await, Err(ConversionError::UnknownSymbol(_))));
    }

    #[tokio::test]
    async fn test_literal_fallback_before_first_load() {
        let source = MockCoinList::new(coins());
        source.set_failing(true);
        let reg = registry(&source, RegistryConfig::default());

        assert_eq!(reg.resolve("btc").await.unwrap(), CoinId::new("bitcoin"));
        assert_eq!(reg.resolve("kaspa").await.unwrap(), CoinId::new("kaspa"));
        assert!(!reg.stats().await.loaded_remote);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_serving() {
        let source = MockCoinList::new(coins());
        let config = RegistryConfig {
            refresh_interval: Duration::ZERO,
            retry_interval: Duration::ZERO,
        };
        let reg = registry(&source, config);
        assert_eq!(reg.resolve("wif").await.unwrap(), CoinId::new("dogwifcoin"));

        source.set_failing(true);
        assert!(matches!(reg.refresh().await, Err(ConversionError::StaleRegistry(_))));
        assert_eq!(reg.resolve("wif").await.unwrap(), CoinId::new("dogwifcoin"));
        assert_eq!(reg.resolve("dogwifhat").await.unwrap(), CoinId::new("dogwifcoin"));
    }

    #[tokio::test]
    async fn test_refresh_replaces_table() {
        let source = MockCoinList::new(coins());
        let config = RegistryConfig {
            refresh_interval: Duration::ZERO,
            retry_interval: Duration::ZERO,
        };
        let reg = registry(&source, config);
        assert!(reg.resolve("wif").await.is_ok());

        source.set_coins(vec![CoinEntry::new("bonk", "bonk")]);
        assert_eq!(reg.resolve("bonk").await.unwrap(), CoinId::new("bonk"));
        assert!(reg.resolve("wif").await.is_err());
    }

    #[tokio::test]
    async fn test_retry_interval_spaces_attempts() {
        let source = MockCoinList::new(coins());
        source.set_failing(true);
        let config = RegistryConfig {
            refresh_interval: Duration::from_secs(3600),
            retry_interval: Duration::from_secs(3600),
        };
        let reg = registry(&source, config);

        reg.resolve("btc").await.unwrap();
        reg.resolve("eth").await.unwrap();
        assert_eq!(source.call_count(), 1);
    }
}
