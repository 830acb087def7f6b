//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, load_config_or_default, AlertsSection, CacheSection, ChatSection,
    CoinGeckoSection, Config, ConfigError, EtherscanSection, FearGreedSection, FiatRatesSection,
    LoggingSection, OpenAiSection, TelegramSection,
};
