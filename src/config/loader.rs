//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching
//! config/default.toml. Secrets may be left empty in the file and supplied
//! through the environment (`.env` is loaded in `main`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::ALLOWED_CHAT_FIATS;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub coingecko: CoinGeckoSection,
    #[serde(default)]
    pub fiat_rates: FiatRatesSection,
    #[serde(default)]
    pub fear_greed: FearGreedSection,
    #[serde(default)]
    pub etherscan: EtherscanSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub alerts: AlertsSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Telegram Bot API section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    /// Bot token from @BotFather (prefer BOT_TOKEN in .env)
    pub bot_token: String,
    /// Long-poll wait in seconds (Telegram caps this at 50)
    pub poll_timeout_secs: u64,
    /// Skip updates queued while the bot was offline
    pub drop_pending_updates: bool,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            poll_timeout_secs: 30,
            drop_pending_updates: true,
        }
    }
}

impl TelegramSection {
    /// Config value first, then BOT_TOKEN
    pub fn get_bot_token(&self) -> Option<String> {
        non_empty(&self.bot_token).or_else(|| env_non_empty("BOT_TOKEN"))
    }
}

/// CoinGecko API section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoinGeckoSection {
    pub api_url: String,
    /// Demo API key (optional, raises rate limits)
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for CoinGeckoSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: String::new(),
            timeout_secs: 20,
            max_retries: 3,
        }
    }
}

impl CoinGeckoSection {
    /// Config value first, then COINGECKO_API_KEY
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| env_non_empty("COINGECKO_API_KEY"))
    }
}

/// Fiat exchange rate source section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FiatRatesSection {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for FiatRatesSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.frankfurter.app".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Fear & Greed index section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FearGreedSection {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for FearGreedSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.alternative.me".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Etherscan gas oracle section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtherscanSection {
    pub api_url: String,
    /// Leave empty to use ETHERSCAN_API_KEY; no key disables /gas
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for EtherscanSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.etherscan.io".to_string(),
            api_key: String::new(),
            timeout_secs: 15,
        }
    }
}

impl EtherscanSection {
    /// Config value first, then ETHERSCAN_API_KEY
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| env_non_empty("ETHERSCAN_API_KEY"))
    }
}

/// Cache lifetimes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Spot and fiat rate lifetime
    pub price_ttl_secs: u64,
    /// Coin list reload interval
    pub registry_refresh_hours: u64,
    /// Spacing between coin list reload attempts
    pub registry_retry_secs: u64,
    /// Price cache size that triggers eviction of expired entries
    pub max_price_entries: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            price_ttl_secs: 30,
            registry_refresh_hours: 6,
            registry_retry_secs: 60,
            max_price_entries: 2048,
        }
    }
}

impl CacheSection {
    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }

    pub fn registry_refresh(&self) -> Duration {
        Duration::from_secs(self.registry_refresh_hours * 3600)
    }

    pub fn registry_retry(&self) -> Duration {
        Duration::from_secs(self.registry_retry_secs)
    }
}

/// Chat behaviour and state files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Quote currency when a chat has not picked one
    pub default_fiat: String,
    /// Minimum spacing between handled free-text messages
    pub throttle_ms: u64,
    /// Directory for settings.json and alerts.json
    pub data_dir: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            default_fiat: "idr".to_string(),
            throttle_ms: 1000,
            data_dir: "data".to_string(),
        }
    }
}

impl ChatSection {
    /// FIAT_DEFAULT wins when it names an allowed currency
    pub fn get_default_fiat(&self) -> String {
        env_non_empty("FIAT_DEFAULT")
            .map(|f| f.to_lowercase())
            .filter(|f| ALLOWED_CHAT_FIATS.contains(&f.as_str()))
            .unwrap_or_else(|| self.default_fiat.to_lowercase())
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Data directory with `~` expanded
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_path().join("settings.json")
    }

    pub fn alerts_file(&self) -> PathBuf {
        self.data_path().join("alerts.json")
    }
}

/// Price alert loop
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsSection {
    pub enabled: bool,
    pub check_interval_secs: u64,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 60,
        }
    }
}

/// AI completion section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub api_url: String,
    /// Leave empty to use OPENAI_API_KEY; no key disables AI replies
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
        }
    }
}

impl OpenAiSection {
    /// Config value first, then OPENAI_API_KEY
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(&self.api_key).or_else(|| env_non_empty("OPENAI_API_KEY"))
    }

    /// OPENAI_MODEL overrides the configured model
    pub fn get_model(&self) -> String {
        env_non_empty("OPENAI_MODEL").unwrap_or_else(|| self.model.clone())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Like `load_config`, but a missing file yields the built-in defaults
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!("Config file {} not found - using defaults", path.display());
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    load_config(path)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.price_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.price_ttl_secs must be > 0".into(),
            ));
        }

        if self.cache.registry_refresh_hours == 0 {
            return Err(ConfigError::ValidationError(
                "cache.registry_refresh_hours must be > 0".into(),
            ));
        }

        let fiat = self.chat.default_fiat.to_lowercase();
        if !ALLOWED_CHAT_FIATS.contains(&fiat.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "chat.default_fiat must be one of {}, got '{}'",
                ALLOWED_CHAT_FIATS.join(", "),
                self.chat.default_fiat
            )));
        }

        if self.chat.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "chat.data_dir must not be empty".into(),
            ));
        }

        if self.alerts.enabled && self.alerts.check_interval_secs < 10 {
            return Err(ConfigError::ValidationError(format!(
                "alerts.check_interval_secs must be >= 10, got {}",
                self.alerts.check_interval_secs
            )));
        }

        if self.telegram.poll_timeout_secs > 50 {
            return Err(ConfigError::ValidationError(format!(
                "telegram.poll_timeout_secs must be <= 50, got {}",
                self.telegram.poll_timeout_secs
            )));
        }

        if self.cache.max_price_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_price_entries must be > 0".into(),
            ));
        }

        if self.coingecko.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "coingecko.max_retries must be >= 1".into(),
            ));
        }

        for (name, url) in [
            ("coingecko.api_url", &self.coingecko.api_url),
            ("fiat_rates.api_url", &self.fiat_rates.api_url),
            ("fear_greed.api_url", &self.fear_greed.api_url),
            ("etherscan.api_url", &self.etherscan.api_url),
            ("openai.api_url", &self.openai.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| non_empty(&v))
}
