//! Etherscan Adapter
//!
//! Ethereum gas tiers from the gas tracker oracle. Needs an API key; without
//! one every call reports `Unsupported`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ports::{GasOracle, GasPrices, MarketDataError};

#[derive(Debug, Clone)]
pub struct EtherscanConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.etherscan.io".to_string(),
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// `result` is an object on success and an error string otherwise
#[derive(Debug, Deserialize)]
struct OracleResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GasOracleResult {
    safe_gas_price: String,
    propose_gas_price: String,
    fast_gas_price: String,
}

#[derive(Debug, Clone)]
pub struct EtherscanClient {
    config: EtherscanConfig,
    http: Client,
}

impl EtherscanClient {
    pub fn new(config: EtherscanConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }
}

fn gwei(field: &str, raw: &str) -> Result<Decimal, MarketDataError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| MarketDataError::ParseError(format!("{} {:?}: {}", field, raw, e)))
}

fn prices_from(body: OracleResponse) -> Result<GasPrices, MarketDataError> {
    if body.status != "1" {
        let detail = body.result.as_str().unwrap_or(&body.message);
        return Err(MarketDataError::RestError(format!("gas oracle: {}", detail)));
    }
    let result: GasOracleResult = serde_json::from_value(body.result)
        .map_err(|e| MarketDataError::ParseError(e.to_string()))?;
    Ok(GasPrices {
        safe: gwei("SafeGasPrice", &result.safe_gas_price)?,
        propose: gwei("ProposeGasPrice", &result.propose_gas_price)?,
        fast: gwei("FastGasPrice", &result.fast_gas_price)?,
    })
}

#[async_trait]
impl GasOracle for EtherscanClient {
    async fn gas_prices(&self) -> Result<GasPrices, MarketDataError> {
        let Some(ref key) = self.config.api_key else {
            return Err(MarketDataError::Unsupported("ETHERSCAN_API_KEY is not set".to_string()));
        };

        let url = format!("{}/api", self.config.api_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("module", "gastracker"),
                ("action", "gasoracle"),
                ("apikey", key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarketDataError::RestError(format!("API error {}: {}", status, error_text)));
        }

        prices_from(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_prices_from_body() {
        let body: OracleResponse = serde_json::from_str(
            r#"{"status":"1","message":"OK","result":{"LastBlock":"21000000","SafeGasPrice":"3","ProposeGasPrice":"4.5","FastGasPrice":"6","suggestBaseFee":"2.9","gasUsedRatio":"0.4"}}"#,
        )
        .unwrap();
        let prices = prices_from(body).unwrap();
        assert_eq!(prices.safe, dec!(3));
        assert_eq!(prices.propose, dec!(4.5));
        assert_eq!(prices.fast, dec!(6));
    }

    #[test]
    fn test_error_status_is_rejected() {
        let body: OracleResponse = serde_json::from_str(
            r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#,
        )
        .unwrap();
        match prices_from(body) {
            Err(MarketDataError::RestError(msg)) => assert!(msg.contains("Invalid API Key")),
            other => panic!("expected RestError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_unsupported() {
        let client = EtherscanClient::new(EtherscanConfig::default()).unwrap();
        assert!(!client.is_enabled());
        assert!(matches!(
            client.gas_prices().await,
            Err(MarketDataError::Unsupported(_))
        ));
    }
}
