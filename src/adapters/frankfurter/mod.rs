//! Frankfurter Adapter
//!
//! Fiat exchange rates from the ECB reference feed (`/latest`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Number;
use std::str::FromStr;

use crate::domain::FiatCode;
use crate::ports::{FiatRateSource, MarketDataError};

#[derive(Debug, Clone)]
pub struct FrankfurterConfig {
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for FrankfurterConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.frankfurter.app".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, Number>,
}

#[derive(Debug, Clone)]
pub struct FrankfurterClient {
    config: FrankfurterConfig,
    http: Client,
}

impl FrankfurterClient {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_config(FrankfurterConfig::default())
    }

    pub fn with_config(config: FrankfurterConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }
}

fn rate_from(body: &LatestResponse, to: FiatCode) -> Result<Decimal, MarketDataError> {
    let code = to.to_string();
    let raw = body
        .rates
        .get(&code)
        .ok_or_else(|| MarketDataError::RestError(format!("no rate for {}", code)))?;
    let text = raw.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| MarketDataError::ParseError(format!("rate {}: {}", text, e)))
}

#[async_trait]
impl FiatRateSource for FrankfurterClient {
    async fn fiat_rate(&self, from: FiatCode, to: FiatCode) -> Result<Decimal, MarketDataError> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        let url = format!("{}/latest", self.config.api_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("from", from.to_string()), ("to", to.to_string())])
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

        let body: LatestResponse = response.json().await?;
        let rate = rate_from(&body, to)?;
        tracing::debug!("Fiat rate {} -> {} = {}", from, to, rate);
        Ok(rate)
    }
}
