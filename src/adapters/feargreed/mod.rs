//! Fear & Greed Adapter
//!
//! Crypto sentiment index from alternative.me (`/fng/`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::ports::{FearGreed, MarketDataError, SentimentSource};

#[derive(Debug, Clone)]
pub struct FearGreedConfig {
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for FearGreedConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.alternative.me".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

/// The API sends the value as a string (`"value": "40"`)
#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
}

#[derive(Debug, Clone)]
pub struct FearGreedClient {
    config: FearGreedConfig,
    http: Client,
}

impl FearGreedClient {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_config(FearGreedConfig::default())
    }

    pub fn with_config(config: FearGreedConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }
}

fn reading_from(body: FngResponse) -> Result<FearGreed, MarketDataError> {
    let entry = body
        .data
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::RestError("empty index data".to_string()))?;
    let value = entry
        .value
        .trim()
        .parse::<u8>()
        .map_err(|e| MarketDataError::ParseError(format!("index value {:?}: {}", entry.value, e)))?;
    Ok(FearGreed {
        value,
        classification: entry.value_classification,
    })
}

#[async_trait]
impl SentimentSource for FearGreedClient {
    async fn fear_greed(&self) -> Result<FearGreed, MarketDataError> {
        let url = format!("{}/fng/", self.config.api_base_url);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarketDataError::RestError(format!("API error {}: {}", status, error_text)));
        }

        let reading = reading_from(response.json().await?)?;
        tracing::debug!("Fear & Greed = {} ({})", reading.value, reading.classification);
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_from_body() {
        let body: FngResponse = serde_json::from_str(
            r#"{"name":"Fear and Greed Index","data":[{"value":"72","value_classification":"Greed","timestamp":"1760832000","time_until_update":"3600"}],"metadata":{"error":null}}"#,
        )
        .unwrap();
        let reading = reading_from(body).unwrap();
        assert_eq!(reading.value, 72);
        assert_eq!(reading.classification, "Greed");
    }

    #[test]
    fn test_empty_data_is_an_error() {
        let body: FngResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(reading_from(body), Err(MarketDataError::RestError(_))));

        let body: FngResponse =
            serde_json::from_str(r#"{"data":[{"value":"n/a","value_classification":"?"}]}"#).unwrap();
        assert!(matches!(reading_from(body), Err(MarketDataError::ParseError(_))));
    }
}
