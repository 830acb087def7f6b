//! CoinGecko API Client
//!
//! Implements the coin list, spot price, market overview and OHLC ports against
//! the public (or demo-key) CoinGecko v3 API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::domain::{CoinEntry, CoinId};
use crate::ports::{
    Candle, CoinListSource, MarketCoin, MarketDataError, MarketOverviewSource, PriceSource,
    SpotPrice,
};
use super::types::{
    number_to_decimal, CoinListItem, GlobalResponse, MarketItem, OhlcResponse,
    SimplePriceResponse,
};

/// Ids per `/simple/price` request; longer lists are split
const MAX_IDS_PER_REQUEST: usize = 100;

/// CoinGecko client configuration
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub api_base_url: String,
    /// Demo API key, sent as `x-cg-demo-api-key`
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            timeout: Duration::from_secs(20),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    http: Client,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_config(CoinGeckoConfig::default())
    }

    pub fn with_config(config: CoinGeckoConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("coinrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MarketDataError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    /// GET `path` with query parameters and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let mut req = self.http.get(&url).query(query);
        if let Some(ref key) = self.config.api_key {
            req = req.header("x-cg-demo-api-key", key);
        }

        let response = self
            .execute_with_retry(|| async {
                req.try_clone()
                    .ok_or_else(|| MarketDataError::Http("Failed to clone request".into()))?
                    .send()
                    .await
                    .map_err(MarketDataError::from)
            })
            .await?;

        self.handle_response(response).await
    }

    /// Retry transport errors and 5xx; back off exponentially on 429
    async fn execute_with_retry<F, Fut>(&self, request_fn: F) -> Result<reqwest::Response, MarketDataError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, MarketDataError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                        tracing::warn!(
                            "CoinGecko rate limited (429), backing off for {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.config.max_retries
                        );
                        last_error = Some(MarketDataError::RateLimited);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if status.is_server_error() {
                        last_error = Some(MarketDataError::RestError(format!("Server error: {}", status)));
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    tracing::debug!("CoinGecko request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MarketDataError::Http("Max retries exceeded".into())))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, MarketDataError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarketDataError::RestError(format!("API error {}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| MarketDataError::ParseError(format!("Failed to parse response: {}", e)))
    }
}

/// Map one `/simple/price` body onto spot prices for `quote`
fn spot_prices(body: SimplePriceResponse, quote: &str) -> HashMap<CoinId, SpotPrice> {
    let change_key = format!("{}_24h_change", quote);

    body.into_iter()
        .filter_map(|(id, fields)| {
            let rate = fields.get(quote)?.as_ref().and_then(number_to_decimal)?;
            let change_24h = fields
                .get(&change_key)
                .and_then(|v| v.as_ref())
                .and_then(number_to_decimal);
            Some((CoinId::new(id), SpotPrice { rate, change_24h }))
        })
        .collect()
}

/// Map an `/ohlc` body onto candles; malformed rows are an error
fn candles(body: OhlcResponse) -> Result<Vec<Candle>, MarketDataError> {
    body.into_iter()
        .map(|row| {
            let [time, open, high, low, close] = row.as_slice() else {
                return Err(MarketDataError::ParseError(format!(
                    "OHLC row has {} fields",
                    row.len()
                )));
            };
            let time = time
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| MarketDataError::ParseError(format!("bad OHLC time {}", time)))?;
            let price = |n: &serde_json::Number| {
                number_to_decimal(n)
                    .ok_or_else(|| MarketDataError::ParseError(format!("bad OHLC price {}", n)))
            };
            Ok(Candle {
                time,
                open: price(open)?,
                high: price(high)?,
                low: price(low)?,
                close: price(close)?,
            })
        })
        .collect()
}

/// Registry entry for one listed coin; one-word names double as aliases
fn coin_entry(item: CoinListItem) -> CoinEntry {
    let entry = CoinEntry::new(item.id, item.symbol);
    let name = item.name.trim().to_lowercase();
    if !name.is_empty() && !name.contains(char::is_whitespace) && name != entry.symbol {
        entry.with_alias(name)
    } else {
        entry
    }
}

#[async_trait]
impl CoinListSource for CoinGeckoClient {
    async fn fetch_coin_list(&self) -> Result<Vec<CoinEntry>, MarketDataError> {
        let items: Vec<CoinListItem> = self.get_json("/coins/list", &[]).await?;
        tracing::debug!("CoinGecko coin list: {} entries", items.len());
        Ok(items.into_iter().map(coin_entry).collect())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_prices(
        &self,
        ids: &[CoinId],
        quote: &str,
    ) -> Result<HashMap<CoinId, SpotPrice>, MarketDataError> {
        let quote = quote.trim().to_lowercase();
        let mut prices = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk.iter().map(CoinId::as_str).collect::<Vec<_>>().join(",");
            let body: SimplePriceResponse = self
                .get_json(
                    "/simple/price",
                    &[
                        ("ids", joined),
                        ("vs_currencies", quote.clone()),
                        ("include_24hr_change", "true".to_string()),
                    ],
                )
                .await?;
            prices.extend(spot_prices(body, &quote));
        }

        Ok(prices)
    }
}

#[async_trait]
impl MarketOverviewSource for CoinGeckoClient {
    async fn top_markets(&self, quote: &str, limit: usize) -> Result<Vec<MarketCoin>, MarketDataError> {
        let items: Vec<MarketItem> = self
            .get_json(
                "/coins/markets",
                &[
                    ("vs_currency", quote.to_lowercase()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", limit.to_string()),
                    ("page", "1".to_string()),
                    ("price_change_percentage", "24h".to_string()),
                ],
            )
            .await?;

        Ok(items
            .into_iter()
            .map(|item| MarketCoin {
                symbol: item.symbol,
                name: item.name,
                price: item.current_price.unwrap_or_default(),
                change_24h: item.price_change_percentage_24h,
            })
            .collect())
    }

    async fn btc_dominance(&self) -> Result<f64, MarketDataError> {
        let global: GlobalResponse = self.get_json("/global", &[]).await?;
        global
            .data
            .market_cap_percentage
            .get("btc")
            .copied()
            .ok_or_else(|| MarketDataError::ParseError("market_cap_percentage.btc missing".into()))
    }

    async fn ohlc(&self, id: &CoinId, quote: &str, days: u32) -> Result<Vec<Candle>, MarketDataError> {
        let body: OhlcResponse = self
            .get_json(
                &format!("/coins/{}/ohlc", id.as_str()),
                &[("vs_currency", quote.to_lowercase()), ("days", days.to_string())],
            )
            .await?;
        candles(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_creation() {
        let client = CoinGeckoClient::new().unwrap();
        assert_eq!(client.api_base_url(), "https://api.coingecko.com/api/v3");
    }

    #[test]
    fn test_spot_prices_mapping() {
        let body: SimplePriceResponse = serde_json::from_str(
            r#"{"bitcoin":{"usd":65000.5,"usd_24h_change":2.5},"ethereum":{"eur":3000},"tether":{"usd":null}}"#,
        )
        .unwrap();

        let prices = spot_prices(body, "usd");
        assert_eq!(prices.len(), 1);
        let btc = prices[&CoinId::new("bitcoin")];
        assert_eq!(btc.rate, dec!(65000.5));
        assert_eq!(btc.change_24h, Some(dec!(2.5)));
    }

    #[test]
    fn test_ohlc_rows_become_candles() {
        let body: OhlcResponse = serde_json::from_str(
            r#"[[1709251200000,61000.5,62000,60500,61800.25],[1709265600000,61800.25,63000,61700,62950]]"#,
        )
        .unwrap();

        let candles = candles(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 00:00");
        assert_eq!(candles[0].open, dec!(61000.5));
        assert_eq!(candles[1].close, dec!(62950));
    }

    #[test]
    fn test_short_ohlc_row_is_rejected() {
        let body: OhlcResponse = serde_json::from_str("[[1709251200000,1,2,3]]").unwrap();
        assert!(matches!(candles(body), Err(MarketDataError::ParseError(_))));
    }

    #[test]
    fn test_coin_entry_aliases() {
        let entry = coin_entry(CoinListItem {
            id: "dogecoin".into(),
            symbol: "DOGE".into(),
            name: "Dogecoin".into(),
        });
        assert_eq!(entry.symbol, "doge");
        assert_eq!(entry.aliases, vec!["dogecoin".to_string()]);

        let entry = coin_entry(CoinListItem {
            id: "bitcoin-cash".into(),
            symbol: "bch".into(),
            name: "Bitcoin Cash".into(),
        });
        assert!(entry.aliases.is_empty());
    }
}
