//! Price Alerts
//!
//! `AlertBook` owns the persisted alert list; `AlertMonitor` checks it on
//! a fixed interval through the shared price resolver and delivers hits
//! over the chat transport. Alerts are one-shot: a hit removes the alert.
//! Only fiat quotes are accepted, since spot prices are quoted in fiat.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::{format_price, Alert, CoinId, FiatCode};
use crate::ports::ChatTransport;
use super::resolver::PriceResolver;
use super::store::{JsonStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("No active alerts")]
    NoAlerts,

    #[error("Alert index out of range: {0}")]
    OutOfRange(usize),

    #[error("Unsupported alert currency: {0}")]
    UnsupportedQuote(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persisted list of alerts across all chats
pub struct AlertBook {
    store: JsonStore,
    alerts: RwLock<Vec<Alert>>,
}

impl AlertBook {
    pub fn load(store: JsonStore) -> Self {
        let alerts: Vec<Alert> = store.load_or_default();
        tracing::info!("Loaded {} price alerts", alerts.len());
        Self {
            store,
            alerts: RwLock::new(alerts),
        }
    }

    pub async fn add(&self, alert: Alert) -> Result<(), AlertError> {
        if FiatCode::from_code(&alert.quote).is_none() {
            return Err(AlertError::UnsupportedQuote(alert.quote));
        }
        let mut alerts = self.alerts.write().await;
        alerts.push(alert);
        self.store.save(&*alerts)?;
        Ok(())
    }

    /// Alerts of one chat, in insertion order
    pub async fn list(&self, chat_id: i64) -> Vec<Alert> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|a| a.chat_id == chat_id)
            .cloned()
            .collect()
    }

    /// Remove the chat's alert at 1-based `index` (as shown by `list`)
    pub async fn remove(&self, chat_id: i64, index: usize) -> Result<Alert, AlertError> {
        let mut alerts = self.alerts.write().await;
        let positions: Vec<usize> = alerts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.chat_id == chat_id)
            .map(|(i, _)| i)
            .collect();

        if positions.is_empty() {
            return Err(AlertError::NoAlerts);
        }
        let real = index
            .checked_sub(1)
            .and_then(|i| positions.get(i))
            .copied()
            .ok_or(AlertError::OutOfRange(index))?;

        let removed = alerts.remove(real);
        self.store.save(&*alerts)?;
        Ok(removed)
    }

    pub async fn all(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    /// Remove every alert equal to one in `hits`
    pub async fn remove_all(&self, hits: &[Alert]) -> Result<(), AlertError> {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| !hits.contains(a));
        if alerts.len() != before {
            self.store.save(&*alerts)?;
        }
        Ok(())
    }
}

/// Periodic alert checker
pub struct AlertMonitor {
    book: Arc<AlertBook>,
    resolver: Arc<PriceResolver>,
    transport: Arc<dyn ChatTransport>,
    interval: Duration,
    first_delay: Duration,
}

impl AlertMonitor {
    pub fn new(
        book: Arc<AlertBook>,
        resolver: Arc<PriceResolver>,
        transport: Arc<dyn ChatTransport>,
        interval: Duration,
    ) -> Self {
        Self {
            book,
            resolver,
            transport,
            interval,
            first_delay: Duration::from_secs(5),
        }
    }

    /// Set delay before the first check
    pub fn with_first_delay(mut self, delay: Duration) -> Self {
        self.first_delay = delay;
        self
    }

    /// Check until `is_running` flips to false
    pub async fn run(&self, is_running: Arc<RwLock<bool>>) {
        tracing::info!("Alert monitor started - interval: {:?}", self.interval);
        tokio::time::sleep(self.first_delay).await;

        while *is_running.read().await {
            let hits = self.check_once().await;
            if hits > 0 {
                tracing::info!("Alert check delivered {} hits", hits);
            }
            self.resolver.purge_expired().await;
            tokio::time::sleep(self.interval).await;
        }

        tracing::info!("Alert monitor stopped");
    }

    /// Run one check; returns the number of alerts that fired
    pub async fn check_once(&self) -> usize {
        let alerts = self.book.all().await;
        if alerts.is_empty() {
            return 0;
        }

        let mut by_quote: BTreeMap<String, Vec<Alert>> = BTreeMap::new();
        for alert in alerts {
            by_quote.entry(alert.quote.clone()).or_default().push(alert);
        }

        let mut hits = Vec::new();
        for (quote, group) in by_quote {
            // Left over from older alert files
            if FiatCode::from_code(&quote).is_none() {
                tracing::warn!("Skipping {} alerts quoted in unsupported {}", group.len(), quote);
                continue;
            }

            let mut ids: Vec<CoinId> = group.iter().map(|a| a.coin_id.clone()).collect();
            ids.sort();
            ids.dedup();

            let quotes = match self.resolver.get_quotes(&ids, &quote).await {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!("Alert check skipped for {}: {}", quote, e);
                    continue;
                }
            };

            for alert in group {
                let Some(current) = quotes.get(&alert.coin_id) else {
                    continue;
                };
                if !alert.is_hit(current.rate) {
                    continue;
                }

                let text = format!(
                    "⏰ Alert hit: {}\nNow: {}",
                    alert.describe(),
                    format_price(current.rate, &quote)
                );
                if let Err(e) = self.transport.send_message(alert.chat_id, &text).await {
                    tracing::warn!("Failed to deliver alert to chat {}: {}", alert.chat_id, e);
                }
                hits.push(alert);
            }
        }

        if !hits.is_empty() {
            if let Err(e) = self.book.remove_all(&hits).await {
                tracing::error!("Failed to persist alert removal: {}", e);
            }
        }
        hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::resolver::DEFAULT_PRICE_TTL;
    use crate::domain::AlertOp;
    use crate::ports::mocks::{MockFiatRates, MockPriceSource, MockTransport};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn alert(chat_id: i64, id: &str, quote: &str, op: AlertOp, price: Decimal) -> Alert {
        let symbol = match id {
            "bitcoin" => "btc",
            "ethereum" => "eth",
            _ => "sol",
        };
        Alert {
            chat_id,
            symbol: symbol.to_string(),
            coin_id: CoinId::new(id),
            quote: quote.to_string(),
            op,
            price,
        }
    }

    fn monitor(book: Arc<AlertBook>, prices: &MockPriceSource, transport: &MockTransport) -> AlertMonitor {
        let resolver = Arc::new(PriceResolver::new(
            Arc::new(prices.clone()),
            Arc::new(MockFiatRates::new()),
            DEFAULT_PRICE_TTL,
        ));
        AlertMonitor::new(book, resolver, Arc::new(transport.clone()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_add_list_remove_per_chat() {
        let book = AlertBook::load(JsonStore::in_memory());
        book.add(alert(1, "bitcoin", "usd", AlertOp::Above, dec!(70000))).await.unwrap();
        book.add(alert(2, "ethereum", "usd", AlertOp::Below, dec!(3000))).await.unwrap();
        book.add(alert(1, "solana", "idr", AlertOp::Below, dec!(2000000))).await.unwrap();

        assert_eq!(book.list(1).await.len(), 2);
        let removed = book.remove(1, 2).await.unwrap();
        assert_eq!(removed.coin_id, CoinId::new("solana"));
        assert_eq!(book.len().await, 2);

        assert_eq!(book.remove(1, 5).await, Err(AlertError::OutOfRange(5)));
        assert_eq!(book.remove(1, 0).await, Err(AlertError::OutOfRange(0)));
        assert_eq!(book.remove(9, 1).await, Err(AlertError::NoAlerts));
    }

    #[tokio::test]
    async fn test_alerts_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.json");

        let book = AlertBook::load(JsonStore::new(&path));
        book.add(alert(1, "bitcoin", "usd", AlertOp::Above, dec!(70000))).await.unwrap();

        let reloaded = AlertBook::load(JsonStore::new(&path));
        assert_eq!(reloaded.list(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_hit_is_delivered_and_removed() {
        let book = Arc::new(AlertBook::load(JsonStore::in_memory()));
        book.add(alert(1, "bitcoin", "usd", AlertOp::Above, dec!(60000))).await.unwrap();
        book.add(alert(1, "ethereum", "usd", AlertOp::Below, dec!(3000))).await.unwrap();

        let prices = MockPriceSource::new()
            .with_price("bitcoin", "usd", dec!(65000))
            .with_price("ethereum", "usd", dec!(3250));
        let transport = MockTransport::new();
        let monitor = monitor(book.clone(), &prices, &transport);

        assert_eq!(monitor.check_once().await, 1);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[0].1, "⏰ Alert hit: BTC USD above 60000\nNow: $65,000.00");

        let left = book.all().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].coin_id, CoinId::new("ethereum"));

        // One batched fetch for both ids
        assert_eq!(prices.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_group() {
        let book = Arc::new(AlertBook::load(JsonStore::in_memory()));
        book.add(alert(1, "bitcoin", "usd", AlertOp::Above, dec!(1))).await.unwrap();

        let prices = MockPriceSource::new();
        prices.set_failing(true);
        let transport = MockTransport::new();
        let monitor = monitor(book.clone(), &prices, &transport);

        assert_eq!(monitor.check_once().await, 0);
        assert!(transport.sent().is_empty());
        assert_eq!(book.len().await, 1);
    }

    #[tokio::test]
    async fn test_non_fiat_quote_is_rejected() {
        let book = AlertBook::load(JsonStore::in_memory());

        let err = book
            .add(alert(1, "bitcoin", "usdt", AlertOp::Above, dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err, AlertError::UnsupportedQuote("usdt".into()));
        assert_eq!(book.len().await, 0);

        book.add(alert(1, "bitcoin", "eur", AlertOp::Above, dec!(1))).await.unwrap();
        assert_eq!(book.len().await, 1);
    }

    #[tokio::test]
    async fn test_stored_non_fiat_alert_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.json");
        std::fs::write(
            &path,
            r#"[{"chat_id":1,"symbol":"btc","coin_id":"bitcoin","quote":"xyz","op":"above","price":"1"}]"#,
        )
        .unwrap();
        let book = Arc::new(AlertBook::load(JsonStore::new(&path)));
        assert_eq!(book.len().await, 1);

        let prices = MockPriceSource::new().with_price("bitcoin", "xyz", dec!(5));
        let transport = MockTransport::new();
        let monitor = monitor(book, &prices, &transport);

        assert_eq!(monitor.check_once().await, 0);
        assert_eq!(prices.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_loop_purges_expired_prices() {
        let book = Arc::new(AlertBook::load(JsonStore::in_memory()));
        book.add(alert(1, "bitcoin", "usd", AlertOp::Above, dec!(90000))).await.unwrap();

        let prices = MockPriceSource::new().with_price("bitcoin", "usd", dec!(65000));
        let resolver = Arc::new(PriceResolver::new(
            Arc::new(prices.clone()),
            Arc::new(MockFiatRates::new()),
            Duration::ZERO,
        ));
        let transport = MockTransport::new();
        let monitor = Arc::new(
            AlertMonitor::new(book, resolver.clone(), Arc::new(transport), Duration::from_millis(10))
                .with_first_delay(Duration::ZERO),
        );

        let running = Arc::new(RwLock::new(true));
        let task = {
            let monitor = monitor.clone();
            let running = running.clone();
            tokio::spawn(async move { monitor.run(running).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        *running.write().await = false;
        task.await.unwrap();

        assert!(prices.call_count() >= 1);
        assert_eq!(resolver.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_book_makes_no_calls() {
        let book = Arc::new(AlertBook::load(JsonStore::in_memory()));
        let prices = MockPriceSource::new();
        let transport = MockTransport::new();
        let monitor = monitor(book, &prices, &transport);

        assert_eq!(monitor.check_once().await, 0);
        assert_eq!(prices.call_count(), 0);
    }
}
