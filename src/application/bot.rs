//! Bot Service
//!
//! Long-polling loop: pulls message batches from the chat transport, routes
//! them one at a time and sends the replies back. Messages the router drops
//! (empty, throttled, addressed to another bot) get no typing indicator.
//! The alert monitor runs beside it as its own task and stops with the same
//! running flag.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::ports::{ChatTransport, InboundMessage, TransportError};
use super::alerts::AlertMonitor;
use super::registry::SymbolRegistry;
use super::router::MessageRouter;

/// Counters for the status snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotStatus {
    pub is_running: bool,
    pub messages_handled: u64,
    pub replies_sent: u64,
    pub poll_errors: u64,
}

pub struct BotService {
    router: Arc<MessageRouter>,
    transport: Arc<dyn ChatTransport>,
    registry: Arc<SymbolRegistry>,
    monitor: Option<Arc<AlertMonitor>>,
    is_running: Arc<RwLock<bool>>,
    counters: Arc<RwLock<BotStatus>>,
    error_backoff: Duration,
    idle_delay: Duration,
}

impl BotService {
    pub fn new(
        router: Arc<MessageRouter>,
        transport: Arc<dyn ChatTransport>,
        registry: Arc<SymbolRegistry>,
    ) -> Self {
        Self {
            router,
            transport,
            registry,
            monitor: None,
            is_running: Arc::new(RwLock::new(false)),
            counters: Arc::new(RwLock::new(BotStatus::default())),
            error_backoff: Duration::from_secs(3),
            idle_delay: Duration::from_millis(200),
        }
    }

    pub fn with_alert_monitor(mut self, monitor: Arc<AlertMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Pause after a poll that returned nothing
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Poll and answer until `stop` is called
    pub async fn run(&self) {
        *self.is_running.write().await = true;
        tracing::info!("Starting bot service");

        match self.registry.refresh().await {
            Ok(count) => tracing::info!("Symbol registry warmed up with {} coins", count),
            Err(e) => tracing::warn!("{} - starting with built-in aliases", e),
        }

        match self.transport.bot_username().await {
            Ok(Some(name)) => {
                tracing::info!("Answering commands addressed to @{}", name);
                self.router.set_bot_username(&name);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Bot username lookup failed: {} - answering every command", e),
        }

        let monitor_task = self.monitor.clone().map(|monitor| {
            let flag = Arc::clone(&self.is_running);
            tokio::spawn(async move { monitor.run(flag).await })
        });

        while *self.is_running.read().await {
            match self.poll_once().await {
                Ok(0) => tokio::time::sleep(self.idle_delay).await,
                Ok(_) => {}
                Err(e) => {
                    self.counters.write().await.poll_errors += 1;
                    tracing::error!("Polling failed: {}", e);
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }

        if let Some(task) = monitor_task {
            task.abort();
        }
        tracing::info!("Bot service stopped");
    }

    /// Handle one batch; returns the number of messages in it
    pub async fn poll_once(&self) -> Result<usize, TransportError> {
        let batch = self.transport.poll_messages().await?;
        for msg in &batch {
            self.process(msg).await;
        }
        Ok(batch.len())
    }

    async fn process(&self, msg: &InboundMessage) {
        self.counters.write().await.messages_handled += 1;
        let Some(route) = self.router.prepare(msg) else {
            return;
        };

        if let Err(e) = self.transport.send_typing(msg.chat_id).await {
            tracing::debug!("Typing indicator failed for chat {}: {}", msg.chat_id, e);
        }

        let reply = self.router.respond(msg.chat_id, &route).await;
        match self.transport.send_message(msg.chat_id, &reply).await {
            Ok(()) => self.counters.write().await.replies_sent += 1,
            Err(e) => tracing::warn!("Failed to reply to chat {}: {}", msg.chat_id, e),
        }
    }

    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        tracing::info!("Stop signal sent to bot service");
    }

    pub async fn status(&self) -> BotStatus {
        let mut status = self.counters.read().await.clone();
        status.is_running = *self.is_running.read().await;
        status
    }
}

impl Clone for BotService {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            transport: Arc::clone(&self.transport),
            registry: Arc::clone(&self.registry),
            monitor: self.monitor.clone(),
            is_running: Arc::clone(&self.is_running),
            counters: Arc::clone(&self.counters),
            error_backoff: self.error_backoff,
            idle_delay: self.idle_delay,
        }
    }
}
