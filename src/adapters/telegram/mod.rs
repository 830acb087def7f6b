//! Telegram Bot API Adapter
//!
//! Long-polling `getUpdates` transport with `sendMessage` and
//! `sendChatAction` for replies. Updates queued while the bot was offline
//! are skipped on the first poll unless `drop_pending_updates` is off.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::ports::{ChatTransport, InboundMessage, TransportError};

/// Telegram rejects messages longer than this
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base_url: String,
    pub bot_token: String,
    /// Long-poll wait in seconds
    pub poll_timeout_secs: u64,
    pub drop_pending_updates: bool,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            bot_token: bot_token.into(),
            poll_timeout_secs: 30,
            drop_pending_updates: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

/// `getMe` result
#[derive(Debug, Deserialize)]
struct TelegramBot {
    username: Option<String>,
}

pub struct TelegramTransport {
    config: TelegramConfig,
    client: Client,
    /// `None` until the first poll
    last_update_id: RwLock<Option<i64>>,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self, TransportError> {
        if config.bot_token.trim().is_empty() {
            return Err(TransportError::MissingToken);
        }
        // Long polls need a client timeout above the poll wait
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            config,
            client,
            last_update_id: RwLock::new(None),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base_url, self.config.bot_token, method)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await?;

        let status = response.status();
        let body: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Api(format!("{} HTTP {}: {}", method, status, e)))?;

        if !body.ok {
            return Err(TransportError::Api(format!(
                "{} failed: {}",
                method,
                body.description.unwrap_or_else(|| status.to_string())
            )));
        }
        Ok(body.result)
    }

    /// Jump past queued updates; returns the id of the newest skipped one
    async fn skip_backlog(&self) -> Result<Option<i64>, TransportError> {
        // offset -1 returns only the newest pending update
        let params = serde_json::json!({
            "offset": -1,
            "timeout": 0,
            "allowed_updates": ["message"],
        });
        let pending: Vec<TelegramUpdate> = self.call("getUpdates", params).await?.unwrap_or_default();
        Ok(newest_update_id(&pending))
    }
}

fn newest_update_id(updates: &[TelegramUpdate]) -> Option<i64> {
    updates.iter().map(|u| u.update_id).max()
}

fn poll_params(last_update_id: Option<i64>, timeout_secs: u64) -> serde_json::Value {
    serde_json::json!({
        "offset": last_update_id.map_or(0, |id| id + 1),
        "timeout": timeout_secs,
        "allowed_updates": ["message"],
    })
}

/// Split `text` into chunks Telegram accepts, on char boundaries
fn split_message(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= MAX_MESSAGE_CHARS {
        return vec![text.to_string()];
    }
    chars
        .chunks(MAX_MESSAGE_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn into_inbound(update: TelegramUpdate) -> Option<InboundMessage> {
    let message = update.message?;
    let text = message.text?;
    let user_id = message.from.map_or(message.chat.id, |u| u.id);
    Some(InboundMessage::new(message.chat.id, user_id, text))
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn poll_messages(&self) -> Result<Vec<InboundMessage>, TransportError> {
        let mut last_id = *self.last_update_id.read().await;

        if last_id.is_none() && self.config.drop_pending_updates {
            if let Some(skipped) = self.skip_backlog().await? {
                tracing::info!("Dropped pending Telegram updates up to {}", skipped);
                last_id = Some(skipped);
                *self.last_update_id.write().await = last_id;
            }
        }

        let params = poll_params(last_id, self.config.poll_timeout_secs);
        let updates: Vec<TelegramUpdate> = self.call("getUpdates", params).await?.unwrap_or_default();

        if let Some(newest) = newest_update_id(&updates) {
            *self.last_update_id.write().await = Some(newest);
        }
        tracing::debug!("Telegram poll returned {} updates", updates.len());

        Ok(updates.into_iter().filter_map(into_inbound).collect())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        for chunk in split_message(text) {
            let params = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
                "disable_web_page_preview": true,
            });
            self.call::<serde_json::Value>("sendMessage", params).await?;
        }
        tracing::debug!("Reply sent to chat {}", chat_id);
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        let params = serde_json::json!({ "chat_id": chat_id, "action": "typing" });
        self.call::<serde_json::Value>("sendChatAction", params).await?;
        Ok(())
    }

    async fn bot_username(&self) -> Result<Option<String>, TransportError> {
        let me: Option<TelegramBot> = self.call("getMe", serde_json::json!({})).await?;
        Ok(me.and_then(|bot| bot.username))
    }
}
