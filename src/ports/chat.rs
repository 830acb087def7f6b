use async_trait::async_trait;
use thiserror::Error;

/// Chat transport error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Transport API error: {0}")]
    Api(String),

    #[error("Missing bot token")]
    MissingToken,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

/// One inbound text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn new(chat_id: i64, user_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id,
            text: text.into(),
        }
    }
}

/// Message receipt and delivery
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Wait for the next batch of inbound messages (long poll)
    async fn poll_messages(&self) -> Result<Vec<InboundMessage>, TransportError>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    /// Show a "typing..." indicator; best effort
    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError>;

    /// Name the bot is addressed by in `/cmd@name`, when the transport has one
    async fn bot_username(&self) -> Result<Option<String>, TransportError> {
        Ok(None)
    }
}
