use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("AI completion disabled (no API key)")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Completion API error: {0}")]
    Api(String),

    #[error("Empty completion")]
    Empty,
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Http(e.to_string())
    }
}

/// Sampling parameters for a single completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 450,
        }
    }
}

/// Single-turn AI completion
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, CompletionError>;
}
