//! OpenAI-compatible chat completions adapter
//!
//! One system prompt, one user message, one answer. Without an API key the
//! client stays constructible and every call returns `Disabled`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::{CompletionError, CompletionParams, CompletionPort};

pub const SYSTEM_PROMPT: &str = "You are a crypto assistant for Telegram users. \
Respond in Indonesian. Singkat, to-the-point, bullet bila cocok. \
Jika bahas trading, beri disclaimer singkat: bukan saran finansial.";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        if config.api_key.is_none() {
            tracing::info!("No OpenAI API key configured - AI replies disabled");
        }
        Ok(Self { config, http })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn request<'a>(&'a self, prompt: &str, params: CompletionParams) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.to_string(),
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }
}

fn first_answer(response: ChatResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(CompletionError::Empty)
}

#[async_trait]
impl CompletionPort for OpenAiClient {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, CompletionError> {
        let Some(ref key) = self.config.api_key else {
            return Err(CompletionError::Disabled);
        };

        let url = format!("{}/chat/completions", self.config.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&self.request(prompt, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Completion API returned {}", status);
            return Err(CompletionError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Api(format!("Failed to parse response: {}", e)))?;
        first_answer(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_without_key() {
        let client = OpenAiClient::new(OpenAiConfig::default()).unwrap();
        assert!(!client.is_enabled());
        let err = client.complete("hi", CompletionParams::default()).await.unwrap_err();
        assert_eq!(err, CompletionError::Disabled);
    }

    #[test]
    fn test_request_shape() {
        let client = OpenAiClient::new(OpenAiConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        })
        .unwrap();
        let json = serde_json::to_value(client.request("apa itu btc", CompletionParams::default())).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "apa itu btc");
        assert_eq!(json["max_tokens"], 450);
    }

    #[test]
    fn test_first_answer() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"  Halo!  "}}]}"#,
        )
        .unwrap();
        assert_eq!(first_answer(body).unwrap(), "Halo!");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(first_answer(empty), Err(CompletionError::Empty));
    }
}
