//! Per-chat settings: the default quote currency used when a message names
//! no target unit.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::store::{JsonStore, StoreError};

/// Quote currencies a chat may pick as its default
pub const ALLOWED_CHAT_FIATS: &[&str] = &["idr", "usd", "usdt", "eur"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ChatPrefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fiat: Option<String>,
}

pub struct ChatSettings {
    store: JsonStore,
    global_default: String,
    // keyed by chat id as string, matching the file layout
    prefs: RwLock<HashMap<String, ChatPrefs>>,
}

impl ChatSettings {
    pub fn load(store: JsonStore, global_default: &str) -> Self {
        let prefs: HashMap<String, ChatPrefs> = store.load_or_default();
        tracing::debug!("Loaded settings for {} chats", prefs.len());
        Self {
            store,
            global_default: global_default.to_lowercase(),
            prefs: RwLock::new(prefs),
        }
    }

    pub fn global_default(&self) -> &str {
        &self.global_default
    }

    pub async fn chat_fiat(&self, chat_id: i64) -> String {
        self.prefs
            .read()
            .await
            .get(&chat_id.to_string())
            .and_then(|p| p.fiat.clone())
            .unwrap_or_else(|| self.global_default.clone())
    }

    /// Set and persist a chat's default; returns the normalized code
    pub async fn set_chat_fiat(&self, chat_id: i64, fiat: &str) -> Result<String, SettingsError> {
        let fiat = fiat.trim().to_lowercase();
        if !ALLOWED_CHAT_FIATS.contains(&fiat.as_str()) {
            return Err(SettingsError::InvalidFiat(fiat));
        }

        let mut prefs = self.prefs.write().await;
        prefs.entry(chat_id.to_string()).or_default().fiat = Some(fiat.clone());
        self.store.save(&*prefs)?;
        tracing::info!("Chat {} default fiat set to {}", chat_id, fiat);
        Ok(fiat)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Unsupported fiat: {0}")]
    InvalidFiat(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_until_set() {
        let settings = ChatSettings::load(JsonStore::in_memory(), "USD");
        assert_eq!(settings.chat_fiat(1).await, "usd");

        assert_eq!(settings.set_chat_fiat(1, "IDR").await.unwrap(), "idr");
        assert_eq!(settings.chat_fiat(1).await, "idr");
        assert_eq!(settings.chat_fiat(2).await, "usd");
    }

    #[tokio::test]
    async fn test_rejects_unsupported() {
        let settings = ChatSettings::load(JsonStore::in_memory(), "usd");
        assert_eq!(
            settings.set_chat_fiat(1, "gbp").await,
            Err(SettingsError::InvalidFiat("gbp".into()))
        );
    }

    #[tokio::test]
    async fn test_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let settings = ChatSettings::load(JsonStore::new(&path), "usd");
        settings.set_chat_fiat(-100123, "eur").await.unwrap();

        let reloaded = ChatSettings::load(JsonStore::new(&path), "usd");
        assert_eq!(reloaded.chat_fiat(-100123).await, "eur");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"-100123\""));
    }
}
