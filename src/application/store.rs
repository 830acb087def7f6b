//! JSON file persistence for small bot state (chat settings, alerts)

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to serialize state: {0}")]
    SerializationError(String),

    #[error("Failed to write state file: {0}")]
    WriteError(String),

    #[error("Failed to read state file: {0}")]
    ReadError(String),

    #[error("State file is corrupted: {0}")]
    CorruptedFile(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),
}

/// A JSON document on disk; `None` path keeps everything in memory
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: Option<PathBuf>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the document, `T::default()` when the file is absent or empty
    pub fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(T::default());
        };
        if !path.exists() {
            return Ok(T::default());
        }

        let content = fs::read_to_string(path).map_err(|e| StoreError::ReadError(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content)
            .map_err(|e| StoreError::CorruptedFile(format!("{}: {}", path.display(), e)))
    }

    /// Load, falling back to the default (with a warning) on a corrupted file
    pub fn load_or_default<T: DeserializeOwned + Default>(&self) -> T {
        self.load().unwrap_or_else(|e| {
            tracing::warn!("{} - starting with empty state", e);
            T::default()
        })
    }

    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::DirectoryError(e.to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        fs::write(path, content).map_err(|e| StoreError::WriteError(e.to_string()))?;
        Ok(())
    }
}
