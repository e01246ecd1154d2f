//! Key-value persistence for the conversation log.
//!
//! The whole log lives under a single key and every write replaces it.
//! Appends read, extend and rewrite the log while holding the store's write
//! lock, so sessions sharing a store never drop each other's messages.

use crate::history::{Conversation, Message};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage key of the conversation log.
pub const HISTORY_STORAGE_KEY: &str = "farm_assistant_history";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored history is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Returns `None` when nothing has been stored under the key yet.
    async fn load(&self) -> Result<Option<Vec<Message>>, StoreError>;

    /// Replaces the stored log with `messages`.
    async fn save(&self, messages: &[Message]) -> Result<(), StoreError>;

    /// Adds `messages` after whatever is currently stored and returns the
    /// resulting log.
    async fn append(&self, messages: &[Message]) -> Result<Vec<Message>, StoreError>;
}

/// Extends the stored log with `new`. Stored data that cannot be decoded is
/// discarded, and new messages older than the stored tail are restamped.
fn extend_stored(
    stored: Result<Option<Vec<Message>>, StoreError>,
    new: &[Message],
) -> Vec<Message> {
    let stored = match stored {
        Ok(stored) => stored.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Discarding unreadable stored history on append");
            Vec::new()
        }
    };
    let now = new.iter().map(|m| m.timestamp).max().unwrap_or_default();
    let mut log = Conversation::from_stored(stored, now);
    for message in new {
        log.append(message.clone());
    }
    log.into_messages()
}

/// Stores the log as `<dir>/<key>.json`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{HISTORY_STORAGE_KEY}.json")),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read_log(&self) -> Result<Option<Vec<Message>>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let messages = serde_json::from_str(&content)?;
        Ok(Some(messages))
    }

    /// Callers must hold `write_lock`.
    async fn write_log(&self, messages: &[Message]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(messages)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        // Readers only ever see a complete file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await.map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), count = messages.len(), "History written");
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Vec<Message>>, StoreError> {
        self.read_log().await
    }

    async fn save(&self, messages: &[Message]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_log(messages).await
    }

    async fn append(&self, messages: &[Message]) -> Result<Vec<Message>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let stored = match self.read_log().await {
            Err(e @ StoreError::Io { .. }) => return Err(e),
            other => other,
        };
        let log = extend_stored(stored, messages);
        self.write_log(&log).await?;
        Ok(log)
    }
}

/// Raw key-value map in memory, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a raw value under the history key, bypassing serialization.
    pub async fn put_raw(&self, value: impl Into<String>) {
        self.entries
            .lock()
            .await
            .insert(HISTORY_STORAGE_KEY, value.into());
    }

    pub async fn get_raw(&self) -> Option<String> {
        self.entries.lock().await.get(HISTORY_STORAGE_KEY).cloned()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load(&self) -> Result<Option<Vec<Message>>, StoreError> {
        match self.get_raw().await {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, messages: &[Message]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(messages)?;
        self.put_raw(raw).await;
        Ok(())
    }

    async fn append(&self, messages: &[Message]) -> Result<Vec<Message>, StoreError> {
        let mut entries = self.entries.lock().await;
        let stored = match entries.get(HISTORY_STORAGE_KEY) {
            Some(raw) => serde_json::from_str(raw).map(Some).map_err(StoreError::from),
            None => Ok(None),
        };
        let log = extend_stored(stored, messages);
        entries.insert(HISTORY_STORAGE_KEY, serde_json::to_string(&log)?);
        Ok(log)
    }
}
