use std::sync::Arc;

use anyhow::Result;
use studyhive_schema::Message;
use tracing::warn;

use crate::kv::KeyValueStore;

pub const CHAT_HISTORY_KEY: &str = "chat_history";

/// Persists the whole transcript under a single key.
#[derive(Clone)]
pub struct TranscriptStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TranscriptStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, CHAT_HISTORY_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Load the saved transcript. Missing, unreadable or corrupt data
    /// yields an empty transcript.
    pub async fn load(&self) -> Vec<Message> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                warn!(key = %self.key, %error, "failed to read saved transcript");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => messages,
            Err(error) => {
                warn!(key = %self.key, %error, "discarding corrupt saved transcript");
                Vec::new()
            }
        }
    }

    pub async fn save(&self, messages: &[Message]) -> Result<()> {
        let raw = serde_json::to_string(messages)?;
        self.store.put(&self.key, &raw).await
    }

    pub async fn clear(&self) -> Result<bool> {
        self.store.remove(&self.key).await
    }
}
