use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry of a conversation. Messages are never edited once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    #[inline]
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }
}

/// Append-only, ordered message history shared between a pipeline and its readers.
///
/// Readers only ever get snapshots; appending is reserved to the pipeline that owns the log.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl MessageLog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn push(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    /// Copy of every message logged so far, oldest first
    #[inline]
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    #[inline]
    pub async fn last(&self) -> Option<Message> {
        self.messages.read().await.last().cloned()
    }
}
