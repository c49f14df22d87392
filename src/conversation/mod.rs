// Conversation module
// Runs one retrieval-augmented turn at a time: embed, recall, prompt, complete, remember


pub mod message;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::completion::Completer;
use crate::config::Config;
use crate::database::{DEFAULT_TOP_K, VectorIndex};
use crate::embeddings::Embedder;
use crate::prompt::PromptBuilder;
use crate::{MnemosyneError, Result};

pub use message::{Message, MessageLog, Sender};

/// Progress of the turn currently being processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Embedding,
    Retrieving,
    Composing,
    AwaitingCompletion,
    Persisting,
    /// The last turn failed; the next `send_message` starts over
    Failed { error: String },
}

impl TurnState {
    #[inline]
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Failed { .. })
    }
}

/// Collection names and retrieval parameters for a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub queries_collection: String,
    pub replies_collection: String,
    pub dimension: usize,
    pub top_k: usize,
    pub prompt: PromptBuilder,
}

impl Default for PipelineSettings {
    #[inline]
    fn default() -> Self {
        Self {
            queries_collection: "queries".to_string(),
            replies_collection: "replies".to_string(),
            dimension: crate::config::settings::DEFAULT_EMBEDDING_DIMENSION as usize,
            top_k: DEFAULT_TOP_K,
            prompt: PromptBuilder::default(),
        }
    }
}

impl PipelineSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            queries_collection: config.vector_store.queries_collection.clone(),
            replies_collection: config.vector_store.replies_collection.clone(),
            dimension: config.vector_store.dimension as usize,
            top_k: config.vector_store.top_k,
            prompt: PromptBuilder::new(config.prompt.character_limit),
        }
    }
}

/// Clears the in-flight flag when the turn that set it ends, however it ends
struct TurnGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TurnGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A chat session that recalls earlier exchanges.
///
/// Each turn embeds the user's text, stores it, looks up the nearest earlier queries and replies,
/// and asks the completer to answer with that context. Clones share the same session: message log,
/// turn state and in-flight flag.
#[derive(Clone)]
pub struct ConversationPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    completer: Arc<dyn Completer>,
    settings: Arc<PipelineSettings>,
    log: MessageLog,
    in_flight: Arc<AtomicBool>,
    state: Arc<watch::Sender<TurnState>>,
}

impl ConversationPipeline {
    /// Create a session, making sure both collections exist first
    ///
    /// # Returns
    /// * `Result<Self>` - Ready session, or the store error that prevented setup
    #[inline]
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        completer: Arc<dyn Completer>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        index
            .ensure_collection(&settings.queries_collection, settings.dimension)
            .await?;
        index
            .ensure_collection(&settings.replies_collection, settings.dimension)
            .await?;

        info!(
            "Conversation ready (collections {} and {}, {} dimensions)",
            settings.queries_collection, settings.replies_collection, settings.dimension
        );

        let (state, _) = watch::channel(TurnState::Idle);
        Ok(Self {
            embedder,
            index,
            completer,
            settings: Arc::new(settings),
            log: MessageLog::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            state: Arc::new(state),
        })
    }

    #[inline]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Read-only view of the message history
    #[inline]
    pub fn messages(&self) -> &MessageLog {
        &self.log
    }

    #[inline]
    pub fn state(&self) -> TurnState {
        self.state.borrow().clone()
    }

    /// Watch turn progress; the receiver sees every state published after this call
    #[inline]
    pub fn subscribe_state(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    /// Run one turn and return the assistant's reply.
    ///
    /// The user message is logged before anything else and stays logged if the turn fails.
    /// Embedding and completion failures end the turn with no assistant message; storing the
    /// query or the reply and retrieving context are best effort.
    ///
    /// # Errors
    /// * `Busy` - another turn of this session is still running
    /// * `Embedding` - the user's text could not be embedded
    /// * `Completion` - the model did not produce a reply
    #[inline]
    pub async fn send_message(&self, text: &str) -> Result<Message> {
        let Some(_turn) = TurnGuard::acquire(&self.in_flight) else {
            debug!("Rejecting message while a turn is in flight");
            return Err(MnemosyneError::Busy);
        };

        match self.run_turn(text).await {
            Ok(reply) => {
                self.publish(TurnState::Idle);
                Ok(reply)
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                self.publish(TurnState::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_turn(&self, text: &str) -> Result<Message> {
        let settings = &*self.settings;

        self.log.push(Message::user(text)).await;
        self.publish(TurnState::Embedding);
        let embedding = self.embedder.embed(text).await?;

        self.remember(&settings.queries_collection, text, &embedding)
            .await;

        self.publish(TurnState::Retrieving);
        let (queries, replies) = tokio::join!(
            self.recall(&settings.queries_collection, &embedding),
            self.recall(&settings.replies_collection, &embedding),
        );

        self.publish(TurnState::Composing);
        let prompt = settings.prompt.build(&queries, &replies, text);
        debug!(
            "Prompt built from {} queries and {} replies ({} characters)",
            queries.len(),
            replies.len(),
            prompt.chars().count()
        );

        self.publish(TurnState::AwaitingCompletion);
        let reply = Message::assistant(self.completer.complete(&prompt).await?);
        self.log.push(reply.clone()).await;

        self.publish(TurnState::Persisting);
        match self.embedder.embed(&reply.content).await {
            Ok(reply_embedding) => {
                self.remember(&settings.replies_collection, &reply.content, &reply_embedding)
                    .await;
            }
            Err(e) => warn!("Reply will not be remembered, embedding failed: {}", e),
        }

        Ok(reply)
    }

    /// Store a text for later recall, logging instead of failing
    async fn remember(&self, collection: &str, text: &str, embedding: &[f32]) {
        match self.index.insert(collection, text, embedding).await {
            Ok(id) => debug!("Remembered {} in {}", id, collection),
            Err(e) => warn!("Failed to store text in {}: {}", collection, e),
        }
    }

    /// Nearest texts of a collection; a failed lookup yields no context
    async fn recall(&self, collection: &str, embedding: &[f32]) -> Vec<String> {
        self.index
            .query(collection, embedding, self.settings.top_k)
            .await
            .unwrap_or_else(|e| {
                warn!("Retrieval from {} failed, continuing without it: {}", collection, e);
                Vec::new()
            })
    }

    fn publish(&self, state: TurnState) {
        self.state.send_replace(state);
    }
}
