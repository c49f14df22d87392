// Embeddings module
// Turns text into fixed-dimension vectors through a remote embedding API

pub mod openai;

use async_trait::async_trait;

use crate::Result;

pub use openai::OpenAiEmbedder;

/// A dense vector representation of a piece of text
pub type Embedding = Vec<f32>;

/// Capability to embed text.
///
/// Failures surface as [`crate::MnemosyneError::Embedding`].
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}
