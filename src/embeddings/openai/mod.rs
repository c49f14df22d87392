
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, Embedding};
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::{MnemosyneError, RemoteError, RemoteErrorKind, Result};

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(
            OpenAiClient::new(config)?,
            config.openai.embedding_model.clone(),
        ))
    }

    #[inline]
    pub fn with_client(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response: EmbedResponse = self
            .client
            .post_json("embeddings", &request)
            .await
            .map_err(MnemosyneError::Embedding)?;

        let embedding = response
            .data
            .into_iter()
            .min_by_key(|data| data.index)
            .map(|data| data.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                MnemosyneError::Embedding(RemoteError::new(
                    RemoteErrorKind::InvalidResponse,
                    "response contained no embedding",
                ))
            })?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }
}
