
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Completer;
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::{MnemosyneError, RemoteError, RemoteErrorKind, Result};

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(
            OpenAiClient::new(config)?,
            config.openai.chat_model.clone(),
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
impl Completer for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting completion from {} (prompt length: {})",
            self.model,
            prompt.len()
        );

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response: ChatResponse = self
            .client
            .post_json("chat/completions", &request)
            .await
            .map_err(MnemosyneError::Completion)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                MnemosyneError::Completion(RemoteError::new(
                    RemoteErrorKind::InvalidResponse,
                    "response contained no message content",
                ))
            })?;

        debug!("Received completion (length: {})", content.len());
        Ok(content)
    }
}
