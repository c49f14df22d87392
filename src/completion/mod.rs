// Chat completion module
// Sends an assembled prompt to a language model and returns its reply

pub mod openai;

use async_trait::async_trait;

use crate::Result;

pub use openai::OpenAiChat;

/// Capability to complete a prompt.
///
/// Failures surface as [`crate::MnemosyneError::Completion`].
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
