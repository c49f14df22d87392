// Retry policy for the remote model clients
// The clients themselves never retry; wrapping them here is opt-in


use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::Result;
use crate::completion::Completer;
use crate::embeddings::{Embedder, Embedding};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retries transient embedding and completion failures with exponential backoff.
///
/// Only network failures, rate limiting and 5xx responses are retried. Authentication and
/// malformed-response failures are returned on the first attempt.
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    attempts: u32,
    base_delay: Duration,
}

impl<T> Retrying<T> {
    #[inline]
    pub fn new(inner: T, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    #[inline]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.inner
    }

    async fn run<F, Fut, R>(&self, operation: &str, mut call: F) -> Result<R>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R>> + Send,
        R: Send,
    {
        let mut attempt = 1;
        loop {
            debug!("{} attempt {}/{}", operation, attempt, self.attempts);

            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let transient = error.remote().is_some_and(|remote| remote.kind.is_transient());
            if !transient {
                warn!("Non-retryable {} error: {}", operation, error);
                return Err(error);
            }
            if attempt >= self.attempts {
                error!("All {} {} attempts failed", self.attempts, operation);
                return Err(error);
            }

            let delay = self.base_delay * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
            warn!(
                "{} failed ({}), attempt {}/{}; retrying in {:?}",
                operation, error, attempt, self.attempts, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<T: Embedder> Embedder for Retrying<T> {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.run("embedding", || self.inner.embed(text)).await
    }
}

#[async_trait]
impl<T: Completer> Completer for Retrying<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.run("completion", || self.inner.complete(prompt)).await
    }
}
