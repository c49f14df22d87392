// OpenAI-compatible HTTP transport
// Shared by the embedding and chat-completion clients

#[cfg(test)]
mod tests;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::{MnemosyneError, RemoteError, RemoteErrorKind};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Blocking HTTP client for an OpenAI-compatible API.
///
/// Calls are made on the blocking thread pool so the async callers never stall the runtime.
/// No retries happen here; wrap the clients in [`crate::retry::Retrying`] for that.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self, MnemosyneError> {
        let base_url = config
            .openai
            .api_url()
            .map_err(|e| MnemosyneError::Config(e.to_string()))?;

        Ok(Self::with_base_url(base_url, config.api_key())
            .with_timeout(config.openai.timeout()))
    }

    #[inline]
    pub fn with_base_url(base_url: Url, api_key: Option<String>) -> Self {
        Self {
            base_url,
            api_key,
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST `body` as JSON to `endpoint` (relative to the base URL) and decode the JSON reply
    pub(crate) async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, RemoteError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send + 'static,
    {
        let api_key = self.api_key.clone().ok_or_else(|| {
            RemoteError::new(RemoteErrorKind::Authentication, "no API key configured")
        })?;

        let url = self.base_url.join(endpoint).map_err(|e| {
            RemoteError::new(
                RemoteErrorKind::InvalidResponse,
                format!("Failed to build URL for {endpoint}: {e}"),
            )
        })?;

        let request_json = serde_json::to_string(body).map_err(|e| {
            RemoteError::new(
                RemoteErrorKind::InvalidResponse,
                format!("Failed to serialize request: {e}"),
            )
        })?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let agent = self.agent.clone();
        let response_text = tokio::task::spawn_blocking(move || {
            agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &format!("Bearer {api_key}"))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .await
        .map_err(|e| {
            RemoteError::new(
                RemoteErrorKind::Network,
                format!("Request task failed: {e}"),
            )
        })?
        .map_err(classify_error)?;

        serde_json::from_str(&response_text).map_err(|e| {
            RemoteError::new(
                RemoteErrorKind::InvalidResponse,
                format!("Failed to parse response: {e}"),
            )
        })
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Map a transport failure onto the remote error taxonomy
pub(crate) fn classify_error(error: ureq::Error) -> RemoteError {
    match error {
        ureq::Error::StatusCode(status @ (401 | 403)) => {
            warn!("Request rejected with status {}", status);
            RemoteError::new(
                RemoteErrorKind::Authentication,
                format!("HTTP {status}: check the configured API key"),
            )
        }
        ureq::Error::StatusCode(429) => {
            warn!("Request rate limited");
            RemoteError::new(RemoteErrorKind::RateLimited, "HTTP 429: too many requests")
        }
        ureq::Error::StatusCode(status) if status >= 500 => {
            warn!("Server error (status {})", status);
            RemoteError::new(RemoteErrorKind::Server, format!("HTTP {status}"))
        }
        ureq::Error::StatusCode(status) => {
            warn!("Client error (status {})", status);
            RemoteError::new(
                RemoteErrorKind::InvalidResponse,
                format!("HTTP {status}"),
            )
        }
        ureq::Error::Timeout(timeout) => RemoteError::new(
            RemoteErrorKind::Network,
            format!("Request timed out ({timeout:?})"),
        ),
        other => {
            warn!("Transport error: {}", other);
            RemoteError::new(RemoteErrorKind::Network, other.to_string())
        }
    }
}
