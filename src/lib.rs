use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MnemosyneError>;

#[derive(Error, Debug)]
pub enum MnemosyneError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(RemoteError),

    #[error("Completion error: {0}")]
    Completion(RemoteError),

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(
        "Dimension mismatch in collection '{collection}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("A message is already being sent in this conversation")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl MnemosyneError {
    /// The remote failure behind an embedding or completion error, if any
    #[inline]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Embedding(e) | Self::Completion(e) => Some(e),
            _ => None,
        }
    }
}

/// Classification of a failed call to a remote model API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Connection refused, DNS failure, timeout or broken transport
    Network,
    /// Missing, invalid or unauthorized credential
    Authentication,
    /// The provider rejected the call with HTTP 429
    RateLimited,
    /// The provider answered with a 5xx status
    Server,
    /// The provider answered but the payload was unusable
    InvalidResponse,
}

impl RemoteErrorKind {
    /// Whether a later attempt of the same call could succeed
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }
}

impl fmt::Display for RemoteErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network failure",
            Self::Authentication => "authentication failed",
            Self::RateLimited => "rate limited",
            Self::Server => "server error",
            Self::InvalidResponse => "invalid response",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    #[inline]
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {}

pub mod commands;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod database;
pub mod embeddings;
pub mod openai;
pub mod prompt;
pub mod retry;
