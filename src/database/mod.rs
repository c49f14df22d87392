// Database module
// Vector collections holding past queries and replies for nearest-neighbor recall

pub mod lancedb;
pub mod memory;


use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MnemosyneError, Result};

pub use self::lancedb::LanceVectorStore;
pub use memory::MemoryVectorStore;

/// Default number of neighbors returned by [`VectorIndex::query`]
pub const DEFAULT_TOP_K: usize = 3;

/// One historical query or reply and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    /// RFC 3339 timestamp of insertion
    pub created_at: String,
}

impl StoredRecord {
    #[inline]
    pub fn new(text: &str, embedding: &[f32]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            embedding: embedding.to_vec(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A stored text and its distance to the query vector
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    /// Squared Euclidean distance; smaller is nearer
    pub distance: f32,
}

/// Named collections of (text, embedding) records searchable by Euclidean distance.
///
/// Every collection has a fixed dimension set when it is created. Inserts and queries whose
/// vector length differs fail with [`MnemosyneError::DimensionMismatch`].
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it is missing. Idempotent for a matching dimension; an existing
    /// collection with a different dimension is a [`MnemosyneError::Schema`] error.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// Append a record and return its generated id
    async fn insert(&self, collection: &str, text: &str, embedding: &[f32]) -> Result<String>;

    /// Up to `top_k` nearest records, nearest first. An empty collection yields no hits.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Number of records in the collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Texts of the `top_k` nearest records, nearest first
    async fn query(&self, collection: &str, embedding: &[f32], top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(collection, embedding, top_k)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }
}

/// Squared Euclidean distance between two vectors of equal length
#[inline]
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

pub(crate) fn check_dimension(collection: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(MnemosyneError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual,
        })
    }
}

pub(crate) fn unknown_collection(collection: &str) -> MnemosyneError {
    MnemosyneError::Schema(format!(
        "Collection '{collection}' does not exist; call ensure_collection first"
    ))
}
