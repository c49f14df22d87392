// In-process vector collections
// Exact nearest-neighbor search for ephemeral sessions and tests


use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    SearchHit, StoredRecord, VectorIndex, check_dimension, squared_l2_distance,
    unknown_collection,
};
use crate::{MnemosyneError, Result};

#[derive(Debug)]
struct Collection {
    dimension: usize,
    records: Vec<StoredRecord>,
}

/// Vector collections held in memory and searched exhaustively
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record in a collection, in insertion order
    #[inline]
    pub async fn records(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        Ok(entry.records.clone())
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            if existing.dimension != dimension {
                return Err(MnemosyneError::Schema(format!(
                    "Collection '{}' has dimension {}, requested {}",
                    name, existing.dimension, dimension
                )));
            }
            return Ok(());
        }

        debug!(
            "Creating in-memory collection {} with {} dimensions",
            name, dimension
        );
        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert(&self, collection: &str, text: &str, embedding: &[f32]) -> Result<String> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        check_dimension(collection, entry.dimension, embedding.len())?;

        let record = StoredRecord::new(text, embedding);
        let id = record.id.clone();
        entry.records.push(record);
        Ok(id)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        check_dimension(collection, entry.dimension, embedding.len())?;

        let mut scored: Vec<(f32, &StoredRecord)> = entry
            .records
            .iter()
            .map(|record| (squared_l2_distance(&record.embedding, embedding), record))
            .collect();
        // stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, record)| SearchHit {
                text: record.text.clone(),
                distance,
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|entry| entry.records.len())
            .ok_or_else(|| unknown_collection(collection))
    }
}
