#[cfg(test)]
mod tests;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{CREATED_AT_COLUMN, DISTANCE_COLUMN, ID_COLUMN, TEXT_COLUMN, VECTOR_COLUMN};
use crate::config::Config;
use crate::database::{SearchHit, StoredRecord, VectorIndex, check_dimension, unknown_collection};
use crate::{MnemosyneError, Result};

/// Vector collections stored as LanceDB tables, one table per collection
pub struct LanceVectorStore {
    connection: Connection,
    /// Dimension of every collection seen so far
    dimensions: RwLock<HashMap<String, usize>>,
    index_min_rows: usize,
}

impl LanceVectorStore {
    /// Connect to the vector store described by the configuration
    ///
    /// # Arguments
    /// * `config` - Application configuration containing the store URI
    ///
    /// # Returns
    /// * `Result<Self>` - Connected store or `StoreUnavailable`
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::connect(&config.vector_store_uri(), config.vector_store.index_min_rows).await
    }

    /// Connect to a LanceDB URI; plain paths are created as local directories
    #[inline]
    pub async fn connect(uri: &str, index_min_rows: usize) -> Result<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(uri).map_err(|e| {
                MnemosyneError::StoreUnavailable(format!(
                    "Failed to create vector database directory {uri}: {e}"
                ))
            })?;
        }

        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(uri).execute().await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to connect to LanceDB: {e}"))
        })?;

        info!("Vector store connected at {}", uri);
        Ok(Self {
            connection,
            dimensions: RwLock::new(HashMap::new()),
            index_min_rows,
        })
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new(TEXT_COLUMN, DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new(CREATED_AT_COLUMN, DataType::Utf8, false),
        ]))
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let table_names = self.connection.table_names().execute().await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to list tables: {e}"))
        })?;
        Ok(table_names.iter().any(|table| table == name))
    }

    async fn open_table(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| match e {
                lancedb::Error::TableNotFound { .. } => unknown_collection(name),
                other => MnemosyneError::StoreUnavailable(format!(
                    "Failed to open table {name}: {other}"
                )),
            })
    }

    /// Read the vector dimension from an existing table's schema
    async fn detect_dimension(name: &str, table: &Table) -> Result<usize> {
        let schema = table.schema().await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to get schema of {name}: {e}"))
        })?;

        if schema.field_with_name(TEXT_COLUMN).is_err() {
            return Err(MnemosyneError::Schema(format!(
                "Table {name} has no '{TEXT_COLUMN}' column"
            )));
        }

        match schema
            .field_with_name(VECTOR_COLUMN)
            .map(|field| field.data_type())
        {
            Ok(DataType::FixedSizeList(_, size)) => Ok(*size as usize),
            _ => Err(MnemosyneError::Schema(format!(
                "Table {name} has no fixed-size '{VECTOR_COLUMN}' column"
            ))),
        }
    }

    /// Dimension of a collection, from the cache or the table schema
    async fn collection_dimension(&self, name: &str, table: &Table) -> Result<usize> {
        if let Some(dimension) = self.dimensions.read().await.get(name) {
            return Ok(*dimension);
        }

        let dimension = Self::detect_dimension(name, table).await?;
        self.dimensions
            .write()
            .await
            .insert(name.to_string(), dimension);
        Ok(dimension)
    }

    /// Create a RecordBatch holding one record
    pub(super) fn create_record_batch(
        vector_dim: usize,
        record: &StoredRecord,
    ) -> Result<RecordBatch> {
        let values_array = Float32Array::from(record.embedding.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    MnemosyneError::Schema(format!("Failed to create vector array: {e}"))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![record.id.as_str()])),
            Arc::new(StringArray::from(vec![record.text.as_str()])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![record.created_at.as_str()])),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| MnemosyneError::Schema(format!("Failed to create record batch: {e}")))
    }

    /// Parse a single record batch from search results
    pub(super) fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
        let texts = batch
            .column_by_name(TEXT_COLUMN)
            .ok_or_else(|| MnemosyneError::Schema("Missing text column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| MnemosyneError::Schema("Invalid text column type".to_string()))?;

        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        Ok((0..batch.num_rows())
            .map(|row| SearchHit {
                text: texts.value(row).to_string(),
                distance: distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
            })
            .collect())
    }

    /// Build an ANN index on a collection once it holds enough rows to train one
    ///
    /// # Returns
    /// * `Result<bool>` - Whether a new index was created
    #[inline]
    pub async fn create_vector_index(&self, name: &str) -> Result<bool> {
        let table = self.open_table(name).await?;
        self.create_vector_index_on(name, &table).await
    }

    async fn create_vector_index_on(&self, name: &str, table: &Table) -> Result<bool> {
        let rows = table.count_rows(None).await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to count rows of {name}: {e}"))
        })?;
        if rows < self.index_min_rows {
            debug!(
                "Collection {} has {} rows, below the {} needed for an index",
                name, rows, self.index_min_rows
            );
            return Ok(false);
        }

        let indices = table.list_indices().await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to list indices of {name}: {e}"))
        })?;
        if indices
            .iter()
            .any(|index| index.columns.iter().any(|column| column == VECTOR_COLUMN))
        {
            return Ok(false);
        }

        info!("Creating vector index on {} ({} rows)", name, rows);
        table
            .create_index(&[VECTOR_COLUMN], Index::Auto)
            .execute()
            .await
            .map_err(|e| {
                MnemosyneError::StoreUnavailable(format!(
                    "Failed to create vector index on {name}: {e}"
                ))
            })?;
        Ok(true)
    }
}

#[async_trait]
impl VectorIndex for LanceVectorStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        if !self.table_exists(name).await? {
            info!(
                "Creating collection {} with {} dimensions",
                name, dimension
            );
            self.connection
                .create_empty_table(name, Self::create_schema(dimension))
                .execute()
                .await
                .map_err(|e| {
                    MnemosyneError::StoreUnavailable(format!(
                        "Failed to create table {name}: {e}"
                    ))
                })?;
            self.dimensions
                .write()
                .await
                .insert(name.to_string(), dimension);
            return Ok(());
        }

        let table = self.open_table(name).await?;
        let existing = Self::detect_dimension(name, &table).await?;
        if existing != dimension {
            return Err(MnemosyneError::Schema(format!(
                "Collection '{name}' has dimension {existing}, requested {dimension}"
            )));
        }
        self.dimensions
            .write()
            .await
            .insert(name.to_string(), dimension);
        debug!("Collection {} already exists", name);

        if let Err(e) = self.create_vector_index_on(name, &table).await {
            warn!("Could not index collection {}: {}", name, e);
        }
        Ok(())
    }

    async fn insert(&self, collection: &str, text: &str, embedding: &[f32]) -> Result<String> {
        let table = self.open_table(collection).await?;
        let dimension = self.collection_dimension(collection, &table).await?;
        check_dimension(collection, dimension, embedding.len())?;

        let record = StoredRecord::new(text, embedding);
        let record_batch = Self::create_record_batch(dimension, &record)?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table.add(reader).execute().await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to insert into {collection}: {e}"))
        })?;

        debug!("Stored record {} in {}", record.id, collection);
        Ok(record.id)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let table = self.open_table(collection).await?;
        let dimension = self.collection_dimension(collection, &table).await?;
        check_dimension(collection, dimension, embedding.len())?;

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = table.count_rows(None).await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to count rows of {collection}: {e}"))
        })?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        debug!(
            "Searching {} ({} rows) for {} nearest neighbors",
            collection, rows, top_k
        );

        let mut results = table
            .vector_search(embedding)
            .map_err(|e| MnemosyneError::Schema(format!("Failed to create vector search: {e}")))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::L2)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| {
                MnemosyneError::StoreUnavailable(format!("Failed to execute search: {e}"))
            })?;

        let mut hits = Vec::new();
        while let Some(batch) = results.try_next().await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to read result stream: {e}"))
        })? {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let table = self.open_table(collection).await?;
        table.count_rows(None).await.map_err(|e| {
            MnemosyneError::StoreUnavailable(format!("Failed to count rows of {collection}: {e}"))
        })
    }
}
