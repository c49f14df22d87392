// LanceDB vector database module
// Persists query and reply collections on disk (or any LanceDB URI)


pub mod vector_store;

pub use vector_store::LanceVectorStore;

pub(crate) const ID_COLUMN: &str = "id";
pub(crate) const TEXT_COLUMN: &str = "text";
pub(crate) const VECTOR_COLUMN: &str = "vector";
pub(crate) const CREATED_AT_COLUMN: &str = "created_at";
/// Column LanceDB adds to vector search results
pub(crate) const DISTANCE_COLUMN: &str = "_distance";
