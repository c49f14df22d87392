use super::*;
use tempfile::TempDir;

async fn create_test_store() -> (LanceVectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let uri = temp_dir.path().join("vectors");
    let store = LanceVectorStore::connect(&uri.to_string_lossy(), 256)
        .await
        .expect("should connect to vector store");
    (store, temp_dir)
}

fn test_vector(seed: f32) -> Vec<f32> {
    (0..5)
        .map(|i| (i as f32).mul_add(0.001, seed))
        .collect()
}

#[tokio::test]
async fn ensure_collection_creates_table() {
    let (store, _temp_dir) = create_test_store().await;

    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");

    assert!(store.table_exists("queries").await.expect("should list tables"));
    assert_eq!(store.count("queries").await.expect("should count"), 0);
}

#[tokio::test]
async fn ensure_collection_is_idempotent() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");
    store
        .insert("queries", "my name is bob", &test_vector(0.1))
        .await
        .expect("should insert");

    store
        .ensure_collection("queries", 5)
        .await
        .expect("second ensure should succeed");

    assert_eq!(store.count("queries").await.expect("should count"), 1);
}

#[tokio::test]
async fn ensure_collection_detects_dimension_mismatch() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");

    let error = store
        .ensure_collection("queries", 8)
        .await
        .expect_err("dimension change should fail");

    assert!(matches!(error, MnemosyneError::Schema(_)));
}

#[tokio::test]
async fn dimension_survives_reconnect() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let uri = temp_dir.path().join("vectors").to_string_lossy().into_owned();

    {
        let store = LanceVectorStore::connect(&uri, 256)
            .await
            .expect("should connect");
        store
            .ensure_collection("replies", 5)
            .await
            .expect("should create collection");
        store
            .insert("replies", "i like tea", &test_vector(0.3))
            .await
            .expect("should insert");
    }

    let store = LanceVectorStore::connect(&uri, 256)
        .await
        .expect("should reconnect");

    let error = store
        .insert("replies", "wrong", &[0.1, 0.2])
        .await
        .expect_err("dimension detected from schema should reject");
    assert!(matches!(
        error,
        MnemosyneError::DimensionMismatch { expected: 5, .. }
    ));

    let texts = store
        .query("replies", &test_vector(0.3), 3)
        .await
        .expect("should query");
    assert_eq!(texts, vec!["i like tea"]);
}

#[tokio::test]
async fn insert_rejects_wrong_dimension() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");

    let error = store
        .insert("queries", "bad", &[0.1, 0.2, 0.3])
        .await
        .expect_err("wrong dimension should fail");

    assert!(matches!(
        error,
        MnemosyneError::DimensionMismatch {
            expected: 5,
            actual: 3,
            ..
        }
    ));
    assert_eq!(store.count("queries").await.expect("should count"), 0);
}

#[tokio::test]
async fn query_empty_collection() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");

    let texts = store
        .query("queries", &test_vector(0.1), 3)
        .await
        .expect("empty query should succeed");

    assert!(texts.is_empty());
}

#[tokio::test]
async fn query_rejects_wrong_dimension() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");

    let error = store
        .query("queries", &[0.1], 3)
        .await
        .expect_err("wrong dimension should fail");

    assert!(matches!(error, MnemosyneError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn query_unknown_collection() {
    let (store, _temp_dir) = create_test_store().await;

    let error = store
        .query("missing", &test_vector(0.1), 3)
        .await
        .expect_err("unknown collection should fail");

    assert!(matches!(error, MnemosyneError::Schema(_)));
}

#[tokio::test]
async fn search_orders_nearest_first() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");

    for (text, seed) in [("far", 0.9), ("near", 0.2), ("nearest", 0.1), ("middle", 0.5)] {
        store
            .insert("queries", text, &test_vector(seed))
            .await
            .expect("should insert");
    }

    let hits = store
        .search("queries", &test_vector(0.1), 3)
        .await
        .expect("should search");

    let texts: Vec<&str> = hits.iter().map(|hit| hit.text.as_str()).collect();
    assert_eq!(texts, vec!["nearest", "near", "middle"]);
    assert!(hits.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
}

#[tokio::test]
async fn small_collection_is_not_indexed() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .ensure_collection("queries", 5)
        .await
        .expect("should create collection");
    store
        .insert("queries", "only one", &test_vector(0.1))
        .await
        .expect("should insert");

    let created = store
        .create_vector_index("queries")
        .await
        .expect("index check should succeed");

    assert!(!created);
}
