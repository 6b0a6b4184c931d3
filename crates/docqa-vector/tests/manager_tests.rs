use serde_json::json;

use docqa_core::config::StorageConfig;
use docqa_core::types::{Chunk, CollectionStatus, Metadata};
use docqa_core::Error;
use docqa_vector::{MemoryConnector, MemoryStore, VectorStorageManager};

fn storage(vector_size: usize) -> StorageConfig {
    StorageConfig {
        collection_name: "test".into(),
        vector_size,
        connection_pool_size: 2,
        timeout_seconds: 5.0,
        ..StorageConfig::default()
    }
}

fn chunk(id: &str, content: &str) -> Chunk {
    Chunk {
        chunk_id: id.into(),
        document_id: "doc".into(),
        chunk_index: 0,
        content: content.into(),
        metadata: Metadata::new(),
        start_index: 0,
        end_index: content.len(),
    }
}

fn tagged(id: &str, content: &str, lang: &str) -> Chunk {
    let mut c = chunk(id, content);
    c.metadata.insert("lang".into(), json!(lang));
    c
}

async fn manager(store: &MemoryStore, vector_size: usize) -> VectorStorageManager<MemoryConnector> {
    let m = VectorStorageManager::new(storage(vector_size), store.connector()).expect("config");
    m.ensure_collection().await.expect("ensure collection");
    m
}

fn ids(results: &[docqa_core::types::SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn ensure_collection_is_idempotent_and_adopts_existing_size() {
    let store = MemoryStore::new();
    let first = manager(&store, 4).await;
    let again = first.ensure_collection().await.expect("second ensure");
    assert_eq!(again.vector_size, 4);

    let other = VectorStorageManager::new(storage(8), store.connector()).expect("config");
    assert_eq!(other.vector_size(), 8);
    other.ensure_collection().await.expect("adopt");
    assert_eq!(other.vector_size(), 4);
}

#[tokio::test]
async fn stats_require_an_existing_collection() {
    let store = MemoryStore::new();
    let m = VectorStorageManager::new(storage(4), store.connector()).expect("config");
    assert!(matches!(m.get_collection_stats().await, Err(Error::NotFound(_))));

    m.ensure_collection().await.expect("ensure");
    let stats = m.get_collection_stats().await.expect("stats");
    assert_eq!(stats.points_count, 0);
    assert_eq!(stats.vector_size, 4);
    assert_eq!(stats.status, CollectionStatus::ExactScan);
}

#[tokio::test]
async fn missing_collection_is_not_found_for_every_operation() {
    let store = MemoryStore::new();
    let m = VectorStorageManager::new(storage(2), store.connector()).expect("config");

    let added = m.add_documents(&[chunk("a", "x")], &[vec![1.0, 0.0]]).await;
    let searched = m.search_similar(&[1.0, 0.0], 3, None, None).await;
    let hybrid = m.hybrid_search(&[1.0, 0.0], &["x"], 0.7, 0.3, 3).await;
    for result in [added.map(|_| ()), searched.map(|_| ()), hybrid.map(|_| ())] {
        match result {
            Err(err @ Error::NotFound(_)) => assert!(!err.is_retriable()),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    m.ensure_collection().await.expect("ensure");
    assert_eq!(m.add_documents(&[chunk("a", "x")], &[vec![1.0, 0.0]]).await.expect("add").added, 1);
}

#[tokio::test]
async fn failed_index_build_does_not_fail_the_write() {
    let store = MemoryStore::new();
    let config = StorageConfig { full_scan_threshold: 2, ..storage(2) };
    let m = VectorStorageManager::new(config, store.connector()).expect("config");
    m.ensure_collection().await.expect("ensure");

    store.set_index_failure(true);
    let outcome = m
        .add_documents(&[chunk("a", "x"), chunk("b", "y")], &[vec![1.0, 0.0], vec![0.0, 1.0]])
        .await
        .expect("write survives index failure");
    assert_eq!(outcome.added, 2);
    let stats = m.get_collection_stats().await.expect("stats");
    assert_eq!(stats.points_count, 2);
    assert_eq!(stats.status, CollectionStatus::ExactScan);
    assert_eq!(m.search_similar(&[1.0, 0.0], 1, None, None).await.expect("search")[0].id, "a");

    store.set_index_failure(false);
    m.add_documents(&[chunk("c", "z")], &[vec![0.5, 0.5]]).await.expect("add");
    let stats = m.get_collection_stats().await.expect("stats");
    assert_eq!(stats.points_count, 3);
    assert_eq!(stats.status, CollectionStatus::Indexed);
}

#[tokio::test]
async fn length_mismatch_fails_without_writing() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    let result = m.add_documents(&[chunk("a", "x"), chunk("b", "y")], &[vec![1.0, 0.0]]).await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(m.get_collection_stats().await.expect("stats").points_count, 0);
}

#[tokio::test]
async fn wrong_dimension_is_reported_per_item() {
    let store = MemoryStore::new();
    let m = manager(&store, 4).await;
    let chunks = [chunk("a", "first"), chunk("b", "second"), chunk("c", "third")];
    let vectors = [vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]];

    let outcome = m.add_documents(&chunks, &vectors).await.expect("partial success");
    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.failures[0].id, "b");
    assert!(outcome.failures[0].reason.contains("expected 4, got 3"));
    assert_eq!(m.get_collection_stats().await.expect("stats").points_count, 2);
}

#[tokio::test]
async fn duplicate_ids_keep_the_last_write_and_retries_are_idempotent() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    let chunks = [chunk("a", "old text"), chunk("a", "new text")];
    let vectors = [vec![1.0, 0.0], vec![1.0, 0.0]];

    assert_eq!(m.add_documents(&chunks, &vectors).await.expect("upsert").added, 1);
    m.add_documents(&chunks, &vectors).await.expect("retry");
    assert_eq!(m.get_collection_stats().await.expect("stats").points_count, 1);

    let hits = m.search_similar(&[1.0, 0.0], 5, None, None).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "new text");
    assert_eq!(hits[0].metadata["end_index"], json!(8));
    assert_eq!(hits[0].metadata["document_id"], json!("doc"));
}

#[tokio::test]
async fn search_rejects_bad_input() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    assert!(matches!(m.search_similar(&[1.0, 0.0], 0, None, None).await, Err(Error::Validation(_))));
    assert!(matches!(m.search_similar(&[], 3, None, None).await, Err(Error::Validation(_))));
    assert!(matches!(m.search_similar(&[f32::NAN, 0.0], 3, None, None).await, Err(Error::Validation(_))));
    assert!(matches!(
        m.search_similar(&[1.0, 0.0, 0.0], 3, None, None).await,
        Err(Error::DimensionMismatch { expected: 2, actual: 3 })
    ));

    let mut structured = Metadata::new();
    structured.insert("tags".into(), json!(["a", "b"]));
    assert!(matches!(
        m.search_similar(&[1.0, 0.0], 3, None, Some(&structured)).await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn search_orders_thresholds_and_filters() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    let chunks = [tagged("a", "alpha", "en"), tagged("b", "beta", "de"), tagged("c", "gamma", "en")];
    let vectors = [vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];
    m.add_documents(&chunks, &vectors).await.expect("upsert");

    let all = m.search_similar(&[1.0, 0.0], 10, None, None).await.expect("search");
    assert_eq!(ids(&all), vec!["a", "b", "c"]);
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

    let close = m.search_similar(&[1.0, 0.0], 10, Some(0.5), None).await.expect("threshold");
    assert_eq!(ids(&close), vec!["a", "b"]);

    let mut en = Metadata::new();
    en.insert("lang".into(), json!("en"));
    let filtered = m.search_similar(&[1.0, 0.0], 10, None, Some(&en)).await.expect("filter");
    assert_eq!(ids(&filtered), vec!["a", "c"]);

    let mut none = Metadata::new();
    none.insert("lang".into(), json!("fr"));
    let empty = m.search_similar(&[1.0, 0.0], 10, None, Some(&none)).await.expect("no matches is not an error");
    assert!(empty.is_empty());

    let top = m.search_similar(&[1.0, 0.0], 1, None, None).await.expect("limit");
    assert_eq!(ids(&top), vec!["a"]);
}

#[tokio::test]
async fn equal_scores_resolve_by_id() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    let chunks = [chunk("b", "same"), chunk("a", "same"), chunk("c", "same")];
    let vectors = [vec![0.5, 0.5], vec![0.5, 0.5], vec![0.5, 0.5]];
    m.add_documents(&chunks, &vectors).await.expect("upsert");
    let hits = m.search_similar(&[1.0, 1.0], 3, None, None).await.expect("search");
    assert_eq!(ids(&hits), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn hybrid_search_promotes_keyword_matches() {
    let store = MemoryStore::new();
    let m = manager(&store, 4).await;
    let b_y = (1.0f32 - 0.65 * 0.65).sqrt();
    let chunks = [
        chunk("both", "Tuning the cache cut p99 latency in half."),
        chunk("neither", "Notes about gardening and soil."),
    ];
    let vectors = [vec![0.6, 0.8, 0.0, 0.0], vec![0.65, b_y, 0.0, 0.0]];
    m.add_documents(&chunks, &vectors).await.expect("upsert");

    let query = [1.0, 0.0, 0.0, 0.0];
    let vector_only = m.search_similar(&query, 2, None, None).await.expect("search");
    assert_eq!(ids(&vector_only), vec!["neither", "both"]);

    let fused = m
        .hybrid_search(&query, &["cache", "latency"], 0.5, 0.5, 2)
        .await
        .expect("hybrid");
    assert_eq!(ids(&fused), vec!["both", "neither"]);
    assert!((fused[0].score - 0.8).abs() < 1e-4, "score {}", fused[0].score);
    assert!((fused[1].score - 0.325).abs() < 1e-4, "score {}", fused[1].score);
    assert_eq!(fused[0].keyword_score, Some(1.0));

    assert!(matches!(
        m.hybrid_search(&query, &["cache"], -1.0, 0.5, 2).await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn delete_is_best_effort() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    m.add_documents(&[chunk("a", "x"), chunk("b", "y")], &[vec![1.0, 0.0], vec![0.0, 1.0]])
        .await
        .expect("upsert");

    let ids = ["a".to_string(), "missing".to_string(), "a".to_string()];
    assert_eq!(m.delete_documents(&ids).await.expect("delete").deleted, 1);
    assert_eq!(m.delete_documents(&["missing".to_string()]).await.expect("delete").deleted, 0);
    assert_eq!(m.delete_documents(&[]).await.expect("delete").deleted, 0);
    assert_eq!(m.get_collection_stats().await.expect("stats").points_count, 1);
}

#[tokio::test]
async fn store_failures_are_distinguishable_from_empty_results() {
    let store = MemoryStore::new();
    let m = manager(&store, 2).await;
    store.set_available(false);

    match m.search_similar(&[1.0, 0.0], 3, None, None).await {
        Err(err @ Error::StoreUnavailable { operation: "search_similar", .. }) => assert!(err.is_retriable()),
        other => panic!("expected store error, got {other:?}"),
    }
    match m.add_documents(&[chunk("a", "x"), chunk("b", "y")], &[vec![1.0, 0.0], vec![0.0, 1.0]]).await {
        Err(Error::StoreUnavailable { operation, items, .. }) => {
            assert_eq!(operation, "add_documents");
            assert_eq!(items, 2);
        }
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(matches!(
        m.delete_documents(&["a".to_string()]).await,
        Err(Error::StoreUnavailable { operation: "delete_documents", .. })
    ));

    let fresh = VectorStorageManager::new(storage(2), store.connector()).expect("config");
    assert!(matches!(
        fresh.ensure_collection().await,
        Err(Error::StoreUnavailable { operation: "connect", .. })
    ));
}

#[test]
fn invalid_storage_settings_are_configuration_errors() {
    let store = MemoryStore::new();
    let cases = [
        StorageConfig { connection_pool_size: 0, ..storage(4) },
        StorageConfig { distance_metric: "manhattan".into(), ..storage(4) },
        StorageConfig { timeout_seconds: 0.0, ..storage(4) },
        StorageConfig { collection_name: " ".into(), ..storage(4) },
        StorageConfig { vector_size: 0, ..storage(4) },
    ];
    for config in cases {
        assert!(
            matches!(VectorStorageManager::new(config, store.connector()), Err(Error::Configuration(_))),
            "expected configuration error"
        );
    }
}
