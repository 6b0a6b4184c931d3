use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{error, info, warn};

use docqa_core::config::StorageConfig;
use docqa_core::types::{
    Chunk, CollectionConfig, CollectionStats, CollectionStatus, DeleteOutcome, DistanceMetric, Metadata, Payload,
    PointFailure, SearchResult, StoredPoint, UpsertOutcome,
};
use docqa_core::{Error, Result};
use docqa_hybrid::{fuse, sort_results, FusionWeights};

use crate::filter;
use crate::pool::{ConnectionPool, PoolStatus};
use crate::scoring::search_ef;
use crate::store::{CollectionMissing, CollectionSpec, Connector, IndexParams, SearchRequest, VectorStore};

/// Owns one named collection in an external vector database.
///
/// Every store call checks a client out of a bounded pool and runs under the
/// configured timeout. A client whose call timed out is discarded. Calls
/// against a collection that does not exist fail with [`Error::NotFound`].
pub struct VectorStorageManager<C: Connector> {
    pool: ConnectionPool<C>,
    spec: RwLock<CollectionSpec>,
    timeout: Duration,
    search_ef_cap: usize,
}

impl<C: Connector> VectorStorageManager<C> {
    pub fn new(config: StorageConfig, connector: C) -> Result<Self> {
        if config.collection_name.trim().is_empty() {
            return Err(Error::Configuration("collection_name must not be empty".into()));
        }
        if config.vector_size == 0 {
            return Err(Error::Configuration("vector_size must be at least 1".into()));
        }
        if config.connection_pool_size == 0 {
            return Err(Error::Configuration("connection_pool_size must be at least 1".into()));
        }
        if !config.timeout_seconds.is_finite() || config.timeout_seconds <= 0.0 {
            return Err(Error::Configuration(format!(
                "timeout_seconds must be a positive number (got {})",
                config.timeout_seconds
            )));
        }
        if config.hnsw_m < 2 || config.hnsw_ef_construct == 0 || config.search_ef_cap == 0 {
            return Err(Error::Configuration(
                "hnsw_m must be >= 2, hnsw_ef_construct and search_ef_cap >= 1".into(),
            ));
        }
        let distance: DistanceMetric = config.distance_metric.parse()?;

        let spec = CollectionSpec {
            name: config.collection_name,
            vector_size: config.vector_size,
            distance,
            index: IndexParams {
                m: config.hnsw_m,
                ef_construct: config.hnsw_ef_construct,
                full_scan_threshold: config.full_scan_threshold,
            },
        };
        Ok(Self {
            pool: ConnectionPool::new(connector, config.connection_pool_size),
            spec: RwLock::new(spec),
            timeout: Duration::from_secs_f64(config.timeout_seconds),
            search_ef_cap: config.search_ef_cap,
        })
    }

    pub fn collection(&self) -> CollectionConfig {
        self.spec.read().config()
    }

    /// Vector size in effect; adopted from the store once the collection exists.
    pub fn vector_size(&self) -> usize {
        self.spec.read().vector_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Create the collection if it is missing, otherwise adopt its vector size.
    pub async fn ensure_collection(&self) -> Result<CollectionConfig> {
        let spec = self.spec.read().clone();
        let name = spec.name.as_str();
        let existing = self.call("ensure_collection", 0, |client| async move { client.describe(name).await }).await?;

        match existing {
            Some(found) => {
                if found.vector_size != spec.vector_size {
                    warn!(
                        target: "docqa::vector",
                        collection = %spec.name,
                        configured = spec.vector_size,
                        actual = found.vector_size,
                        "adopting vector size of existing collection"
                    );
                    self.spec.write().vector_size = found.vector_size;
                }
                info!(target: "docqa::vector", collection = %spec.name, points = found.points_count, "collection_adopted");
                self.build_index_if_due().await;
            }
            None => {
                let spec_ref = &spec;
                self.call("ensure_collection", 0, |client| async move { client.create(spec_ref).await })
                    .await?;
                info!(
                    target: "docqa::vector",
                    collection = %spec.name,
                    vector_size = spec.vector_size,
                    distance = %spec.distance,
                    m = spec.index.m,
                    ef_construct = spec.index.ef_construct,
                    full_scan_threshold = spec.index.full_scan_threshold,
                    "collection_created"
                );
            }
        }
        Ok(self.collection())
    }

    /// Upsert chunks keyed by `chunk_id`.
    ///
    /// A vector of the wrong length (or with non-finite values) is reported
    /// in `failed` and skipped; the rest of the batch is written. Within the
    /// batch, a repeated id keeps its last occurrence. Once the write has
    /// succeeded, the approximate index is built if the collection has grown
    /// past the exact-scan threshold; a failed build is logged and leaves the
    /// outcome untouched.
    pub async fn add_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<UpsertOutcome> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Validation(format!(
                "got {} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let spec = self.spec.read().clone();
        let ingested_at = Utc::now().timestamp_millis();
        let mut failures = Vec::new();
        let mut unique: BTreeMap<&str, StoredPoint> = BTreeMap::new();
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            if vector.len() != spec.vector_size {
                let err = Error::DimensionMismatch { expected: spec.vector_size, actual: vector.len() };
                warn!(target: "docqa::vector", id = %chunk.chunk_id, error = %err, "rejecting point");
                failures.push(PointFailure { id: chunk.chunk_id.clone(), reason: err.to_string() });
                continue;
            }
            if vector.iter().any(|x| !x.is_finite()) {
                warn!(target: "docqa::vector", id = %chunk.chunk_id, "rejecting point with non-finite values");
                failures.push(PointFailure { id: chunk.chunk_id.clone(), reason: "vector contains non-finite values".into() });
                continue;
            }
            unique.insert(chunk.chunk_id.as_str(), to_point(chunk, vector, ingested_at));
        }
        let points: Vec<StoredPoint> = unique.into_values().collect();

        if !points.is_empty() {
            let (spec_ref, batch) = (&spec, points.as_slice());
            self.call("add_documents", points.len(), |client| async move { client.upsert(spec_ref, batch).await })
                .await?;
            self.build_index_if_due().await;
        }
        let outcome = UpsertOutcome { added: points.len(), failed: failures.len(), failures };
        info!(
            target: "docqa::vector",
            collection = %spec.name,
            added = outcome.added,
            failed = outcome.failed,
            "upsert"
        );
        Ok(outcome)
    }

    /// Nearest neighbours of `query`, best first.
    pub async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
        filters: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Err(Error::Validation("limit must be at least 1".into()));
        }
        if query.is_empty() {
            return Err(Error::Validation("query vector must not be empty".into()));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::Validation("query vector contains non-finite values".into()));
        }
        if score_threshold.is_some_and(f32::is_nan) {
            return Err(Error::Validation("score_threshold must be a number".into()));
        }
        let spec = self.spec.read().clone();
        if query.len() != spec.vector_size {
            return Err(Error::DimensionMismatch { expected: spec.vector_size, actual: query.len() });
        }
        let filter = filters.cloned().unwrap_or_default();
        filter::validate(&filter)?;

        let request = SearchRequest {
            vector: query.to_vec(),
            limit,
            filter,
            ef: search_ef(limit, self.search_ef_cap),
        };
        let started = Instant::now();
        let (spec_ref, request_ref) = (&spec, &request);
        let hits = self
            .call("search_similar", 1, |client| async move { client.search(spec_ref, request_ref).await })
            .await?;

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| score_threshold.map_or(true, |min| hit.score >= min))
            .map(|hit| SearchResult {
                id: hit.id,
                score: hit.score,
                content: hit.payload.content,
                metadata: hit.payload.metadata,
                vector_score: None,
                keyword_score: None,
            })
            .collect();
        sort_results(&mut results);
        results.truncate(limit);

        info!(
            target: "docqa::vector",
            collection = %spec.name,
            limit,
            ef = request.ef,
            results = results.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "search"
        );
        Ok(results)
    }

    /// Vector search over `2 * limit` candidates, re-ranked by
    /// `vector_weight * vector_score + keyword_weight * keyword_score`.
    pub async fn hybrid_search<S: AsRef<str>>(
        &self,
        query: &[f32],
        keywords: &[S],
        vector_weight: f32,
        keyword_weight: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let weights = FusionWeights::new(vector_weight, keyword_weight)?;
        if limit == 0 {
            return Err(Error::Validation("limit must be at least 1".into()));
        }
        let candidates = self.search_similar(query, limit.saturating_mul(2), None, None).await?;
        Ok(fuse(candidates, keywords, weights, limit))
    }

    /// Remove points by id. Unknown ids are ignored.
    pub async fn delete_documents(&self, ids: &[String]) -> Result<DeleteOutcome> {
        let mut ids: Vec<String> = ids.to_vec();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        let name = self.spec.read().name.clone();
        let (name_ref, ids_ref) = (name.as_str(), ids.as_slice());
        let deleted = self
            .call("delete_documents", ids.len(), |client| async move { client.delete(name_ref, ids_ref).await })
            .await?;
        info!(target: "docqa::vector", collection = %name, requested = ids.len(), deleted, "delete");
        Ok(DeleteOutcome { deleted })
    }

    pub async fn get_collection_stats(&self) -> Result<CollectionStats> {
        let name = self.spec.read().name.clone();
        let name_ref = name.as_str();
        let info = self
            .call("get_collection_stats", 0, |client| async move { client.describe(name_ref).await })
            .await?
            .ok_or_else(|| Error::NotFound(CollectionMissing(name.clone()).to_string()))?;
        Ok(CollectionStats {
            vectors_count: info.points_count,
            points_count: info.points_count,
            status: if info.indexed { CollectionStatus::Indexed } else { CollectionStatus::ExactScan },
            vector_size: info.vector_size,
        })
    }

    /// Build the approximate index when due. Never fails the caller: the
    /// collection stays searchable by exact scan until a later build succeeds.
    async fn build_index_if_due(&self) {
        let spec = self.spec.read().clone();
        let spec_ref = &spec;
        match self.run("build_index", 0, |client| async move { client.build_index(spec_ref).await }).await {
            Ok(true) => info!(target: "docqa::vector", collection = %spec.name, "index_built"),
            Ok(false) => {}
            Err(err) => warn!(
                target: "docqa::vector",
                collection = %spec.name,
                error = %err,
                "index build failed, searches stay exact"
            ),
        }
    }

    /// Run one store call on a pooled client under the timeout, logging
    /// store failures.
    async fn call<T, F, Fut>(&self, operation: &'static str, items: usize, f: F) -> Result<T>
    where
        F: FnOnce(C::Client) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let result = self.run(operation, items, f).await;
        if let Err(Error::StoreUnavailable { source, .. }) = &result {
            error!(target: "docqa::vector", operation, items, error = %source, "vector store call failed");
        }
        result
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, items: usize, f: F) -> Result<T>
    where
        F: FnOnce(C::Client) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let conn = match timeout(self.timeout, self.pool.acquire()).await {
            Ok(conn) => conn?,
            Err(_) => {
                warn!(target: "docqa::pool", operation, timeout_ms = self.timeout.as_millis() as u64, "timed out waiting for a connection");
                return Err(Error::Timeout { operation, timeout: self.timeout });
            }
        };

        match timeout(self.timeout, f(conn.clone())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => match source.downcast_ref::<CollectionMissing>() {
                Some(missing) => Err(Error::NotFound(missing.to_string())),
                None => Err(Error::StoreUnavailable { operation, items, source }),
            },
            Err(_) => {
                conn.discard();
                warn!(
                    target: "docqa::vector",
                    operation,
                    items,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "vector store call timed out, connection discarded"
                );
                Err(Error::Timeout { operation, timeout: self.timeout })
            }
        }
    }
}

fn to_point(chunk: &Chunk, vector: &[f32], ingested_at: i64) -> StoredPoint {
    let mut metadata = chunk.metadata.clone();
    metadata
        .entry("document_id".to_string())
        .or_insert_with(|| Value::String(chunk.document_id.clone()));
    metadata.entry("chunk_index".to_string()).or_insert_with(|| json!(chunk.chunk_index));
    metadata.insert("start_index".into(), json!(chunk.start_index));
    metadata.insert("end_index".into(), json!(chunk.end_index));
    StoredPoint {
        id: chunk.chunk_id.clone(),
        vector: vector.to_vec(),
        payload: Payload { content: chunk.content.clone(), metadata, ingested_at },
    }
}
