//! Seam between the storage manager and a concrete vector database.
//!
//! Backends speak `anyhow::Result`; the manager wraps failures with the
//! operation name and item count before they reach callers. A call against a
//! collection that does not exist fails with [`CollectionMissing`] so the
//! manager can report it as not found rather than as an outage.

use anyhow::Result;
use async_trait::async_trait;

use docqa_core::types::{CollectionConfig, DistanceMetric, Metadata, Payload, StoredPoint};

/// The named collection does not exist in the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("collection '{0}' does not exist")]
pub struct CollectionMissing(pub String);

/// Approximate-index construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexParams {
    /// Graph degree.
    pub m: usize,
    pub ef_construct: usize,
    /// Collections smaller than this are searched exactly.
    pub full_scan_threshold: usize,
}

/// Everything a backend needs to create and query one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub vector_size: usize,
    pub distance: DistanceMetric,
    pub index: IndexParams,
}

impl CollectionSpec {
    pub fn config(&self) -> CollectionConfig {
        CollectionConfig {
            name: self.name.clone(),
            vector_size: self.vector_size,
            distance: self.distance,
        }
    }
}

/// What a backend reports about an existing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub vector_size: usize,
    pub points_count: usize,
    pub indexed: bool,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    /// Conjunction of exact-match conditions on payload metadata.
    pub filter: Metadata,
    /// Exploration breadth for the approximate index.
    pub ef: usize,
}

/// A hit as returned by a backend, score already "higher is better".
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// A connected client of a vector database.
///
/// Clients are cheap to clone and are handed out by the connection pool.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Create the collection. Succeeds if it already exists.
    async fn create(&self, spec: &CollectionSpec) -> Result<()>;

    /// Insert or replace points by id. Returns the number written.
    async fn upsert(&self, spec: &CollectionSpec, points: &[StoredPoint]) -> Result<usize>;

    async fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<ScoredPoint>>;

    /// Build the approximate index once the collection has reached the
    /// exact-scan threshold. Returns whether an index was built by this call.
    ///
    /// Runs separately from [`upsert`](Self::upsert): written points stay
    /// written whatever happens here.
    async fn build_index(&self, spec: &CollectionSpec) -> Result<bool>;

    /// Remove points by id, ignoring unknown ids. Returns the number removed.
    async fn delete(&self, name: &str, ids: &[String]) -> Result<usize>;
}

/// Opens new clients for the pool.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Client: VectorStore + Clone + 'static;

    async fn connect(&self) -> Result<Self::Client>;
}
