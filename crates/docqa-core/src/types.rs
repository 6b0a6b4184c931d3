//! Domain types shared by the document processor and the vector storage manager.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;

/// Ordered key/value metadata. Ordering keeps the serialized form canonical.
pub type Metadata = BTreeMap<String, Value>;

/// A contiguous span of a source document prepared for embedding.
///
/// - `chunk_id`: content-addressed identifier, stable across re-processing
/// - `document_id`/`chunk_index`: position of the chunk within its document
/// - `start_index`/`end_index`: byte offsets into the original text, `end > start`
/// - `metadata`: caller metadata merged with processor-derived keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: Metadata,
    pub start_index: usize,
    pub end_index: usize,
}

/// Similarity function a collection is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    Dot,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Dot => "dot",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclid" | "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot" | "dot_product" => Ok(DistanceMetric::Dot),
            other => Err(Error::Configuration(format!("unknown distance metric '{}'", other))),
        }
    }
}

/// Name, dimensionality and metric of a vector collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub vector_size: usize,
    pub distance: DistanceMetric,
}

/// What is persisted next to a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub content: String,
    pub metadata: Metadata,
    /// Milliseconds since the Unix epoch.
    pub ingested_at: i64,
}

/// The unit written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A ranked hit. `score` is always "higher is better".
///
/// Hybrid search also fills `vector_score` and `keyword_score`, the inputs
/// that were fused into `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ChunkId,
    pub score: f32,
    pub content: String,
    pub metadata: Metadata,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointFailure {
    pub id: ChunkId,
    pub reason: String,
}

/// Outcome of a batch upsert. Partial success is explicit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub added: usize,
    pub failed: usize,
    pub failures: Vec<PointFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: usize,
}

/// Whether searches are served by the approximate index or by exact scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Indexed,
    ExactScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub vectors_count: usize,
    pub points_count: usize,
    pub status: CollectionStatus,
    pub vector_size: usize,
}
