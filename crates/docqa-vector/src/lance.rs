//! LanceDB backend.
//!
//! One table per collection. Metadata is stored as canonical JSON next to the
//! promoted `document_id` and `chunk_index` columns. An IVF-HNSW-SQ index is
//! built by [`VectorStore::build_index`] once a table reaches the exact-scan
//! threshold; smaller tables are searched exactly.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::index::vector::IvfHnswSqIndexBuilder;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use serde_json::Value;
use tracing::info;

use docqa_core::config::expand_path;
use docqa_core::types::{DistanceMetric, Metadata, Payload, StoredPoint};

use crate::filter::{self, sql_quote};
use crate::scoring::score_from_distance;
use crate::store::{
    CollectionInfo, CollectionMissing, CollectionSpec, Connector, ScoredPoint, SearchRequest, VectorStore,
};

pub fn collection_schema(vector_size: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int64, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("ingested_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_size as i32),
            true,
        ),
    ]))
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Euclidean => DistanceType::L2,
        DistanceMetric::Dot => DistanceType::Dot,
    }
}

#[derive(Clone)]
pub struct LanceStore {
    conn: Connection,
}

impl LanceStore {
    pub async fn open(uri: &str) -> Result<Self> {
        Ok(Self { conn: connect(uri).execute().await? })
    }

    async fn table(&self, name: &str) -> Result<Option<Table>> {
        let names = self.conn.table_names().execute().await?;
        if !names.iter().any(|n| n == name) {
            return Ok(None);
        }
        Ok(Some(self.conn.open_table(name).execute().await?))
    }

    async fn require_table(&self, name: &str) -> Result<Table> {
        Ok(self.table(name).await?.ok_or_else(|| CollectionMissing(name.to_string()))?)
    }

    /// Run the vector query, fetching `fetch` rows before the exact re-check.
    async fn nearest(
        &self,
        table: &Table,
        spec: &CollectionSpec,
        request: &SearchRequest,
        predicate: Option<&str>,
        fetch: usize,
        indexed: bool,
    ) -> Result<Vec<ScoredPoint>> {
        let mut query = table
            .vector_search(request.vector.clone())?
            .distance_type(distance_type(spec.distance))
            .select(Select::columns(&["id", "content", "metadata", "ingested_at"]))
            .limit(fetch);
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }
        query = if indexed {
            query.ef(request.ef.max(fetch) as u32)
        } else {
            query.bypass_vector_index()
        };

        let mut stream = query.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_points(&batch, spec.distance)?);
        }
        Ok(hits)
    }
}

async fn has_vector_index(table: &Table) -> Result<bool> {
    Ok(table
        .list_indices()
        .await?
        .iter()
        .any(|idx| idx.columns.iter().any(|c| c == "vector")))
}

// Roughly one partition per 4k rows, at least one.
fn index_partitions(rows: usize) -> u32 {
    ((rows / 4096).max(1)).min(256) as u32
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let Some(table) = self.table(name).await? else {
            return Ok(None);
        };
        let schema = table.schema().await?;
        let vector_size = match schema.field_with_name("vector")?.data_type() {
            DataType::FixedSizeList(_, n) => *n as usize,
            other => bail!("collection '{}' has an unexpected vector column type {}", name, other),
        };
        Ok(Some(CollectionInfo {
            vector_size,
            points_count: table.count_rows(None).await?,
            indexed: has_vector_index(&table).await?,
        }))
    }

    async fn create(&self, spec: &CollectionSpec) -> Result<()> {
        if self.table(&spec.name).await?.is_some() {
            return Ok(());
        }
        let schema = collection_schema(spec.vector_size);
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        self.conn.create_table(&spec.name, Box::new(iter)).execute().await?;
        Ok(())
    }

    async fn upsert(&self, spec: &CollectionSpec, points: &[StoredPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let table = self.require_table(&spec.name).await?;
        let batch = points_to_batch(spec.vector_size, points)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        Ok(points.len())
    }

    async fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        let table = self.require_table(&spec.name).await?;
        let indexed = has_vector_index(&table).await?;
        let predicate = filter::to_predicate(&request.filter);

        // The SQL prefilter may admit rows the exact re-check drops, so widen
        // the fetch until `limit` rows survive or the table runs out.
        let mut fetch = request.limit;
        loop {
            let mut hits = self.nearest(&table, spec, request, predicate.as_deref(), fetch, indexed).await?;
            let fetched = hits.len();
            hits.retain(|hit| filter::matches(&request.filter, &hit.payload.metadata));
            if hits.len() >= request.limit || fetched < fetch {
                hits.truncate(request.limit);
                return Ok(hits);
            }
            fetch = fetch.saturating_mul(4);
        }
    }

    async fn build_index(&self, spec: &CollectionSpec) -> Result<bool> {
        let table = self.require_table(&spec.name).await?;
        let rows = table.count_rows(None).await?;
        if rows < spec.index.full_scan_threshold || has_vector_index(&table).await? {
            return Ok(false);
        }
        let partitions = index_partitions(rows);
        table
            .create_index(
                &["vector"],
                Index::IvfHnswSq(
                    IvfHnswSqIndexBuilder::default()
                        .distance_type(distance_type(spec.distance))
                        .num_partitions(partitions)
                        .num_edges(spec.index.m as u32)
                        .ef_construction(spec.index.ef_construct as u32),
                ),
            )
            .execute()
            .await?;
        info!(target: "docqa::vector", collection = %spec.name, rows, partitions, m = spec.index.m, "vector index built");
        Ok(true)
    }

    async fn delete(&self, name: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let Some(table) = self.table(name).await? else {
            return Ok(0);
        };
        let list = ids.iter().map(|id| format!("'{}'", sql_quote(id))).collect::<Vec<_>>().join(", ");
        let predicate = format!("id IN ({list})");
        let existing = table.count_rows(Some(predicate.clone())).await?;
        if existing > 0 {
            table.delete(&predicate).await?;
        }
        Ok(existing)
    }
}

fn points_to_batch(vector_size: usize, points: &[StoredPoint]) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(points.len());
    let mut document_ids = Vec::with_capacity(points.len());
    let mut chunk_indices = Vec::with_capacity(points.len());
    let mut contents = Vec::with_capacity(points.len());
    let mut metadata = Vec::with_capacity(points.len());
    let mut ingested = Vec::with_capacity(points.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(points.len());
    for p in points {
        let meta = &p.payload.metadata;
        ids.push(p.id.as_str());
        document_ids.push(meta.get("document_id").and_then(Value::as_str).unwrap_or_default());
        chunk_indices.push(meta.get("chunk_index").and_then(Value::as_i64).unwrap_or(-1));
        contents.push(p.payload.content.as_str());
        metadata.push(serde_json::to_string(meta)?);
        ingested.push(p.payload.ingested_at);
        vectors.push(Some(p.vector.iter().copied().map(Some).collect()));
    }
    Ok(RecordBatch::try_new(
        collection_schema(vector_size),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(Int64Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(TimestampMillisecondArray::from(ingested)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, vector_size as i32)),
        ],
    )?)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{} column missing", name))
}

fn batch_to_points(batch: &RecordBatch, metric: DistanceMetric) -> Result<Vec<ScoredPoint>> {
    let ids = string_column(batch, "id")?;
    let contents = string_column(batch, "content")?;
    let metadata = string_column(batch, "metadata")?;
    let ingested = batch
        .column_by_name("ingested_at")
        .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
        .ok_or_else(|| anyhow!("ingested_at column missing"))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("_distance column missing"))?;

    (0..batch.num_rows())
        .map(|i| {
            let meta: Metadata = serde_json::from_str(metadata.value(i))?;
            Ok(ScoredPoint {
                id: ids.value(i).to_string(),
                score: score_from_distance(metric, distances.value(i)),
                payload: Payload {
                    content: contents.value(i).to_string(),
                    metadata: meta,
                    ingested_at: ingested.value(i),
                },
            })
        })
        .collect()
}

/// Opens [`LanceStore`] clients for a directory or object-store URI.
#[derive(Debug, Clone)]
pub struct LanceConnector {
    uri: String,
}

impl LanceConnector {
    /// `~` and `${VAR}` in local paths are expanded.
    pub fn new(uri: impl AsRef<str>) -> Self {
        Self { uri: expand_path(uri).to_string_lossy().into_owned() }
    }
}

#[async_trait]
impl Connector for LanceConnector {
    type Client = LanceStore;

    async fn connect(&self) -> Result<LanceStore> {
        LanceStore::open(&self.uri).await
    }
}
