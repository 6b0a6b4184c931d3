//! In-process backend with exact search.
//!
//! All clones share one state, so several pooled "connections" see the same
//! collections. Latency, outages and index-build failures can be injected to
//! exercise timeouts and error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use docqa_core::types::StoredPoint;

use crate::filter;
use crate::scoring::similarity;
use crate::store::{
    CollectionInfo, CollectionMissing, CollectionSpec, Connector, ScoredPoint, SearchRequest, VectorStore,
};

struct MemoryCollection {
    spec: CollectionSpec,
    points: BTreeMap<String, StoredPoint>,
    /// Search stays exact; the flag only mirrors what a real index build reports.
    indexed: bool,
}

#[derive(Default)]
struct Shared {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    latency: Mutex<Option<Duration>>,
    unavailable: AtomicBool,
    index_broken: AtomicBool,
    connections: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { store: self.clone() }
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.shared.latency.lock() = latency;
    }

    /// Simulate an outage: connects and calls fail while unavailable.
    pub fn set_available(&self, available: bool) {
        self.shared.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make every index build fail while `broken` is set.
    pub fn set_index_failure(&self, broken: bool) {
        self.shared.index_broken.store(broken, Ordering::SeqCst);
    }

    /// Number of connections opened through [`MemoryConnector`].
    pub fn connections_opened(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        let latency = *self.shared.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.shared.unavailable.load(Ordering::SeqCst) {
            bail!("memory store is unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>> {
        self.enter().await?;
        let collections = self.shared.collections.read();
        Ok(collections.get(name).map(|c| CollectionInfo {
            vector_size: c.spec.vector_size,
            points_count: c.points.len(),
            indexed: c.indexed,
        }))
    }

    async fn create(&self, spec: &CollectionSpec) -> Result<()> {
        self.enter().await?;
        self.shared
            .collections
            .write()
            .entry(spec.name.clone())
            .or_insert_with(|| MemoryCollection { spec: spec.clone(), points: BTreeMap::new(), indexed: false });
        Ok(())
    }

    async fn upsert(&self, spec: &CollectionSpec, points: &[StoredPoint]) -> Result<usize> {
        self.enter().await?;
        let mut collections = self.shared.collections.write();
        let collection = collections
            .get_mut(&spec.name)
            .ok_or_else(|| CollectionMissing(spec.name.clone()))?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.spec.vector_size) {
            bail!(
                "point {} has {} dimensions, collection expects {}",
                bad.id,
                bad.vector.len(),
                collection.spec.vector_size
            );
        }
        for point in points {
            collection.points.insert(point.id.clone(), point.clone());
        }
        Ok(points.len())
    }

    async fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        self.enter().await?;
        let collections = self.shared.collections.read();
        let collection = collections
            .get(&spec.name)
            .ok_or_else(|| CollectionMissing(spec.name.clone()))?;
        let metric = collection.spec.distance;
        let mut hits: Vec<ScoredPoint> = collection
            .points
            .values()
            .filter(|p| filter::matches(&request.filter, &p.payload.metadata))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: similarity(metric, &request.vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn build_index(&self, spec: &CollectionSpec) -> Result<bool> {
        self.enter().await?;
        let mut collections = self.shared.collections.write();
        let collection = collections
            .get_mut(&spec.name)
            .ok_or_else(|| CollectionMissing(spec.name.clone()))?;
        if collection.indexed || collection.points.len() < collection.spec.index.full_scan_threshold {
            return Ok(false);
        }
        if self.shared.index_broken.load(Ordering::SeqCst) {
            bail!("index build for '{}' failed", spec.name);
        }
        collection.indexed = true;
        Ok(true)
    }

    async fn delete(&self, name: &str, ids: &[String]) -> Result<usize> {
        self.enter().await?;
        let mut collections = self.shared.collections.write();
        let Some(collection) = collections.get_mut(name) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| collection.points.remove(id.as_str()).is_some()).count())
    }
}

#[derive(Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Client = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        if self.store.shared.unavailable.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.store.shared.connections.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}
