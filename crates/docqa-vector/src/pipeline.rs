use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use tracing::info;

use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, Metadata, SearchResult};
use docqa_core::{Error, Result};
use docqa_embed::embed_in_batches;
use docqa_hybrid::FusionWeights;
use docqa_text::DocumentProcessor;

use crate::manager::VectorStorageManager;
use crate::store::Connector;

const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub added: usize,
    pub failed: usize,
}

/// Processor, embedder and storage manager wired together.
pub struct IngestPipeline<C: Connector> {
    processor: DocumentProcessor,
    embedder: Arc<dyn Embedder>,
    manager: VectorStorageManager<C>,
}

impl<C: Connector> IngestPipeline<C> {
    /// Ensure the collection exists and check that the embedder produces
    /// vectors of the collection's size.
    pub async fn open(
        processor: DocumentProcessor,
        embedder: Arc<dyn Embedder>,
        manager: VectorStorageManager<C>,
    ) -> Result<Self> {
        let collection = manager.ensure_collection().await?;
        if embedder.dim() != collection.vector_size {
            return Err(Error::Configuration(format!(
                "embedder produces {}-dimensional vectors but collection '{}' stores {}",
                embedder.dim(),
                collection.name,
                collection.vector_size
            )));
        }
        Ok(Self { processor, embedder, manager })
    }

    pub fn manager(&self) -> &VectorStorageManager<C> {
        &self.manager
    }

    pub fn processor(&self) -> &DocumentProcessor {
        &self.processor
    }

    pub async fn ingest(&self, text: &str, metadata: &Metadata) -> Result<IngestReport> {
        let chunks = self.processor.process(text, metadata);
        self.ingest_chunks(&chunks).await
    }

    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let chunks = self.processor.process_directory(dir)?;
        self.ingest_chunks(&chunks).await
    }

    pub async fn ingest_chunks(&self, chunks: &[Chunk]) -> Result<IngestReport> {
        if chunks.is_empty() {
            return Ok(IngestReport::default());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embed(texts).await?;
        let outcome = self.manager.add_documents(chunks, &embeddings).await?;
        let report = IngestReport { chunks: chunks.len(), added: outcome.added, failed: outcome.failed };
        info!(target: "docqa::vector", chunks = report.chunks, added = report.added, failed = report.failed, "ingested");
        Ok(report)
    }

    pub async fn query(&self, text: &str, limit: usize, filters: Option<&Metadata>) -> Result<Vec<SearchResult>> {
        let vector = self.embed_query(text).await?;
        self.manager.search_similar(&vector, limit, None, filters).await
    }

    pub async fn hybrid_query<S: AsRef<str>>(
        &self,
        text: &str,
        keywords: &[S],
        weights: FusionWeights,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let vector = self.embed_query(text).await?;
        self.manager
            .hybrid_search(&vector, keywords, weights.vector, weights.keyword, limit)
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()]).await?.pop().ok_or_else(|| Error::Upstream {
            stage: "embedding",
            source: anyhow!("no vector returned for query"),
        })
    }

    // The embedder may block, so it runs on the blocking pool.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let limit = self.manager.timeout();
        let task = tokio::task::spawn_blocking(move || embed_in_batches(embedder.as_ref(), &texts, EMBED_BATCH_SIZE));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(Error::Upstream { stage: "embedding", source: join.into() }),
            Err(_) => Err(Error::Upstream {
                stage: "embedding",
                source: anyhow!("embedding timed out after {:?}", limit),
            }),
        }
    }
}
