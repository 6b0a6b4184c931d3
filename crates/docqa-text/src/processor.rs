use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use docqa_core::config::ProcessorConfig;
use docqa_core::types::{Chunk, Metadata};
use docqa_core::{Error, Result};

use crate::code_blocks::{Bias, CodeBlockGuard};
use crate::metadata;
use crate::offsets::OffsetResolver;
use crate::splitter::{trim_span, Span};
use crate::strategy::{Chunker, ChunkingStrategy, SplitParams};

/// Splits documents into chunks according to a validated [`ProcessorConfig`].
pub struct DocumentProcessor {
    config: ProcessorConfig,
    strategy: ChunkingStrategy,
    chunker: Box<dyn Chunker>,
}

/// Aggregate figures over a set of chunks, sizes in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStatistics {
    pub total_chunks: usize,
    pub total_characters: usize,
    pub average_chunk_size: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub strategy: ChunkingStrategy,
}

struct Draft {
    content: String,
    start_index: usize,
    end_index: usize,
}

impl DocumentProcessor {
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be at least 1".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let strategy: ChunkingStrategy = config.strategy.parse()?;
        Ok(Self { config, strategy, chunker: strategy.chunker() })
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Chunk one document.
    ///
    /// `metadata` is copied into every chunk. A `document_id` entry, when
    /// present as a string, names the document; otherwise the id is derived
    /// from the content. Empty or whitespace-only input yields no chunks.
    pub fn process(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let guard = if self.config.preserve_code_blocks {
            CodeBlockGuard::protect(text)
        } else {
            CodeBlockGuard::passthrough(text)
        };
        let working = guard.working();
        let params = SplitParams {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
        };

        let mut resolver = OffsetResolver::new(text);
        let mut drafts = Vec::new();
        let mut last: Option<Span> = None;
        for span in self.chunker.split(working, &params) {
            let span = trim_span(working, span);
            let contained = last.is_some_and(|l| span.start >= l.start && span.end <= l.end);
            if span.is_empty() || contained {
                continue;
            }
            last = Some(span);
            let content = guard.restore(&working[span.start..span.end]);
            let hint = (
                guard.to_source_offset(span.start, Bias::Start),
                guard.to_source_offset(span.end, Bias::End),
            );
            let (start_index, end_index) = resolver.resolve(&content, hint);
            drafts.push(Draft { content, start_index, end_index });
        }

        let document_id = document_id_for(text, metadata);
        let total_chunks = drafts.len();
        let processed_at = Utc::now().to_rfc3339();
        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, draft)| {
                let meta = self.chunk_metadata(metadata, &document_id, chunk_index, total_chunks, &draft, &processed_at);
                Chunk {
                    chunk_id: chunk_id(&document_id, chunk_index, &draft.content),
                    document_id: document_id.clone(),
                    chunk_index,
                    content: draft.content,
                    metadata: meta,
                    start_index: draft.start_index,
                    end_index: draft.end_index,
                }
            })
            .collect();

        debug!(
            target: "docqa::text",
            document_id = %document_id,
            strategy = %self.strategy,
            code_blocks = guard.block_count(),
            chunks = chunks.len(),
            "document chunked"
        );
        chunks
    }

    /// Chunk every `.txt` and `.md` file below `dir`, in path order.
    ///
    /// Each file's path relative to `dir` is its document id. `source_path`
    /// and `category` (the parent directory, or `general` at the top level)
    /// are added to the chunk metadata. Symlinks are followed. A file that
    /// cannot be read (or a broken link) fails the whole call with
    /// [`Error::Io`] naming the path, so no document is dropped silently.
    pub fn process_directory(&self, dir: &Path) -> Result<Vec<Chunk>> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("directory {}", dir.display())));
        }

        let mut chunks = Vec::new();
        let mut documents = 0usize;
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name().into_iter() {
            let entry = entry.map_err(|e| {
                let kind = e.io_error().map_or(io::ErrorKind::Other, io::Error::kind);
                Error::Io(io::Error::new(kind, e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
            if ext != "txt" && ext != "md" {
                continue;
            }

            let bytes = fs::read(path)
                .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("{}: {e}", path.display()))))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let relative = path.strip_prefix(dir).unwrap_or(path);
            let document_id = relative.to_string_lossy().replace('\\', "/");
            let category = relative
                .parent()
                .and_then(|p| p.to_str())
                .filter(|p| !p.is_empty())
                .unwrap_or("general")
                .to_string();

            let mut meta = Metadata::new();
            meta.insert("document_id".into(), Value::String(document_id));
            meta.insert("source_path".into(), Value::String(path.display().to_string()));
            meta.insert("category".into(), Value::String(category));

            chunks.extend(self.process(&text, &meta));
            documents += 1;
        }

        info!(target: "docqa::text", dir = %dir.display(), documents, chunks = chunks.len(), "directory processed");
        Ok(chunks)
    }

    pub fn statistics(&self, chunks: &[Chunk]) -> ChunkStatistics {
        let sizes: Vec<usize> = chunks.iter().map(|c| c.content.chars().count()).collect();
        let total_characters: usize = sizes.iter().sum();
        ChunkStatistics {
            total_chunks: chunks.len(),
            total_characters,
            average_chunk_size: if sizes.is_empty() {
                0.0
            } else {
                total_characters as f64 / sizes.len() as f64
            },
            min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
            max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
            strategy: self.strategy,
        }
    }

    fn chunk_metadata(
        &self,
        base: &Metadata,
        document_id: &str,
        chunk_index: usize,
        total_chunks: usize,
        draft: &Draft,
        processed_at: &str,
    ) -> Metadata {
        let mut meta = base.clone();
        meta.insert("document_id".into(), Value::String(document_id.to_string()));
        meta.insert("chunk_index".into(), json!(chunk_index));
        meta.insert("total_chunks".into(), json!(total_chunks));
        meta.insert("chunking_strategy".into(), Value::String(self.strategy.as_str().to_string()));
        meta.insert("chunk_char_count".into(), json!(draft.content.chars().count()));
        if self.config.preserve_code_blocks {
            meta.insert("has_code".into(), json!(metadata::has_code(&draft.content)));
        }
        if self.config.enrich_metadata {
            meta.extend(metadata::enrichment(&draft.content, processed_at));
        }
        if self.config.preserve_structure {
            meta.extend(metadata::structure(&draft.content));
        }
        meta
    }
}

fn document_id_for(text: &str, metadata: &Metadata) -> String {
    match metadata.get("document_id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => format!("doc-{}", &blake3::hash(text.as_bytes()).to_hex()[..16]),
    }
}

/// Content-addressed chunk id: identical document, position and content
/// always give the same id.
pub fn chunk_id(document_id: &str, chunk_index: usize, content: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(document_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(&(chunk_index as u64).to_le_bytes());
    hasher.update(&[0]);
    hasher.update(content.as_bytes());
    hasher.finalize().to_hex()[..32].to_string()
}
