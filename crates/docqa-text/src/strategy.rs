use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use docqa_core::Error;

use crate::splitter::Span;
use crate::strategies::{RecursiveChunker, SemanticChunker, SlidingWindowChunker, StructuralChunker};

/// How a document is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Paragraphs, then lines, sentences, words and finally characters.
    Recursive,
    /// Whole sentences packed up to the size limit.
    Semantic,
    /// Fixed-size windows nudged onto word boundaries.
    SlidingWindow,
    /// Markdown sections delimited by headers.
    Structural,
}

impl ChunkingStrategy {
    pub const ALL: [ChunkingStrategy; 4] = [
        ChunkingStrategy::Recursive,
        ChunkingStrategy::Semantic,
        ChunkingStrategy::SlidingWindow,
        ChunkingStrategy::Structural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::Recursive => "recursive",
            ChunkingStrategy::Semantic => "semantic",
            ChunkingStrategy::SlidingWindow => "sliding_window",
            ChunkingStrategy::Structural => "structural",
        }
    }

    pub(crate) fn chunker(self) -> Box<dyn Chunker> {
        match self {
            ChunkingStrategy::Recursive => Box::new(RecursiveChunker),
            ChunkingStrategy::Semantic => Box::new(SemanticChunker),
            ChunkingStrategy::SlidingWindow => Box::new(SlidingWindowChunker),
            ChunkingStrategy::Structural => Box::new(StructuralChunker),
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ChunkingStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "unknown chunking strategy '{}' (expected one of recursive, semantic, sliding_window, structural)",
                    s
                ))
            })
    }
}

/// Size limits, in characters, handed to every chunker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// One implementation per [`ChunkingStrategy`].
///
/// Returns spans over `text` in document order with strictly increasing
/// starts. Spans may carry surrounding whitespace; the processor trims them.
pub(crate) trait Chunker: Send + Sync {
    fn split(&self, text: &str, params: &SplitParams) -> Vec<Span>;
}
