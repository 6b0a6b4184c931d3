use crate::splitter::{split_parts, Level, Span, ALL_LEVELS};
use crate::strategy::{Chunker, SplitParams};

/// Packs whole sentences. A sentence longer than the limit falls back to the
/// recursive hierarchy.
pub(crate) struct SemanticChunker;

impl Chunker for SemanticChunker {
    fn split(&self, text: &str, params: &SplitParams) -> Vec<Span> {
        let sentences = Level::Sentence.split(text, Span::new(0, text.len()));
        split_parts(
            text,
            sentences,
            ALL_LEVELS,
            params.chunk_size,
            params.chunk_overlap,
            params.chunk_overlap,
        )
    }
}
