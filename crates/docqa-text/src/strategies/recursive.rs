use crate::splitter::{split_hierarchical, Span, ALL_LEVELS};
use crate::strategy::{Chunker, SplitParams};

pub(crate) struct RecursiveChunker;

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str, params: &SplitParams) -> Vec<Span> {
        split_hierarchical(
            text,
            Span::new(0, text.len()),
            ALL_LEVELS,
            params.chunk_size,
            params.chunk_overlap,
        )
    }
}
