use crate::patterns::HEADER;
use crate::splitter::{cut, split_parts, Span, ALL_LEVELS};
use crate::strategy::{Chunker, SplitParams};

/// Sections start at markdown headers. Small sections are merged without
/// overlap so every chunk begins at a section boundary; oversized sections
/// are split recursively.
pub(crate) struct StructuralChunker;

impl Chunker for StructuralChunker {
    fn split(&self, text: &str, params: &SplitParams) -> Vec<Span> {
        split_parts(
            text,
            sections(text),
            ALL_LEVELS,
            params.chunk_size,
            0,
            params.chunk_overlap,
        )
    }
}

fn sections(text: &str) -> Vec<Span> {
    let mut starts = Vec::new();
    let mut offset = 0;
    let mut in_fence = false;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence && HEADER.is_match(line) {
            starts.push(offset);
        }
        offset += line.len();
    }
    cut(Span::new(0, text.len()), starts)
}
