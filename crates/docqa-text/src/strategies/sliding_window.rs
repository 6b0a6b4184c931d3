use crate::code_blocks::placeholder_spans;
use crate::patterns::SENTENCE_END;
use crate::splitter::{advance_chars, retreat_chars, trim_span, Span};
use crate::strategy::{Chunker, SplitParams};

/// Windows of `chunk_size` chars advancing by `chunk_size - chunk_overlap`.
///
/// A window that would end mid-word is pulled back to the nearest sentence
/// end, newline or space, but never below half the window. The next window
/// starts on a word boundary inside the overlap region, strictly after the
/// previous chunk's start.
pub(crate) struct SlidingWindowChunker;

impl Chunker for SlidingWindowChunker {
    fn split(&self, text: &str, params: &SplitParams) -> Vec<Span> {
        let size = params.chunk_size;
        let overlap = params.chunk_overlap;
        let min_chars = (size / 2).max(1);
        let protected = placeholder_spans(text);

        let mut spans: Vec<Span> = Vec::new();
        let mut start = 0;
        let mut previous_end = 0;
        while start < text.len() {
            let mut end = advance_chars(text, start, size);
            if end < text.len() {
                if splits_word(text, end) {
                    let floor = advance_chars(text, start, min_chars).max(previous_end);
                    if let Some(boundary) = pull_back(text, floor, end) {
                        end = boundary;
                    }
                }
                end = leave_placeholder(&protected, end);
            }

            // A window whose trimmed text adds nothing past the previous
            // chunk is dropped.
            let window = trim_span(text, Span::new(start, end));
            let advances = spans.last().map_or(true, |last| window.start > last.start && window.end > last.end);
            if !window.is_empty() && advances {
                spans.push(window);
            }
            if end >= text.len() {
                break;
            }
            previous_end = end;

            let floor = spans.last().map_or(start, |last| last.start.max(start));
            let mut next = overlap_start(text, &protected, end, overlap);
            if next <= floor {
                next = advance_chars(text, floor, 1);
            }
            next = next_word_start(text, next, end);
            start = leave_placeholder(&protected, next);
        }
        spans
    }
}

// Start of the overlap carried into the next window. A protected block is
// never repeated: the overlap begins after the last one it would include.
fn overlap_start(text: &str, protected: &[Span], end: usize, overlap: usize) -> usize {
    let next = retreat_chars(text, end, overlap);
    protected
        .iter()
        .filter(|p| p.start < end && p.end > next)
        .map(|p| p.end)
        .max()
        .map_or(next, |after| after.max(next))
}

fn splits_word(text: &str, at: usize) -> bool {
    let before = text[..at].chars().next_back();
    let after = text[at..].chars().next();
    matches!((before, after), (Some(b), Some(a)) if !b.is_whitespace() && !a.is_whitespace())
}

// Last sentence end, else newline, else whitespace in [floor, end).
fn pull_back(text: &str, floor: usize, end: usize) -> Option<usize> {
    if floor >= end {
        return None;
    }
    let window = &text[floor..end];
    if let Some(m) = SENTENCE_END.find_iter(window).last() {
        return Some(floor + m.end());
    }
    if let Some(i) = window.rfind('\n') {
        return Some(floor + i + 1);
    }
    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| floor + i + c.len_utf8())
}

// Skip the tail of a word cut by the overlap; stays put when the rest of the
// window is a single word.
fn next_word_start(text: &str, at: usize, end: usize) -> usize {
    if !splits_word(text, at) {
        return at;
    }
    text[at..end]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| at + i + c.len_utf8())
        .unwrap_or(at)
}

fn leave_placeholder(protected: &[Span], at: usize) -> usize {
    protected
        .iter()
        .find(|p| p.start < at && at < p.end)
        .map(|p| p.end)
        .unwrap_or(at)
}
