//! Span-level splitting primitives shared by the chunking strategies.
//!
//! Everything here works on byte ranges of one working text. A split never
//! drops or duplicates bytes: separators stay attached to the piece before
//! them, so the pieces of a span tile it exactly.

use std::collections::VecDeque;

use crate::code_blocks::{PLACEHOLDER_CLOSE, PLACEHOLDER_OPEN};
use crate::patterns::SENTENCE_END;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn chars(&self, text: &str) -> usize {
        text[self.start..self.end].chars().count()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Piece {
    span: Span,
    chars: usize,
    blank: bool,
    protected: bool,
}

/// Separator hierarchy, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

pub(crate) const ALL_LEVELS: &[Level] =
    &[Level::Paragraph, Level::Line, Level::Sentence, Level::Word, Level::Char];

impl Level {
    pub fn split(self, text: &str, span: Span) -> Vec<Span> {
        let slice = &text[span.start..span.end];
        let cuts: Vec<usize> = match self {
            Level::Paragraph => slice.match_indices("\n\n").map(|(i, m)| i + m.len()).collect(),
            Level::Line => slice.match_indices('\n').map(|(i, _)| i + 1).collect(),
            Level::Sentence => SENTENCE_END.find_iter(slice).map(|m| m.end()).collect(),
            Level::Word => slice
                .char_indices()
                .filter(|(_, c)| c.is_whitespace())
                .map(|(i, c)| i + c.len_utf8())
                .collect(),
            Level::Char => return char_pieces(text, span),
        };
        cut(span, cuts.into_iter().map(|c| span.start + c))
    }
}

/// Cut `span` at the given absolute offsets. Offsets outside the span or
/// not moving forward are ignored.
pub(crate) fn cut(span: Span, cuts: impl IntoIterator<Item = usize>) -> Vec<Span> {
    let mut out = Vec::new();
    let mut cursor = span.start;
    for at in cuts {
        if at > cursor && at < span.end {
            out.push(Span::new(cursor, at));
            cursor = at;
        }
    }
    if cursor < span.end {
        out.push(Span::new(cursor, span.end));
    }
    out
}

// One piece per char; a protected placeholder stays a single piece.
fn char_pieces(text: &str, span: Span) -> Vec<Span> {
    let slice = &text[span.start..span.end];
    let mut out = Vec::new();
    let mut iter = slice.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        let start = span.start + i;
        if c == PLACEHOLDER_OPEN {
            if let Some(close) = slice[i..].find(PLACEHOLDER_CLOSE) {
                let end = i + close + PLACEHOLDER_CLOSE.len_utf8();
                out.push(Span::new(start, span.start + end));
                while iter.peek().is_some_and(|&(j, _)| j < end) {
                    iter.next();
                }
                continue;
            }
        }
        out.push(Span::new(start, start + c.len_utf8()));
    }
    out
}

/// Greedily pack contiguous pieces into spans of at most `size` chars.
///
/// When a span is emitted, trailing pieces totalling at most `overlap` chars
/// are carried into the next one. The carried run never holds a protected
/// code placeholder and never starts at or before the first non-blank piece
/// of the emitted span. Pieces larger than `size` must be split by the
/// caller first.
pub(crate) fn pack(text: &str, pieces: &[Span], size: usize, overlap: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut window_chars = 0;

    for &span in pieces {
        let slice = &text[span.start..span.end];
        let piece = Piece {
            span,
            chars: slice.chars().count(),
            blank: slice.trim().is_empty(),
            protected: slice.contains(PLACEHOLDER_OPEN),
        };
        if !window.is_empty() && window_chars + piece.chars > size {
            out.push(window_span(&window));
            let mut dropped_text = false;
            while let Some(&front) = window.front() {
                let keep = dropped_text
                    && window_chars <= overlap
                    && window_chars + piece.chars <= size
                    && !window.iter().any(|p| p.protected);
                if keep {
                    break;
                }
                dropped_text |= !front.blank;
                window_chars -= front.chars;
                window.pop_front();
            }
        }
        window_chars += piece.chars;
        window.push_back(piece);
    }
    if !window.is_empty() {
        out.push(window_span(&window));
    }
    out
}

fn window_span(window: &VecDeque<Piece>) -> Span {
    let start = window.front().map(|p| p.span.start).unwrap_or_default();
    let end = window.back().map(|p| p.span.end).unwrap_or(start);
    Span::new(start, end)
}

/// Split `span` at the coarsest level that divides it, recursing into finer
/// levels for pieces that are still too large.
pub(crate) fn split_hierarchical(
    text: &str,
    span: Span,
    levels: &[Level],
    size: usize,
    overlap: usize,
) -> Vec<Span> {
    if span.chars(text) <= size {
        return vec![span];
    }
    let mut remaining = levels;
    while let Some((level, finer)) = remaining.split_first() {
        let parts = level.split(text, span);
        if parts.len() > 1 {
            return split_parts(text, parts, finer, size, overlap, overlap);
        }
        remaining = finer;
    }
    // Indivisible, e.g. a single protected code block.
    vec![span]
}

/// Pack the parts that fit with `pack_overlap`; parts that do not fit are
/// split with `split_hierarchical` over `finer` levels, in place.
pub(crate) fn split_parts(
    text: &str,
    parts: Vec<Span>,
    finer: &[Level],
    size: usize,
    pack_overlap: usize,
    overlap: usize,
) -> Vec<Span> {
    let mut out = Vec::new();
    let mut fitting = Vec::new();
    for part in parts {
        if part.chars(text) <= size {
            fitting.push(part);
            continue;
        }
        out.extend(pack(text, &fitting, size, pack_overlap));
        fitting.clear();
        out.extend(split_hierarchical(text, part, finer, size, overlap));
    }
    out.extend(pack(text, &fitting, size, pack_overlap));
    out
}

/// Narrow `span` to exclude leading and trailing whitespace.
pub(crate) fn trim_span(text: &str, span: Span) -> Span {
    let slice = &text[span.start..span.end];
    let trimmed_start = slice.trim_start();
    if trimmed_start.is_empty() {
        return Span::new(span.end, span.end);
    }
    let lead = slice.len() - trimmed_start.len();
    let trail = slice.len() - slice.trim_end().len();
    Span::new(span.start + lead, span.end - trail)
}

/// Byte offset `n` chars after `from`, saturating at the end of `text`.
pub(crate) fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..].char_indices().nth(n).map(|(i, _)| from + i).unwrap_or(text.len())
}

/// Byte offset `n` chars before `from`, saturating at zero.
pub(crate) fn retreat_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from].char_indices().rev().nth(n - 1).map(|(i, _)| i).unwrap_or(0)
}
