//! Fenced code block protection.
//!
//! Before splitting, every fenced block is swapped for a short placeholder
//! token that no separator level can cut. Chunk text is restored afterwards
//! and working offsets are mapped back onto the source.

use std::borrow::Cow;

use crate::patterns::FENCED_CODE;
use crate::splitter::Span;

pub(crate) const PLACEHOLDER_OPEN: char = '\u{E000}';
pub(crate) const PLACEHOLDER_CLOSE: char = '\u{E001}';

#[derive(Debug)]
struct ProtectedBlock {
    source: Span,
    working: Span,
    token: String,
}

/// Which side of a placeholder an offset that falls inside it snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bias {
    Start,
    End,
}

pub(crate) struct CodeBlockGuard<'a> {
    source: &'a str,
    working: Cow<'a, str>,
    blocks: Vec<ProtectedBlock>,
}

impl<'a> CodeBlockGuard<'a> {
    pub fn protect(source: &'a str) -> Self {
        let mut working = String::with_capacity(source.len());
        let mut blocks = Vec::new();
        let mut cursor = 0;
        for (i, m) in FENCED_CODE.find_iter(source).enumerate() {
            working.push_str(&source[cursor..m.start()]);
            let token = format!("{PLACEHOLDER_OPEN}CODE_BLOCK_{i}{PLACEHOLDER_CLOSE}");
            let at = working.len();
            working.push_str(&token);
            blocks.push(ProtectedBlock {
                source: Span::new(m.start(), m.end()),
                working: Span::new(at, working.len()),
                token,
            });
            cursor = m.end();
        }
        if blocks.is_empty() {
            return Self::passthrough(source);
        }
        working.push_str(&source[cursor..]);
        Self { source, working: Cow::Owned(working), blocks }
    }

    pub fn passthrough(source: &'a str) -> Self {
        Self { source, working: Cow::Borrowed(source), blocks: Vec::new() }
    }

    pub fn working(&self) -> &str {
        &self.working
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Put the original code back into a fragment of the working text.
    pub fn restore(&self, fragment: &str) -> String {
        if self.blocks.is_empty() || !fragment.contains(PLACEHOLDER_OPEN) {
            return fragment.to_string();
        }
        let mut out = fragment.to_string();
        for block in &self.blocks {
            if out.contains(&block.token) {
                out = out.replace(&block.token, &self.source[block.source.start..block.source.end]);
            }
        }
        out
    }

    /// Map a working-text offset to the corresponding source offset.
    pub fn to_source_offset(&self, working_offset: usize, bias: Bias) -> usize {
        let mut shift: isize = 0;
        for block in &self.blocks {
            if working_offset >= block.working.end {
                shift += span_len(block.source) as isize - span_len(block.working) as isize;
            } else if working_offset > block.working.start {
                return match bias {
                    Bias::Start => block.source.start,
                    Bias::End => block.source.end,
                };
            } else {
                break;
            }
        }
        (working_offset as isize + shift) as usize
    }
}

fn span_len(span: Span) -> usize {
    span.end - span.start
}

/// Byte ranges of the placeholders present in `working`.
pub(crate) fn placeholder_spans(working: &str) -> Vec<Span> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(open) = working[from..].find(PLACEHOLDER_OPEN) {
        let start = from + open;
        match working[start..].find(PLACEHOLDER_CLOSE) {
            Some(close) => {
                let end = start + close + PLACEHOLDER_CLOSE.len_utf8();
                out.push(Span::new(start, end));
                from = end;
            }
            None => break,
        }
    }
    out
}
