//! Locating chunk text inside the original document.
//!
//! Chunks are emitted in document order, so each lookup starts where the
//! previous chunk was found. Offsets never move backwards, even when a chunk
//! cannot be matched verbatim.

pub(crate) struct OffsetResolver<'a> {
    source: &'a str,
    previous: Option<(usize, usize)>,
}

impl<'a> OffsetResolver<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, previous: None }
    }

    /// Resolve `content` to `(start, end)` byte offsets in the source.
    ///
    /// `hint` is where the splitter believes the chunk sits; it is accepted
    /// when the bytes there match and ordering holds.
    pub fn resolve(&mut self, content: &str, hint: (usize, usize)) -> (usize, usize) {
        let (floor_start, floor_end) = self.previous.unwrap_or((0, 0));
        let located = self
            .verify(content, hint, floor_start, floor_end)
            .or_else(|| self.search_forward(content, floor_start, floor_end))
            .unwrap_or_else(|| self.fallback(content, floor_start, floor_end));
        self.previous = Some(located);
        located
    }

    fn verify(
        &self,
        content: &str,
        (start, end): (usize, usize),
        floor_start: usize,
        floor_end: usize,
    ) -> Option<(usize, usize)> {
        (self.advances(start, end, floor_start, floor_end) && self.source.get(start..end) == Some(content))
            .then_some((start, end))
    }

    // Neither bound moves back, and the range differs from the previous one.
    fn advances(&self, start: usize, end: usize, floor_start: usize, floor_end: usize) -> bool {
        match self.previous {
            Some(_) => start >= floor_start && end >= floor_end && (start > floor_start || end > floor_end),
            None => true,
        }
    }

    fn search_forward(&self, content: &str, floor_start: usize, floor_end: usize) -> Option<(usize, usize)> {
        if content.is_empty() {
            return None;
        }
        let from = floor_start.min(self.source.len());
        self.source
            .get(from..)?
            .match_indices(content)
            .map(|(i, _)| (from + i, from + i + content.len()))
            .find(|&(start, end)| self.advances(start, end, floor_start, floor_end))
    }

    // Content no longer occurs verbatim (normalized whitespace, restored
    // code). Anchor at the previous end and keep the length; near the end of
    // the document, end there instead. The range is never empty.
    fn fallback(&self, content: &str, floor_start: usize, floor_end: usize) -> (usize, usize) {
        let len = self.source.len();
        let want = content.len().max(1);
        let mut start = floor_boundary(self.source, floor_end.min(len)).max(floor_start);
        if start + want > len {
            start = floor_boundary(self.source, len.saturating_sub(want)).max(floor_start);
        }
        let end = ceil_boundary(self.source, (start + want).min(len)).max(floor_end);
        (start, end)
    }
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
