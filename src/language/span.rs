#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn union(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Byte range covering the given 1-based line, without its line terminator.
pub fn line_span(source: &str, line: usize) -> Span {
    let mut start = 0;
    for (idx, text) in source.split('\n').enumerate() {
        let end = start + text.len();
        if idx + 1 == line {
            let trimmed = text.trim_end_matches('\r');
            return Span::new(start, start + trimmed.len());
        }
        start = end + 1;
    }
    Span::new(source.len(), source.len())
}
