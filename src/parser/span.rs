use std::fmt::Display;
use std::ops::Range;
use std::path::Path;

/// A region of a source file.
/// Stores the text it covers so that
/// it can be printed without the
/// file cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span<'a> {
    /// The file containing this span.
    file: &'a Path,

    /// Byte range inside the file.
    range: Range<usize>,

    /// The text covered by the span.
    text: &'a str,
}

impl<'a> Span<'a> {
    /// Converts a pest Span into a Span
    /// that ariadne can report against.
    pub fn from_pest(file: &'a Path, span: pest::Span<'a>) -> Span<'a> {
        Span {
            file,
            range: span.start()..span.end(),
            text: span.as_str(),
        }
    }
}

impl<'a> ariadne::Span for Span<'a> {
    type SourceId = Path;

    fn source(&self) -> &Self::SourceId {
        self.file
    }

    fn start(&self) -> usize {
        self.range.start
    }

    fn end(&self) -> usize {
        self.range.end
    }
}

impl<'a> Display for Span<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}
