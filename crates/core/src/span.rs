//! Source positions, spans, and the line-indexed source map
//!
//! Positions are value types: every token, AST node, and IR node copies them
//! so downstream passes never pin the source buffer.

use serde::{Deserialize, Serialize};

/// A point in a source file.
///
/// `offset` is the byte count of the prefix up to (exclusive) the character,
/// `line` counts `\n` seen plus one, and `column` counts codepoints since the
/// last `\n`, starting at one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        debug_assert!(line >= 1, "Position: line ({}) must be >= 1", line);
        debug_assert!(column >= 1, "Position: column ({}) must be >= 1", column);
        Position {
            line,
            column,
            offset,
        }
    }

    /// The start of a file.
    pub fn start() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open byte range `[start, end)` with line/column info at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(
            start.offset <= end.offset,
            "Span: start offset ({}) must be <= end offset ({})",
            start.offset,
            end.offset
        );
        Span { start, end }
    }

    /// A zero-width span at a single position.
    pub fn point(pos: Position) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Line index over a source buffer.
///
/// Construction scans the text once; afterwards `position_of` resolves any
/// byte offset to a `Position` in O(log n) over the recorded line starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    /// Byte offset of the first character of each line. Always starts with 0.
    line_starts: Vec<usize>,
    len: usize,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourceMap {
            line_starts,
            len: source.len(),
        }
    }

    /// Borrow the line-start table (byte offsets, one per line).
    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    /// Number of lines, counting the final line even when unterminated.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Resolve a byte offset to a position within `source`.
    ///
    /// `source` must be the same text the map was built from; the column is
    /// counted in codepoints since the start of the line.
    pub fn position_of(&self, source: &str, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line_idx];
        let column = source[line_start..offset].chars().count() as u32 + 1;
        Position {
            line: line_idx as u32 + 1,
            column,
            offset,
        }
    }

    /// Byte range `[start, end)` of a 1-indexed line, excluding the newline.
    pub fn line_range(&self, line: u32) -> Option<(usize, usize)> {
        let idx = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = match self.line_starts.get(idx + 1) {
            // Next line start sits one past the '\n'.
            Some(&next) => next - 1,
            None => self.len,
        };
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_of_multiline() {
        let src = "ab\ncd\n";
        let map = SourceMap::new(src);
        assert_eq!(map.position_of(src, 0), Position::new(1, 1, 0));
        assert_eq!(map.position_of(src, 1), Position::new(1, 2, 1));
        assert_eq!(map.position_of(src, 3), Position::new(2, 1, 3));
        assert_eq!(map.position_of(src, 4), Position::new(2, 2, 4));
        // One past the final newline: start of the (empty) third line.
        assert_eq!(map.position_of(src, 6), Position::new(3, 1, 6));
    }

    #[test]
    fn test_position_of_unicode_column() {
        let src = "héllo";
        let map = SourceMap::new(src);
        // 'é' is two bytes; the column after it counts codepoints.
        assert_eq!(map.position_of(src, 3).column, 3);
        assert_eq!(map.position_of(src, 3).offset, 3);
    }

    #[test]
    fn test_line_range() {
        let src = "ab\ncd\nef";
        let map = SourceMap::new(src);
        assert_eq!(map.line_range(1), Some((0, 2)));
        assert_eq!(map.line_range(2), Some((3, 5)));
        assert_eq!(map.line_range(3), Some((6, 8)));
        assert_eq!(map.line_range(4), None);
        assert_eq!(map.line_range(0), None);
    }

    #[test]
    fn test_empty_source() {
        let map = SourceMap::new("");
        assert_eq!(map.line_count(), 1);
        assert_eq!(map.position_of("", 0), Position::start());
        assert_eq!(map.line_range(1), Some((0, 0)));
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(Position::new(1, 1, 0), Position::new(1, 3, 2));
        let b = Span::new(Position::new(1, 2, 1), Position::new(2, 1, 5));
        let m = a.merge(b);
        assert_eq!(m.start.offset, 0);
        assert_eq!(m.end.offset, 5);
        assert_eq!(m.len(), 5);
    }
}
