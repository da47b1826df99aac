//! Source Location Utilities
//!
//! Byte spans for tokens and production matches, plus line/column
//! conversion used when rendering lexical and syntax errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in chars)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Calculate position from an offset in the input
    ///
    /// Offsets past the end are clamped to the input length.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());

        let mut line = 1;
        let mut column = 1;
        for (idx, ch) in input.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::new(0, 1, 1)
    }
}

/// A half-open byte range `[start, end)` in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-length span at `offset`
    #[inline]
    pub fn empty(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if this is a zero-length span
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if this span contains an offset
    #[inline]
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Smallest span covering both
    #[inline]
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The covered text, or `""` if the span falls outside `input`
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Get the line content at a given offset
pub fn get_line_at_offset(input: &str, offset: usize) -> &str {
    let mut offset = offset.min(input.len());
    while !input.is_char_boundary(offset) {
        offset -= 1;
    }

    let line_start = input[..offset].rfind('\n').map_or(0, |pos| pos + 1);
    let line_end = input[offset..]
        .find('\n')
        .map_or(input.len(), |pos| offset + pos);

    &input[line_start..line_end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_offset_newline() {
        let input = "hello\nworld";
        let pos = SourcePosition::from_offset(input, 8);
        assert_eq!(pos.offset, 8);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_position_from_offset_multibyte() {
        let input = "héllo x";
        // 'é' is two bytes, so byte 7 is the 'x' in column 7
        let pos = SourcePosition::from_offset(input, 7);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 7);
    }

    #[test]
    fn test_position_beyond_end() {
        let pos = SourcePosition::from_offset("abc", 100);
        assert_eq!(pos.offset, 3);
        assert_eq!(pos.column, 4);
    }

    #[test]
    fn test_span_basics() {
        let span = Span::new(2, 7);
        assert_eq!(span.len(), 5);
        assert!(span.contains(2));
        assert!(!span.contains(7));
        assert_eq!(span.text("hello world"), "llo w");
        assert!(Span::empty(3).is_empty());
        assert_eq!(span.merge(&Span::new(6, 9)), Span::new(2, 9));
    }

    #[test]
    fn test_get_line_at_offset() {
        let input = "line1\nline2\nline3";
        assert_eq!(get_line_at_offset(input, 0), "line1");
        assert_eq!(get_line_at_offset(input, 6), "line2");
        assert_eq!(get_line_at_offset(input, 17), "line3");
    }
}
