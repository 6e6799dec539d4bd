//! Rope-backed text mirrors with offset ↔ row/column translation.
//!
//! The remote model addresses text by absolute character offset; the host
//! editor addresses it by row/column. `LocalBuffer` keeps a mirror of one
//! host buffer in a rope, whose line index is maintained incrementally as
//! edits stream in, so conversion stays cheap in both directions without
//! re-scanning the text.
//!
//! All offsets and columns count characters (Unicode scalars), never bytes.

use ropey::{Rope, RopeSlice};

/// A zero-based row/column position. Columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// In-memory mirror of one host text buffer.
///
/// Conversions form a true inverse pair over valid inputs: every offset
/// `0..=len` maps to a distinct position, and every position with
/// `col <= line_len(row)` maps back to the same offset. The offset at the
/// end of a line maps to `(row, line_len)`; the offset at the start of the
/// next line maps to `(row + 1, 0)`.
#[derive(Debug, Clone)]
pub struct LocalBuffer {
    text: Rope,
}

impl LocalBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
        }
    }

    /// Replace the entire contents.
    pub fn set_text(&mut self, text: &str) {
        self.text = Rope::from_str(text);
    }

    /// Apply an incremental edit: characters `start..end` are replaced by
    /// `replacement`. Out-of-range bounds are clamped to the text.
    pub fn edit(&mut self, start: usize, end: usize, replacement: &str) {
        let len = self.text.len_chars();
        let start = start.min(len);
        let end = end.clamp(start, len);
        if start < end {
            self.text.remove(start..end);
        }
        if !replacement.is_empty() {
            self.text.insert(start, replacement);
        }
    }

    /// Full text snapshot.
    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    /// Number of rows. An empty buffer has one (empty) row.
    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Length of `row` in characters, excluding its line break.
    pub fn line_len(&self, row: usize) -> Option<usize> {
        if row >= self.text.len_lines() {
            return None;
        }
        let line = self.text.line(row);
        Some(line.len_chars() - line_break_len(line))
    }

    /// Convert an absolute character offset to a row/column position.
    ///
    /// Returns `None` past the end of the text. An offset inside a
    /// multi-character line break (the LF of a CRLF) yields a column past
    /// the row's content and does not round-trip.
    pub fn offset_to_position(&self, offset: usize) -> Option<Position> {
        if offset > self.text.len_chars() {
            return None;
        }
        let row = self.text.char_to_line(offset);
        let col = offset - self.text.line_to_char(row);
        Some(Position::new(row, col))
    }

    /// Convert a row/column position to an absolute character offset.
    ///
    /// Returns `None` when the row does not exist or the column lies past
    /// the row's content (`col > line_len(row)`).
    pub fn position_to_offset(&self, pos: Position) -> Option<usize> {
        let line_len = self.line_len(pos.row)?;
        if pos.col > line_len {
            return None;
        }
        Some(self.text.line_to_char(pos.row) + pos.col)
    }
}

/// Characters of the line break terminating `line`, if any.
///
/// Covers everything ropey splits lines on: LF, CRLF, CR, and the Unicode
/// line break set.
fn line_break_len(line: RopeSlice<'_>) -> usize {
    let len = line.len_chars();
    if len == 0 {
        return 0;
    }
    match line.char(len - 1) {
        '\n' => {
            if len >= 2 && line.char(len - 2) == '\r' {
                2
            } else {
                1
            }
        }
        '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}' => 1,
        _ => 0,
    }
}
