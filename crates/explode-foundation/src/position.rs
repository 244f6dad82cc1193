//! Byte offset <-> LSP position mapping, and offset tracking across edits
//!
//! LSP positions count characters in UTF-16 code units. Everything else in
//! explode works in byte offsets over one immutable text snapshot, so the two
//! meet here.

use crate::protocol::TextRange;
use lsp_types::{Position, Range};

/// Line table over a text snapshot
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    /// Position of a byte offset. Offsets past the end clamp to the end; offsets
    /// inside a multi-byte character round down to its first byte.
    pub fn position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let character: usize = self.text[line_start..offset]
            .chars()
            .map(char::len_utf16)
            .sum();

        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Byte offset of a position. Lines past the end map to the end of the text;
    /// characters past the end of a line map to the end of that line.
    pub fn offset(&self, position: Position) -> usize {
        let Some(&line_start) = self.line_starts.get(position.line as usize) else {
            return self.text.len();
        };
        let line_end = self
            .line_starts
            .get(position.line as usize + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let line = &self.text[line_start..line_end];
        let line = line.strip_suffix('\r').unwrap_or(line);

        let mut utf16 = 0u32;
        for (byte_idx, ch) in line.char_indices() {
            if utf16 >= position.character {
                return line_start + byte_idx;
            }
            utf16 += ch.len_utf16() as u32;
        }
        line_start + line.len()
    }

    pub fn range(&self, range: TextRange) -> Range {
        Range {
            start: self.position(range.start),
            end: self.position(range.end),
        }
    }

    pub fn text_range(&self, range: Range) -> TextRange {
        let start = self.offset(range.start);
        let end = self.offset(range.end).max(start);
        TextRange::new(start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordedEdit {
    start: usize,
    old_len: usize,
    new_len: usize,
}

/// Maps offsets of an original snapshot through the edits applied since.
///
/// Each edit is recorded in the coordinates of the text as it was when the edit
/// was applied, in application order.
#[derive(Debug, Clone, Default)]
pub struct OffsetMap {
    edits: Vec<RecordedEdit>,
}

impl OffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old_len` bytes at `start` were replaced by `new_len` bytes
    pub fn record(&mut self, start: usize, old_len: usize, new_len: usize) {
        self.edits.push(RecordedEdit {
            start,
            old_len,
            new_len,
        });
    }

    pub fn is_identity(&self) -> bool {
        self.edits.iter().all(|e| e.old_len == 0 && e.new_len == 0)
    }

    /// Map a range; `None` when an edit removed or rewrote part of it
    pub fn map_range(&self, range: TextRange) -> Option<TextRange> {
        let mut start = range.start;
        let mut end = range.end;
        for edit in &self.edits {
            start = Self::shift(start, edit, false)?;
            end = Self::shift(end, edit, true)?;
        }
        (start <= end).then(|| TextRange::new(start, end))
    }

    fn shift(offset: usize, edit: &RecordedEdit, exclusive_end: bool) -> Option<usize> {
        let edit_end = edit.start + edit.old_len;
        let untouched = if exclusive_end {
            offset <= edit.start
        } else {
            offset < edit.start
        };
        if untouched {
            Some(offset)
        } else if offset >= edit_end {
            Some(offset - edit.old_len + edit.new_len)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn test_position_ascii() {
        let text = "const a = 1;\nexport class Foo {}\n";
        let index = LineIndex::new(text);
        assert_eq!(index.position(0), pos(0, 0));
        assert_eq!(index.position(6), pos(0, 6));
        assert_eq!(index.position(13), pos(1, 0));
        assert_eq!(index.position(26), pos(1, 13));
        assert_eq!(index.position(text.len()), pos(2, 0));
        assert_eq!(index.position(text.len() + 10), pos(2, 0));
    }

    #[test]
    fn test_position_counts_utf16_units() {
        // '€' is 3 bytes / 1 unit, '😀' is 4 bytes / 2 units
        let text = "const s = '€😀'; const t = 1;";
        let index = LineIndex::new(text);
        let t_offset = text.find("t =").unwrap();
        assert_eq!(index.position(t_offset), pos(0, 23));
        assert_eq!(index.offset(pos(0, 23)), t_offset);
    }

    #[test]
    fn test_offset_roundtrip_and_clamping() {
        let text = "let x = 1;\r\nlet y = 2;\n";
        let index = LineIndex::new(text);
        let y = text.find('y').unwrap();
        assert_eq!(index.offset(index.position(y)), y);
        // past the end of line 0 stops before "\r\n"
        assert_eq!(index.offset(pos(0, 99)), 10);
        assert_eq!(index.offset(pos(42, 0)), text.len());
    }

    #[test]
    fn test_range_mapping() {
        let text = "type A = string;\ninterface Baz {}\n";
        let index = LineIndex::new(text);
        let start = text.find("Baz").unwrap();
        let range = index.range(TextRange::new(start, start + 3));
        assert_eq!(range.start, pos(1, 10));
        assert_eq!(range.end, pos(1, 13));
        assert_eq!(index.text_range(range), TextRange::new(start, start + 3));
    }

    #[test]
    fn test_offset_map_identity_for_edits_below() {
        let mut map = OffsetMap::new();
        // remove a declaration at 100..140; a target at 10..13 is untouched
        map.record(100, 40, 0);
        assert_eq!(map.map_range(TextRange::new(10, 13)), Some(TextRange::new(10, 13)));
    }

    #[test]
    fn test_offset_map_shifts_past_inserted_import() {
        let mut map = OffsetMap::new();
        map.record(120, 30, 0);
        map.record(0, 0, 25); // import added at the top
        assert_eq!(map.map_range(TextRange::new(40, 43)), Some(TextRange::new(65, 68)));
    }

    #[test]
    fn test_offset_map_rejects_consumed_ranges() {
        let mut map = OffsetMap::new();
        map.record(10, 20, 0);
        assert_eq!(map.map_range(TextRange::new(15, 18)), None);
        // a range ending exactly where the deletion starts survives
        assert_eq!(map.map_range(TextRange::new(5, 10)), Some(TextRange::new(5, 10)));
        // a range starting exactly where the deletion ends moves left
        assert_eq!(map.map_range(TextRange::new(30, 33)), Some(TextRange::new(10, 13)));
    }
}
