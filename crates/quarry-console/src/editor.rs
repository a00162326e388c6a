//! Editor boundary.
//!
//! The console never edits text itself beyond whole-buffer replacement and
//! appends. `EditorSurface` is what it reads from and writes to; `TextBuffer`
//! is the concrete buffer the query editor view renders.

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

/// The text-editing surface the console reads queries from.
#[cfg_attr(test, mockall::automock)]
pub trait EditorSurface {
    /// Full buffer contents.
    fn text(&self) -> String;

    /// Currently selected text, if the selection is non-empty.
    fn selected_text(&self) -> Option<String>;

    /// Replace the whole buffer.
    fn set_text(&mut self, text: String);
}

/// Text the run action should execute.
///
/// The selection wins when it contains anything but whitespace; otherwise the
/// whole buffer. `None` when both are blank.
pub fn effective_query<'a>(buffer: &'a str, selection: Option<&'a str>) -> Option<&'a str> {
    match selection {
        Some(selected) if !selected.trim().is_empty() => Some(selected),
        _ if !buffer.trim().is_empty() => Some(buffer),
        _ => None,
    }
}

// =============================================================================
// Text Buffer
// =============================================================================

/// Multi-line text with a selection.
///
/// All offsets are UTF-8 byte offsets on grapheme boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    /// Start == end means a cursor with no selection.
    selected_range: Range<usize>,
    /// Selection was made right-to-left (cursor at start).
    selection_reversed: bool,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `text` with the cursor at the end.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut buffer = Self::new();
        buffer.replace_all(text);
        buffer
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn selected_range(&self) -> Range<usize> {
        self.selected_range.clone()
    }

    pub fn selection_reversed(&self) -> bool {
        self.selection_reversed
    }

    /// Selected slice; empty when there is only a cursor.
    pub fn selection(&self) -> &str {
        &self.text[self.selected_range.clone()]
    }

    /// The "active" end of the selection.
    pub fn cursor_offset(&self) -> usize {
        if self.selection_reversed {
            self.selected_range.start
        } else {
            self.selected_range.end
        }
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Replace everything and put the cursor at the end.
    pub fn replace_all(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.selected_range = self.text.len()..self.text.len();
        self.selection_reversed = false;
    }

    /// Append on a new line when the buffer has content, else set it.
    pub fn append_line(&mut self, fragment: &str) {
        if self.text.is_empty() {
            self.replace_all(fragment);
        } else {
            let text = format!("{}\n{}", self.text, fragment);
            self.replace_all(text);
        }
    }

    /// Replace `range` with `new_text`, leaving the cursor after the insertion.
    pub fn replace_range(&mut self, range: Range<usize>, new_text: &str) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        self.text.replace_range(start..end, new_text);
        let cursor = start + new_text.len();
        self.selected_range = cursor..cursor;
        self.selection_reversed = false;
    }

    /// Replace the selection (or insert at the cursor).
    pub fn insert(&mut self, new_text: &str) {
        self.replace_range(self.selected_range.clone(), new_text);
    }

    /// Delete the selection, or the grapheme before the cursor.
    pub fn backspace(&mut self) {
        if self.selected_range.is_empty() {
            self.select_to(self.previous_boundary(self.cursor_offset()));
        }
        self.insert("");
    }

    /// Delete the selection, or the grapheme after the cursor.
    pub fn delete(&mut self) {
        if self.selected_range.is_empty() {
            self.select_to(self.next_boundary(self.cursor_offset()));
        }
        self.insert("");
    }

    // -------------------------------------------------------------------------
    // Cursor / Selection
    // -------------------------------------------------------------------------

    /// Move the cursor, collapsing the selection.
    pub fn move_to(&mut self, offset: usize) {
        let offset = self.clamp(offset);
        self.selected_range = offset..offset;
        self.selection_reversed = false;
    }

    /// Extend the selection to `offset`.
    pub fn select_to(&mut self, offset: usize) {
        let offset = self.clamp(offset);
        if self.selection_reversed {
            self.selected_range.start = offset;
        } else {
            self.selected_range.end = offset;
        }

        if self.selected_range.end < self.selected_range.start {
            self.selection_reversed = !self.selection_reversed;
            self.selected_range = self.selected_range.end..self.selected_range.start;
        }
    }

    pub fn select_all(&mut self) {
        self.selected_range = 0..self.text.len();
        self.selection_reversed = false;
    }

    /// Set the selection from UTF-8 offsets.
    pub fn set_selection(&mut self, range: Range<usize>, reversed: bool) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        self.selected_range = start..end;
        self.selection_reversed = reversed;
    }

    pub fn move_left(&mut self) {
        if self.selected_range.is_empty() {
            self.move_to(self.previous_boundary(self.cursor_offset()));
        } else {
            self.move_to(self.selected_range.start);
        }
    }

    pub fn move_right(&mut self) {
        if self.selected_range.is_empty() {
            self.move_to(self.next_boundary(self.cursor_offset()));
        } else {
            self.move_to(self.selected_range.end);
        }
    }

    pub fn move_up(&mut self) {
        self.move_to(self.vertical_offset(self.cursor_offset(), -1));
    }

    pub fn move_down(&mut self) {
        self.move_to(self.vertical_offset(self.cursor_offset(), 1));
    }

    /// Move to the start of the cursor's line.
    pub fn home(&mut self) {
        let (line, _) = self.line_col(self.cursor_offset());
        self.move_to(self.line_range(line).start);
    }

    /// Move to the end of the cursor's line.
    pub fn end(&mut self) {
        let (line, _) = self.line_col(self.cursor_offset());
        self.move_to(self.line_range(line).end);
    }

    // -------------------------------------------------------------------------
    // Grapheme Navigation
    // -------------------------------------------------------------------------

    /// Previous grapheme boundary before offset.
    pub fn previous_boundary(&self, offset: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .rev()
            .find_map(|(idx, _)| (idx < offset).then_some(idx))
            .unwrap_or(0)
    }

    /// Next grapheme boundary after offset.
    pub fn next_boundary(&self, offset: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .find_map(|(idx, _)| (idx > offset).then_some(idx))
            .unwrap_or(self.text.len())
    }

    // -------------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------------

    /// Byte ranges of each line, excluding the newline.
    pub fn line_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for (idx, ch) in self.text.char_indices() {
            if ch == '\n' {
                ranges.push(start..idx);
                start = idx + 1;
            }
        }
        ranges.push(start..self.text.len());
        ranges
    }

    pub fn line_count(&self) -> usize {
        self.text.matches('\n').count() + 1
    }

    /// Byte range of line `line`; clamps to the last line.
    pub fn line_range(&self, line: usize) -> Range<usize> {
        let ranges = self.line_ranges();
        let last = ranges.len() - 1;
        ranges[line.min(last)].clone()
    }

    /// Line index and byte column of `offset`.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = self.clamp(offset);
        let before = &self.text[..offset];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        (line, offset - line_start)
    }

    /// Offset for a line and byte column, snapped to a grapheme boundary.
    pub fn offset_for(&self, line: usize, column: usize) -> usize {
        let range = self.line_range(line);
        let target = (range.start + column).min(range.end);
        if target == range.end {
            return range.end;
        }
        self.text[range.clone()]
            .grapheme_indices(true)
            .map(|(idx, _)| range.start + idx)
            .take_while(|&idx| idx <= target)
            .last()
            .unwrap_or(range.start)
    }

    fn vertical_offset(&self, offset: usize, delta: isize) -> usize {
        let (line, column) = self.line_col(offset);
        let target = line as isize + delta;
        if target < 0 {
            return 0;
        }
        if target as usize >= self.line_count() {
            return self.text.len();
        }
        self.offset_for(target as usize, column)
    }

    fn clamp(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}

impl EditorSurface for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn selected_text(&self) -> Option<String> {
        let selected = self.selection();
        (!selected.is_empty()).then(|| selected.to_string())
    }

    fn set_text(&mut self, text: String) {
        self.replace_all(text);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_query_prefers_selection() {
        assert_eq!(
            effective_query("SELECT 1;\nSELECT 2;", Some("SELECT 2;")),
            Some("SELECT 2;")
        );
    }

    #[test]
    fn test_effective_query_ignores_blank_selection() {
        assert_eq!(effective_query("SELECT 1", Some("  \n")), Some("SELECT 1"));
        assert_eq!(effective_query("SELECT 1", None), Some("SELECT 1"));
    }

    #[test]
    fn test_effective_query_blank() {
        assert_eq!(effective_query(" \t", None), None);
        assert_eq!(effective_query("", Some(" ")), None);
    }

    #[test]
    fn test_append_line() {
        let mut buffer = TextBuffer::new();
        buffer.append_line("read_csv('a.csv')");
        assert_eq!(buffer.as_str(), "read_csv('a.csv')");

        let mut buffer = TextBuffer::with_text("SELECT * FROM x");
        buffer.append_line("read_csv('data.csv')");
        assert_eq!(buffer.as_str(), "SELECT * FROM x\nread_csv('data.csv')");
        assert_eq!(buffer.cursor_offset(), buffer.len());
    }

    #[test]
    fn test_insert_and_backspace() {
        let mut buffer = TextBuffer::with_text("SELEC");
        buffer.insert("T");
        assert_eq!(buffer.as_str(), "SELECT");

        buffer.backspace();
        assert_eq!(buffer.as_str(), "SELEC");

        buffer.move_to(0);
        buffer.delete();
        assert_eq!(buffer.as_str(), "ELEC");
    }

    #[test]
    fn test_backspace_removes_whole_grapheme() {
        let mut buffer = TextBuffer::with_text("a\u{1F600}");
        buffer.backspace();
        assert_eq!(buffer.as_str(), "a");
    }

    #[test]
    fn test_selection_flips_when_crossing() {
        let mut buffer = TextBuffer::with_text("abcdef");
        buffer.move_to(3);
        buffer.select_to(5);
        assert_eq!(buffer.selection(), "de");

        buffer.select_to(1);
        assert_eq!(buffer.selected_range(), 1..3);
        assert!(buffer.selection_reversed());
        assert_eq!(buffer.cursor_offset(), 1);
    }

    #[test]
    fn test_selected_text_surface() {
        let mut buffer = TextBuffer::with_text("SELECT 1");
        assert_eq!(buffer.selected_text(), None);

        buffer.select_all();
        assert_eq!(buffer.selected_text().as_deref(), Some("SELECT 1"));

        buffer.set_text("SELECT 2".to_string());
        assert_eq!(buffer.text(), "SELECT 2");
        assert_eq!(buffer.selected_text(), None);
    }

    #[test]
    fn test_lines() {
        let buffer = TextBuffer::with_text("SELECT *\nFROM t\n");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.line_ranges(), vec![0..8, 9..15, 16..16]);
        assert_eq!(buffer.line_col(11), (1, 2));
    }

    #[test]
    fn test_vertical_movement_keeps_column() {
        let mut buffer = TextBuffer::with_text("SELECT *\nFROM t");
        buffer.move_to(3);
        buffer.move_down();
        assert_eq!(buffer.cursor_offset(), 12);

        buffer.move_up();
        assert_eq!(buffer.cursor_offset(), 3);

        buffer.move_up();
        assert_eq!(buffer.cursor_offset(), 0);
    }

    #[test]
    fn test_vertical_movement_clamps_to_short_line() {
        let mut buffer = TextBuffer::with_text("SELECT *\nx");
        buffer.move_to(7);
        buffer.move_down();
        assert_eq!(buffer.cursor_offset(), buffer.len());
    }

    #[test]
    fn test_home_end() {
        let mut buffer = TextBuffer::with_text("SELECT *\nFROM t");
        buffer.move_to(11);
        buffer.home();
        assert_eq!(buffer.cursor_offset(), 9);
        buffer.end();
        assert_eq!(buffer.cursor_offset(), 15);
    }

    #[test]
    fn test_mock_surface() {
        let mut surface = MockEditorSurface::new();
        surface
            .expect_selected_text()
            .return_const(Some("SELECT 2".to_string()));
        surface.expect_text().return_const("SELECT 1".to_string());

        let buffer = surface.text();
        let selection = surface.selected_text();
        assert_eq!(
            effective_query(&buffer, selection.as_deref()),
            Some("SELECT 2")
        );
    }
}
