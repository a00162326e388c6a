//! Multi-line SQL editor with IME support.
//!
//! The text and selection live in a `TextBuffer`; this view adds IME
//! composition, clipboard, mouse selection, and rendering. It implements
//! `EntityInputHandler` so platform input methods work.

use std::ops::Range;

use gpui::{
    div, fill, point, prelude::*, px, relative, size, App, Bounds, ClipboardItem, Context,
    CursorStyle, Element, ElementId, ElementInputHandler, Entity, EntityInputHandler, EventEmitter,
    FocusHandle, Focusable, GlobalElementId, InteractiveElement, IntoElement, LayoutId,
    MouseButton, MouseDownEvent, MouseMoveEvent, MouseUpEvent, PaintQuad, ParentElement, Pixels,
    Point, Render, ShapedLine, SharedString, Style, Styled, TextRun, UTF16Selection,
    UnderlineStyle, Window,
};
use quarry_console::{EditorSurface, TextBuffer};

use crate::actions::{
    Backspace, Copy, Cut, Delete, End, Home, MoveDown, MoveLeft, MoveRight, MoveUp, Newline,
    Paste, SelectLeft, SelectRight, TextSelectAll,
};
use crate::theme::ThemeExt;

// =============================================================================
// Events
// =============================================================================

/// Events emitted by QueryEditor.
#[derive(Debug, Clone)]
pub enum QueryEditorEvent {
    /// Buffer contents changed.
    Changed,
}

// =============================================================================
// QueryEditor (Public API)
// =============================================================================

/// The query editor.
///
/// Public wrapper that forwards events from the inner `TextEditor`.
pub struct QueryEditor {
    editor: Entity<TextEditor>,
}

impl QueryEditor {
    pub fn new(
        placeholder: impl Into<SharedString>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let editor = cx.new(|cx| TextEditor::new(placeholder.into(), window, cx));

        cx.subscribe(&editor, |_this, _editor, event: &QueryEditorEvent, cx| {
            cx.emit(event.clone());
        })
        .detach();

        Self { editor }
    }

    pub fn focus_handle(&self, cx: &App) -> FocusHandle {
        self.editor.read(cx).focus_handle.clone()
    }

    /// Full buffer contents.
    pub fn text(&self, cx: &App) -> String {
        self.editor.read(cx).buffer.text()
    }

    /// Selected text, if any.
    pub fn selected_text(&self, cx: &App) -> Option<String> {
        self.editor.read(cx).buffer.selected_text()
    }

    pub fn is_empty(&self, cx: &App) -> bool {
        self.editor.read(cx).buffer.as_str().trim().is_empty()
    }

    /// Replace the whole buffer.
    pub fn set_text(&self, text: impl Into<String>, cx: &mut App) {
        let text = text.into();
        self.update_buffer(cx, |buffer| buffer.set_text(text));
    }

    pub fn clear(&self, cx: &mut App) {
        self.set_text("", cx);
    }

    /// Edit the buffer directly, e.g. through an `EditorSurface` consumer.
    pub fn update_buffer<R>(&self, cx: &mut App, f: impl FnOnce(&mut TextBuffer) -> R) -> R {
        self.editor.update(cx, |editor, cx| {
            let result = f(&mut editor.buffer);
            editor.marked_range = None;
            cx.emit(QueryEditorEvent::Changed);
            cx.notify();
            result
        })
    }
}

impl EventEmitter<QueryEditorEvent> for QueryEditor {}

impl Focusable for QueryEditor {
    fn focus_handle(&self, cx: &App) -> FocusHandle {
        self.editor.read(cx).focus_handle.clone()
    }
}

impl Render for QueryEditor {
    fn render(&mut self, _window: &mut Window, _cx: &mut Context<Self>) -> impl IntoElement {
        self.editor.clone()
    }
}

// =============================================================================
// TextEditor (Internal Implementation)
// =============================================================================

/// Internal editor implementation.
///
/// `marked_range` holds UTF-8 byte offsets of the IME composition.
struct TextEditor {
    buffer: TextBuffer,
    marked_range: Option<Range<usize>>,
    placeholder: SharedString,
    focus_handle: FocusHandle,
    /// Shaped lines from the last paint (for hit testing).
    last_lines: Vec<ShapedLine>,
    last_bounds: Option<Bounds<Pixels>>,
    last_line_height: Pixels,
    is_selecting: bool,
}

impl TextEditor {
    fn new(placeholder: SharedString, _window: &mut Window, cx: &mut Context<Self>) -> Self {
        Self {
            buffer: TextBuffer::new(),
            marked_range: None,
            placeholder,
            focus_handle: cx.focus_handle(),
            last_lines: Vec::new(),
            last_bounds: None,
            last_line_height: px(20.0),
            is_selecting: false,
        }
    }

    fn changed(&mut self, cx: &mut Context<Self>) {
        cx.emit(QueryEditorEvent::Changed);
        cx.notify();
    }

    // -------------------------------------------------------------------------
    // UTF-16 Conversion (for platform IME APIs)
    // -------------------------------------------------------------------------

    fn offset_to_utf16(&self, utf8_offset: usize) -> usize {
        let text = self.buffer.as_str();
        text[..utf8_offset.min(text.len())].encode_utf16().count()
    }

    fn offset_from_utf16(&self, utf16_offset: usize) -> usize {
        let mut utf8_offset = 0;
        let mut utf16_count = 0;

        for ch in self.buffer.as_str().chars() {
            if utf16_count >= utf16_offset {
                break;
            }
            utf16_count += ch.len_utf16();
            utf8_offset += ch.len_utf8();
        }

        utf8_offset
    }

    fn range_to_utf16(&self, range: &Range<usize>) -> Range<usize> {
        self.offset_to_utf16(range.start)..self.offset_to_utf16(range.end)
    }

    fn range_from_utf16(&self, range: &Range<usize>) -> Range<usize> {
        self.offset_from_utf16(range.start)..self.offset_from_utf16(range.end)
    }

    // -------------------------------------------------------------------------
    // Hit Testing
    // -------------------------------------------------------------------------

    fn line_at_y(&self, y: Pixels) -> Option<usize> {
        let bounds = self.last_bounds.as_ref()?;
        let line_height: f32 = self.last_line_height.into();
        let local: f32 = (y - bounds.top()).into();
        if local < 0.0 || line_height <= 0.0 {
            return Some(0);
        }
        Some((local / line_height).floor() as usize)
    }

    fn index_for_mouse_position(&self, position: Point<Pixels>) -> usize {
        if self.buffer.is_empty() {
            return 0;
        }
        let (Some(bounds), Some(line)) = (self.last_bounds.as_ref(), self.line_at_y(position.y))
        else {
            return 0;
        };

        if line >= self.buffer.line_count() {
            return self.buffer.len();
        }
        let range = self.buffer.line_range(line);
        let column = self
            .last_lines
            .get(line)
            .map(|shaped| shaped.closest_index_for_x(position.x - bounds.left()))
            .unwrap_or(0);
        range.start + column.min(range.len())
    }

    /// Position of a UTF-8 offset relative to the element origin.
    fn position_for_offset(&self, offset: usize) -> Option<Point<Pixels>> {
        let (line, column) = self.buffer.line_col(offset);
        let shaped = self.last_lines.get(line)?;
        Some(point(
            shaped.x_for_index(column),
            self.last_line_height * line as f32,
        ))
    }

    // -------------------------------------------------------------------------
    // Action Handlers
    // -------------------------------------------------------------------------

    fn backspace(&mut self, _: &Backspace, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.backspace();
        self.marked_range = None;
        self.changed(cx);
    }

    fn delete(&mut self, _: &Delete, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.delete();
        self.marked_range = None;
        self.changed(cx);
    }

    fn newline(&mut self, _: &Newline, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.insert("\n");
        self.marked_range = None;
        self.changed(cx);
    }

    fn left(&mut self, _: &MoveLeft, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.move_left();
        cx.notify();
    }

    fn right(&mut self, _: &MoveRight, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.move_right();
        cx.notify();
    }

    fn up(&mut self, _: &MoveUp, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.move_up();
        cx.notify();
    }

    fn down(&mut self, _: &MoveDown, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.move_down();
        cx.notify();
    }

    fn select_left(&mut self, _: &SelectLeft, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer
            .select_to(self.buffer.previous_boundary(self.buffer.cursor_offset()));
        cx.notify();
    }

    fn select_right(&mut self, _: &SelectRight, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer
            .select_to(self.buffer.next_boundary(self.buffer.cursor_offset()));
        cx.notify();
    }

    fn select_all(&mut self, _: &TextSelectAll, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.select_all();
        cx.notify();
    }

    fn home(&mut self, _: &Home, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.home();
        cx.notify();
    }

    fn end(&mut self, _: &End, _window: &mut Window, cx: &mut Context<Self>) {
        self.buffer.end();
        cx.notify();
    }

    fn copy(&mut self, _: &Copy, _window: &mut Window, cx: &mut Context<Self>) {
        if let Some(selected) = self.buffer.selected_text() {
            cx.write_to_clipboard(ClipboardItem::new_string(selected));
        }
    }

    fn paste(&mut self, _: &Paste, _window: &mut Window, cx: &mut Context<Self>) {
        if let Some(text) = cx.read_from_clipboard().and_then(|item| item.text()) {
            self.buffer.insert(&text.replace("\r\n", "\n"));
            self.marked_range = None;
            self.changed(cx);
        }
    }

    fn cut(&mut self, _: &Cut, _window: &mut Window, cx: &mut Context<Self>) {
        if let Some(selected) = self.buffer.selected_text() {
            cx.write_to_clipboard(ClipboardItem::new_string(selected));
            self.buffer.insert("");
            self.changed(cx);
        }
    }

    // -------------------------------------------------------------------------
    // Mouse Handlers
    // -------------------------------------------------------------------------

    fn on_mouse_down(
        &mut self,
        event: &MouseDownEvent,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        window.focus(&self.focus_handle);
        self.is_selecting = true;

        let offset = self.index_for_mouse_position(event.position);
        if event.modifiers.shift {
            self.buffer.select_to(offset);
        } else {
            self.buffer.move_to(offset);
        }
        cx.notify();
    }

    fn on_mouse_up(&mut self, _: &MouseUpEvent, _window: &mut Window, _cx: &mut Context<Self>) {
        self.is_selecting = false;
    }

    fn on_mouse_move(
        &mut self,
        event: &MouseMoveEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.is_selecting {
            self.buffer
                .select_to(self.index_for_mouse_position(event.position));
            cx.notify();
        }
    }
}

impl EventEmitter<QueryEditorEvent> for TextEditor {}

impl Focusable for TextEditor {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

// =============================================================================
// EntityInputHandler Implementation (IME Support)
// =============================================================================

impl EntityInputHandler for TextEditor {
    fn text_for_range(
        &mut self,
        range_utf16: Range<usize>,
        actual_range: &mut Option<Range<usize>>,
        _window: &mut Window,
        _cx: &mut Context<Self>,
    ) -> Option<String> {
        let range = self.range_from_utf16(&range_utf16);
        actual_range.replace(self.range_to_utf16(&range));
        self.buffer.as_str().get(range).map(str::to_string)
    }

    fn selected_text_range(
        &mut self,
        _ignore_disabled_input: bool,
        _window: &mut Window,
        _cx: &mut Context<Self>,
    ) -> Option<UTF16Selection> {
        Some(UTF16Selection {
            range: self.range_to_utf16(&self.buffer.selected_range()),
            reversed: self.buffer.selection_reversed(),
        })
    }

    fn marked_text_range(
        &self,
        _window: &mut Window,
        _cx: &mut Context<Self>,
    ) -> Option<Range<usize>> {
        self.marked_range.as_ref().map(|r| self.range_to_utf16(r))
    }

    fn unmark_text(&mut self, _window: &mut Window, _cx: &mut Context<Self>) {
        self.marked_range = None;
    }

    fn replace_text_in_range(
        &mut self,
        range_utf16: Option<Range<usize>>,
        new_text: &str,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let range = range_utf16
            .as_ref()
            .map(|r| self.range_from_utf16(r))
            .or(self.marked_range.clone())
            .unwrap_or(self.buffer.selected_range());

        self.buffer.replace_range(range, new_text);
        self.marked_range = None;
        self.changed(cx);
    }

    fn replace_and_mark_text_in_range(
        &mut self,
        range_utf16: Option<Range<usize>>,
        new_text: &str,
        new_selected_range_utf16: Option<Range<usize>>,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let range = range_utf16
            .as_ref()
            .map(|r| self.range_from_utf16(r))
            .or(self.marked_range.clone())
            .unwrap_or(self.buffer.selected_range());

        self.buffer.replace_range(range.clone(), new_text);

        self.marked_range = if new_text.is_empty() {
            None
        } else {
            Some(range.start..range.start + new_text.len())
        };

        // The new selection is relative to the inserted text.
        if let Some(selected) = new_selected_range_utf16 {
            let to_utf8 = |utf16: usize| {
                let mut count = 0;
                let mut bytes = 0;
                for ch in new_text.chars() {
                    if count >= utf16 {
                        break;
                    }
                    count += ch.len_utf16();
                    bytes += ch.len_utf8();
                }
                bytes
            };
            self.buffer.set_selection(
                range.start + to_utf8(selected.start)..range.start + to_utf8(selected.end),
                false,
            );
        }

        self.changed(cx);
    }

    fn bounds_for_range(
        &mut self,
        range_utf16: Range<usize>,
        element_bounds: Bounds<Pixels>,
        _window: &mut Window,
        _cx: &mut Context<Self>,
    ) -> Option<Bounds<Pixels>> {
        let range = self.range_from_utf16(&range_utf16);
        let start = self.position_for_offset(range.start)?;
        let end = self.position_for_offset(range.end)?;

        Some(Bounds::from_corners(
            point(element_bounds.left() + start.x, element_bounds.top() + start.y),
            point(
                element_bounds.left() + end.x,
                element_bounds.top() + end.y + self.last_line_height,
            ),
        ))
    }

    fn character_index_for_point(
        &mut self,
        point: Point<Pixels>,
        _window: &mut Window,
        _cx: &mut Context<Self>,
    ) -> Option<usize> {
        let bounds = self.last_bounds.as_ref()?;
        let line = self.line_at_y(point.y)?;
        let shaped = self.last_lines.get(line)?;
        let column = shaped.index_for_x(point.x - bounds.left())?;
        let offset = self.buffer.line_range(line).start + column;
        Some(self.offset_to_utf16(offset))
    }
}

// =============================================================================
// Render Implementation
// =============================================================================

impl Render for TextEditor {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let is_focused = self.focus_handle.is_focused(window);

        div()
            .id("query-editor")
            .key_context("QueryEditor")
            .track_focus(&self.focus_handle)
            .cursor(CursorStyle::IBeam)
            // Action handlers
            .on_action(cx.listener(Self::backspace))
            .on_action(cx.listener(Self::delete))
            .on_action(cx.listener(Self::newline))
            .on_action(cx.listener(Self::left))
            .on_action(cx.listener(Self::right))
            .on_action(cx.listener(Self::up))
            .on_action(cx.listener(Self::down))
            .on_action(cx.listener(Self::select_left))
            .on_action(cx.listener(Self::select_right))
            .on_action(cx.listener(Self::select_all))
            .on_action(cx.listener(Self::home))
            .on_action(cx.listener(Self::end))
            .on_action(cx.listener(Self::copy))
            .on_action(cx.listener(Self::paste))
            .on_action(cx.listener(Self::cut))
            // Console actions bubble up to the panel.
            .on_mouse_down(MouseButton::Left, cx.listener(Self::on_mouse_down))
            .on_mouse_up(MouseButton::Left, cx.listener(Self::on_mouse_up))
            .on_mouse_up_out(MouseButton::Left, cx.listener(Self::on_mouse_up))
            .on_mouse_move(cx.listener(Self::on_mouse_move))
            // Styling
            .size_full()
            .px_3()
            .py_2()
            .overflow_y_scroll()
            .bg(theme.surface)
            .rounded(theme.radius)
            .border_1()
            .border_color(theme.border)
            .when(is_focused, |this| this.border_color(theme.border_focused))
            .font_family(theme.mono_font_family.clone())
            .child(EditorElement {
                editor: cx.entity().clone(),
            })
    }
}

// =============================================================================
// Custom Text Element (for handle_input and rendering)
// =============================================================================

/// Renders the lines with cursor and selection and registers the input handler.
struct EditorElement {
    editor: Entity<TextEditor>,
}

struct EditorPrepaintState {
    lines: Vec<ShapedLine>,
    line_height: Pixels,
    cursor: Option<PaintQuad>,
    selections: Vec<PaintQuad>,
}

impl IntoElement for EditorElement {
    type Element = Self;

    fn into_element(self) -> Self::Element {
        self
    }
}

/// Text runs for one line, underlining the part inside `marked`.
fn line_runs(line: &Range<usize>, marked: Option<&Range<usize>>, base: TextRun) -> Vec<TextRun> {
    let Some(marked) = marked else {
        return vec![base];
    };
    let start = marked.start.clamp(line.start, line.end) - line.start;
    let end = marked.end.clamp(line.start, line.end) - line.start;
    if start == end {
        return vec![base];
    }

    let underline = Some(UnderlineStyle {
        color: Some(base.color),
        thickness: px(1.0),
        wavy: false,
    });
    vec![
        TextRun {
            len: start,
            ..base.clone()
        },
        TextRun {
            len: end - start,
            underline,
            ..base.clone()
        },
        TextRun {
            len: line.len() - end,
            ..base
        },
    ]
    .into_iter()
    .filter(|run| run.len > 0)
    .collect()
}

impl Element for EditorElement {
    type RequestLayoutState = ();
    type PrepaintState = EditorPrepaintState;

    fn id(&self) -> Option<ElementId> {
        None
    }

    fn source_location(&self) -> Option<&'static core::panic::Location<'static>> {
        None
    }

    fn request_layout(
        &mut self,
        _id: Option<&GlobalElementId>,
        _inspector_id: Option<&gpui::InspectorElementId>,
        window: &mut Window,
        cx: &mut App,
    ) -> (LayoutId, Self::RequestLayoutState) {
        let line_count = self.editor.read(cx).buffer.line_count().max(1);
        let mut style = Style::default();
        style.size.width = relative(1.).into();
        style.size.height = (window.line_height() * line_count as f32).into();
        (window.request_layout(style, [], cx), ())
    }

    fn prepaint(
        &mut self,
        _id: Option<&GlobalElementId>,
        _inspector_id: Option<&gpui::InspectorElementId>,
        bounds: Bounds<Pixels>,
        _request_layout: &mut Self::RequestLayoutState,
        window: &mut Window,
        cx: &mut App,
    ) -> Self::PrepaintState {
        let editor = self.editor.read(cx);
        let theme = cx.theme();
        let buffer = &editor.buffer;

        let is_focused = editor.focus_handle.is_focused(window);
        let style = window.text_style();
        let font_size = style.font_size.to_pixels(window.rem_size());
        let line_height = window.line_height();

        let ranges = buffer.line_ranges();
        let mut lines = Vec::with_capacity(ranges.len());

        if buffer.is_empty() {
            let run = TextRun {
                len: editor.placeholder.len(),
                font: style.font(),
                color: theme.text_placeholder,
                background_color: None,
                underline: None,
                strikethrough: None,
            };
            lines.push(window.text_system().shape_line(
                editor.placeholder.clone(),
                font_size,
                &[run],
                None,
            ));
        } else {
            for range in &ranges {
                let text = SharedString::from(buffer.as_str()[range.clone()].to_string());
                let base = TextRun {
                    len: text.len(),
                    font: style.font(),
                    color: theme.text,
                    background_color: None,
                    underline: None,
                    strikethrough: None,
                };
                let runs = line_runs(range, editor.marked_range.as_ref(), base);
                lines.push(window.text_system().shape_line(text, font_size, &runs, None));
            }
        }

        // Selection, one quad per covered line
        let selected = buffer.selected_range();
        let mut selections = Vec::new();
        if !selected.is_empty() {
            for (index, range) in ranges.iter().enumerate() {
                if selected.end < range.start || selected.start > range.end {
                    continue;
                }
                let Some(shaped) = lines.get(index) else {
                    continue;
                };
                let start = selected.start.max(range.start) - range.start;
                let end = selected.end.min(range.end) - range.start;
                let mut right = shaped.x_for_index(end);
                if selected.end > range.end {
                    // Covers the newline
                    right += px(6.0);
                }
                let top = bounds.top() + line_height * index as f32;
                selections.push(fill(
                    Bounds::from_corners(
                        point(bounds.left() + shaped.x_for_index(start), top),
                        point(bounds.left() + right, top + line_height),
                    ),
                    theme.selection,
                ));
            }
        }

        // Cursor
        let cursor = if is_focused && selected.is_empty() {
            let (line, column) = buffer.line_col(buffer.cursor_offset());
            let x = if buffer.is_empty() {
                px(0.0)
            } else {
                lines
                    .get(line)
                    .map(|shaped| shaped.x_for_index(column))
                    .unwrap_or(px(0.0))
            };
            Some(fill(
                Bounds::new(
                    point(bounds.left() + x, bounds.top() + line_height * line as f32),
                    size(px(2.), line_height),
                ),
                theme.accent,
            ))
        } else {
            None
        };

        EditorPrepaintState {
            lines,
            line_height,
            cursor,
            selections,
        }
    }

    fn paint(
        &mut self,
        _id: Option<&GlobalElementId>,
        _inspector_id: Option<&gpui::InspectorElementId>,
        bounds: Bounds<Pixels>,
        _request_layout: &mut Self::RequestLayoutState,
        prepaint: &mut Self::PrepaintState,
        window: &mut Window,
        cx: &mut App,
    ) {
        let focus_handle = self.editor.read(cx).focus_handle.clone();
        window.handle_input(
            &focus_handle,
            ElementInputHandler::new(bounds, self.editor.clone()),
            cx,
        );

        for selection in prepaint.selections.drain(..) {
            window.paint_quad(selection);
        }

        let line_height = prepaint.line_height;
        for (index, line) in prepaint.lines.iter().enumerate() {
            let origin = point(bounds.left(), bounds.top() + line_height * index as f32);
            let _ = line.paint(origin, line_height, window, cx);
        }

        if let Some(cursor) = prepaint.cursor.take() {
            window.paint_quad(cursor);
        }

        // Cache layout for hit testing; an empty buffer has no real lines.
        let is_empty = self.editor.read(cx).buffer.is_empty();
        let lines = if is_empty {
            Vec::new()
        } else {
            std::mem::take(&mut prepaint.lines)
        };
        self.editor.update(cx, |editor, _cx| {
            editor.last_lines = lines;
            editor.last_bounds = Some(bounds);
            editor.last_line_height = line_height;
        });
    }
}
