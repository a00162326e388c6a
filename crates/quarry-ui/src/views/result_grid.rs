//! Result grid view.
//!
//! Renders the rows of a `ResultStore` through a `GridModel`: only the rows in
//! the visible window (plus overscan) become elements, and spacer divs stand
//! in for the rest so the scrollbar reflects the full result. Pages are
//! requested from the engine as the window nears the loaded end.

use std::sync::Arc;

use gpui::{
    canvas, deferred, div, point, prelude::*, px, AnyElement, App, AsyncApp, ClickEvent, Context,
    ElementId, FocusHandle, Focusable, InteractiveElement, IntoElement, MouseButton,
    MouseDownEvent, MouseMoveEvent, MouseUpEvent, ParentElement, Pixels, Render, ScrollHandle,
    ScrollWheelEvent, SharedString, Size, Styled, WeakEntity, Window,
};
use quarry_console::{GridModel, GridView, LoadMoreOutcome, RenderedColumns, ResultStore, RowDetail};
use quarry_core::{GridConfig, QueryEngine};

use crate::actions::{CloseDetail, LoadMore};
use crate::theme::{Theme, ThemeExt};

/// Width of the drag target on a header cell's trailing edge.
const RESIZE_HANDLE_WIDTH: f32 = 6.0;

const LOADING_MESSAGE: &str = "Running query...";

// =============================================================================
// Result Grid
// =============================================================================

/// The result surface: grid, load-more row, and row detail overlay.
pub struct ResultGrid {
    store: ResultStore,
    model: GridModel,
    engine: Arc<dyn QueryEngine>,
    /// A first-page request is outstanding.
    loading: bool,
    focus_handle: FocusHandle,
    scroll_handle: ScrollHandle,
    /// Body size from the last layout pass.
    viewport: Option<Size<Pixels>>,
}

impl ResultGrid {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        page_size: usize,
        config: GridConfig,
        cx: &mut Context<Self>,
    ) -> Self {
        Self {
            store: ResultStore::new(page_size),
            model: GridModel::new(config),
            engine,
            loading: false,
            focus_handle: cx.focus_handle(),
            scroll_handle: ScrollHandle::new(),
            viewport: None,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Mutable store access for the run lifecycle.
    pub fn store_mut(&mut self) -> &mut ResultStore {
        &mut self.store
    }

    pub fn set_loading(&mut self, loading: bool, cx: &mut Context<Self>) {
        self.loading = loading;
        self.refresh(cx);
    }

    /// Pick up store changes. Replaced rows scroll back to the top.
    ///
    /// Every store mutation goes through here; rendering only reads the model.
    pub fn refresh(&mut self, cx: &mut Context<Self>) {
        if self.model.sync(&self.store) {
            self.scroll_handle.set_offset(point(px(0.0), px(0.0)));
        }
        self.load_more_if_near_end(cx);
        cx.notify();
    }

    // -------------------------------------------------------------------------
    // Pagination
    // -------------------------------------------------------------------------

    /// Request the next page if the store allows it.
    pub fn load_more(&mut self, cx: &mut Context<Self>) {
        let ticket = match self.store.begin_load_more() {
            Ok(ticket) => ticket,
            Err(skip) => {
                tracing::debug!(?skip, "Load more skipped");
                return;
            }
        };

        let fetch = self.engine.fetch_more(ticket.request().clone());
        cx.notify();

        cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
            let outcome = fetch.await;
            let _ = this.update(cx, |this, cx| {
                match this.store.finish_load_more(ticket, outcome) {
                    LoadMoreOutcome::Appended { rows } => {
                        tracing::debug!(rows, total = this.store.row_count(), "Rows appended");
                    }
                    LoadMoreOutcome::Failed(error) => {
                        tracing::warn!("Load more failed: {}", error);
                    }
                    LoadMoreOutcome::Stale | LoadMoreOutcome::Skipped(_) => {}
                }
                this.refresh(cx);
            });
        })
        .detach();
    }

    /// Page in more rows once the visible window nears the loaded end.
    fn load_more_if_near_end(&mut self, cx: &mut Context<Self>) {
        if !self.loading && self.model.wants_more(&self.store) {
            self.load_more(cx);
        }
    }

    fn on_load_more(&mut self, _: &LoadMore, _window: &mut Window, cx: &mut Context<Self>) {
        self.load_more(cx);
    }

    // -------------------------------------------------------------------------
    // Row Detail
    // -------------------------------------------------------------------------

    fn open_detail(&mut self, row: usize, cx: &mut Context<Self>) {
        if self.model.open_detail(row) {
            cx.notify();
        }
    }

    /// Close the detail overlay. Returns false when none was open.
    pub fn close_detail(&mut self, cx: &mut Context<Self>) -> bool {
        if self.model.detail_row().is_none() {
            return false;
        }
        self.model.close_detail();
        cx.notify();
        true
    }

    fn on_close_detail(&mut self, _: &CloseDetail, _window: &mut Window, cx: &mut Context<Self>) {
        if !self.close_detail(cx) {
            cx.propagate();
        }
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    fn observe_viewport(&mut self, size: Size<Pixels>, cx: &mut Context<Self>) {
        if self.viewport == Some(size) {
            return;
        }
        self.viewport = Some(size);
        self.model.on_resize(size.width.into(), size.height.into());
        self.load_more_if_near_end(cx);
        cx.notify();
    }

    /// Feed the body's scroll offset to the model after a wheel event.
    fn sync_scroll(&mut self, cx: &mut Context<Self>) {
        let scroll_top: f32 = (-self.scroll_handle.offset().y).into();
        if self.model.on_scroll(scroll_top) {
            self.load_more_if_near_end(cx);
        }
        // The header follows the horizontal offset.
        cx.notify();
    }

    fn on_resize_start(&mut self, column: usize, event: &MouseDownEvent, cx: &mut Context<Self>) {
        if self
            .model
            .layout_mut()
            .begin_drag(column, event.position.x.into())
        {
            cx.stop_propagation();
            cx.notify();
        }
    }

    fn on_mouse_move(&mut self, event: &MouseMoveEvent, _window: &mut Window, cx: &mut Context<Self>) {
        if self.model.layout().dragging().is_some()
            && self.model.layout_mut().drag_to(event.position.x.into())
        {
            cx.notify();
        }
    }

    fn on_mouse_up(&mut self, _: &MouseUpEvent, _window: &mut Window, cx: &mut Context<Self>) {
        if self.model.layout().dragging().is_some() {
            self.model.layout_mut().end_drag();
            cx.notify();
        }
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    fn render_header(
        &self,
        widths: &RenderedColumns,
        scroll_x: Pixels,
        theme: &Theme,
        cx: &mut Context<Self>,
    ) -> impl IntoElement {
        let mut cells = div()
            .flex()
            .flex_none()
            .relative()
            .left(scroll_x)
            .w(px(widths.total))
            .h(theme.header_height)
            .child(
                div()
                    .w(px(widths.index))
                    .flex_none()
                    .px_2()
                    .flex()
                    .items_center()
                    .text_color(theme.text_muted)
                    .child("#"),
            );

        for (index, (name, column)) in self
            .store
            .header()
            .iter()
            .zip(widths.columns.iter())
            .enumerate()
        {
            let is_dragging = self.model.layout().dragging() == Some(index);
            cells = cells.child(
                div()
                    .w(px(column.width))
                    .flex_none()
                    .h_full()
                    .relative()
                    .flex()
                    .items_center()
                    .px_2()
                    .border_l_1()
                    .border_color(theme.grid_line)
                    .overflow_hidden()
                    .child(
                        div()
                            .text_ellipsis()
                            .overflow_hidden()
                            .font_weight(gpui::FontWeight::SEMIBOLD)
                            .child(SharedString::from(name.clone())),
                    )
                    .child(
                        div()
                            .id(ElementId::Name(SharedString::from(format!(
                                "resize-{}",
                                index
                            ))))
                            .absolute()
                            .top_0()
                            .right_0()
                            .h_full()
                            .w(px(RESIZE_HANDLE_WIDTH))
                            .cursor_col_resize()
                            .when(is_dragging, |this| this.bg(theme.accent))
                            .hover(|style| style.bg(theme.border_focused))
                            .on_mouse_down(
                                MouseButton::Left,
                                cx.listener(move |this, event: &MouseDownEvent, _window, cx| {
                                    this.on_resize_start(index, event, cx);
                                }),
                            ),
                    ),
            );
        }

        div()
            .w_full()
            .flex_none()
            .overflow_hidden()
            .bg(theme.grid_header)
            .border_b_1()
            .border_color(theme.border)
            .child(cells)
    }

    fn render_row(
        &self,
        row: usize,
        widths: &RenderedColumns,
        theme: &Theme,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let row_height = px(self.model.row_height());
        let is_detail = self.model.detail_row() == Some(row);
        let cells = self.store.row(row).unwrap_or_default();

        div()
            .id(ElementId::Name(SharedString::from(format!("row-{}", row))))
            .flex()
            .flex_none()
            .w(px(widths.total))
            .h(row_height)
            .items_center()
            .border_b_1()
            .border_color(theme.grid_line)
            .when(row % 2 == 1, |this| this.bg(theme.grid_stripe))
            .when(is_detail, |this| this.bg(theme.selection))
            .hover(|style| style.bg(theme.surface_hover))
            .child(
                div()
                    .w(px(widths.index))
                    .flex_none()
                    .px_2()
                    .text_color(theme.text_muted)
                    .child(SharedString::from((row + 1).to_string())),
            )
            .children(cells.iter().zip(widths.columns.iter()).map(|(cell, column)| {
                div()
                    .w(px(column.width))
                    .flex_none()
                    .px_2()
                    .overflow_hidden()
                    .whitespace_nowrap()
                    .text_ellipsis()
                    .child(SharedString::from(cell.clone()))
            }))
            .on_click(cx.listener(move |this, event: &ClickEvent, _window, cx| {
                if event.click_count() >= 2 {
                    this.open_detail(row, cx);
                }
            }))
            .into_any_element()
    }

    fn render_load_more(&self, width: f32, theme: &Theme, cx: &mut Context<Self>) -> AnyElement {
        let label = if self.store.is_loading_more() {
            "Loading..."
        } else {
            "Load more"
        };

        div()
            .id("load-more")
            .w(px(width))
            .h(px(self.model.row_height()))
            .flex()
            .items_center()
            .justify_center()
            .text_color(theme.accent)
            .cursor_pointer()
            .hover(|style| style.bg(theme.surface_hover))
            .on_click(cx.listener(|this, _: &ClickEvent, _window, cx| this.load_more(cx)))
            .child(label)
            .into_any_element()
    }

    fn render_table(
        &self,
        show_load_more: bool,
        theme: &Theme,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let widths = self.model.layout().render_widths(self.model.viewport_width());
        let window = self.model.window();
        let scroll_x = self.scroll_handle.offset().x;

        let rows: Vec<AnyElement> = window
            .rows()
            .map(|row| self.render_row(row, &widths, theme, cx))
            .collect();

        let mut body = div()
            .flex()
            .flex_col()
            .w(px(widths.total))
            .child(div().flex_none().h(px(window.leading_spacer)))
            .children(rows)
            .child(div().flex_none().h(px(window.trailing_spacer)));

        if show_load_more {
            body = body.child(self.render_load_more(widths.total, theme, cx));
        }
        if let Some(error) = self.store.last_error() {
            body = body.child(
                div()
                    .px_2()
                    .py_1()
                    .text_color(theme.error)
                    .text_size(theme.font_size_small)
                    .child(SharedString::from(error.to_string())),
            );
        }

        div()
            .size_full()
            .flex()
            .flex_col()
            .child(self.render_header(&widths, scroll_x, theme, cx))
            .child(
                div()
                    .flex_1()
                    .relative()
                    .overflow_hidden()
                    .child(self.render_viewport_probe(cx))
                    .child(
                        div()
                            .id("grid-body")
                            .size_full()
                            .overflow_scroll()
                            .track_scroll(&self.scroll_handle)
                            .on_scroll_wheel(cx.listener(
                                |_this, _: &ScrollWheelEvent, window, cx| {
                                    // The offset moves during dispatch; read it afterwards.
                                    cx.defer_in(window, |this, _window, cx| this.sync_scroll(cx));
                                },
                            ))
                            .child(body),
                    ),
            )
            .into_any_element()
    }

    /// Reports the body size back to the model after layout.
    fn render_viewport_probe(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let entity = cx.entity().clone();
        canvas(
            move |bounds, _, cx| {
                entity.update(cx, |this, cx| this.observe_viewport(bounds.size, cx));
            },
            |_, _, _, _| {},
        )
        .absolute()
        .size_full()
    }

    fn render_placeholder(&self, view: GridView, theme: &Theme, cx: &mut Context<Self>) -> AnyElement {
        let message = view.placeholder().unwrap_or(LOADING_MESSAGE);
        let widths = self.model.layout().render_widths(self.model.viewport_width());

        div()
            .size_full()
            .relative()
            .flex()
            .flex_col()
            .child(self.render_viewport_probe(cx))
            // A query with no rows still shows its columns.
            .when(view == GridView::EmptyNoRows, |this| {
                this.child(self.render_header(&widths, px(0.0), theme, cx))
            })
            .child(
                div()
                    .flex_1()
                    .flex()
                    .items_center()
                    .justify_center()
                    .text_color(theme.text_muted)
                    .child(message),
            )
            .into_any_element()
    }

    fn render_detail(&self, detail: RowDetail, theme: &Theme, cx: &mut Context<Self>) -> impl IntoElement {
        deferred(
            div()
                .id("row-detail-backdrop")
                .absolute()
                .top_0()
                .left_0()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .bg(theme.backdrop)
                .on_mouse_down(
                    MouseButton::Left,
                    cx.listener(|this, _, _window, cx| {
                        this.close_detail(cx);
                    }),
                )
                .child(
                    div()
                        .id("row-detail")
                        .w(px(520.0))
                        .max_h(px(480.0))
                        .flex()
                        .flex_col()
                        .bg(theme.surface)
                        .border_1()
                        .border_color(theme.border)
                        .rounded(theme.radius)
                        .shadow_lg()
                        .occlude()
                        .on_mouse_down(MouseButton::Left, |_, _, cx| {
                            cx.stop_propagation();
                        })
                        .child(
                            div()
                                .px_3()
                                .py_2()
                                .flex()
                                .justify_between()
                                .border_b_1()
                                .border_color(theme.border)
                                .child(SharedString::from(format!("Row {}", detail.row_number)))
                                .child(
                                    div()
                                        .id("row-detail-close")
                                        .cursor_pointer()
                                        .text_color(theme.text_muted)
                                        .hover(|style| style.text_color(theme.text))
                                        .on_click(cx.listener(|this, _: &ClickEvent, _window, cx| {
                                            this.close_detail(cx);
                                        }))
                                        .child("Close"),
                                ),
                        )
                        .child(
                            div()
                                .id("row-detail-fields")
                                .flex_1()
                                .overflow_y_scroll()
                                .p_3()
                                .flex()
                                .flex_col()
                                .gap_2()
                                .children(detail.fields.into_iter().map(|(name, value)| {
                                    div()
                                        .flex()
                                        .flex_col()
                                        .child(
                                            div()
                                                .text_size(theme.font_size_small)
                                                .text_color(theme.text_muted)
                                                .child(SharedString::from(name)),
                                        )
                                        .child(
                                            div()
                                                .font_family(theme.mono_font_family.clone())
                                                .child(SharedString::from(value)),
                                        )
                                })),
                        ),
                ),
        )
        .with_priority(1)
    }
}

impl Focusable for ResultGrid {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl Render for ResultGrid {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme().clone();

        let view = self.model.view(self.loading, &self.store);
        let content = match view {
            GridView::Populated { show_load_more } => self.render_table(show_load_more, &theme, cx),
            _ => self.render_placeholder(view, &theme, cx),
        };
        let detail = self.model.detail(&self.store);

        div()
            .id("result-grid")
            .key_context("ResultGrid")
            .track_focus(&self.focus_handle)
            .on_action(cx.listener(Self::on_load_more))
            .on_action(cx.listener(Self::on_close_detail))
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _: &MouseDownEvent, window, _cx| {
                    window.focus(&this.focus_handle);
                }),
            )
            .on_mouse_move(cx.listener(Self::on_mouse_move))
            .on_mouse_up(MouseButton::Left, cx.listener(Self::on_mouse_up))
            .on_mouse_up_out(MouseButton::Left, cx.listener(Self::on_mouse_up))
            .size_full()
            .relative()
            .overflow_hidden()
            .bg(theme.background)
            .font_family(theme.mono_font_family.clone())
            .text_size(theme.font_size_small)
            .text_color(theme.text)
            .child(content)
            .when_some(detail, |this, detail| {
                this.child(self.render_detail(detail, &theme, cx))
            })
    }
}
