//! Console panel - the main UI composition.
//!
//! Coordinates the query editor, the toolbar, the result grid and the run
//! history. The panel owns the run lifecycle; the grid owns the rows and
//! pages through them on its own.

use std::path::PathBuf;
use std::sync::Arc;

use gpui::{
    deferred, div, prelude::*, px, App, AsyncApp, ClickEvent, Context, ElementId, Entity,
    ExternalPaths, FocusHandle, Focusable, Hsla, InteractiveElement, IntoElement, MouseButton,
    ParentElement, Render, SharedString, Styled, WeakEntity, Window,
};
use quarry_console::{DropAnchor, DropOption, DropPrompt, ExecutionController, RunTicket, Toggle};
use quarry_core::{
    format_sql, AppConfig, EngineError, ExecutionState, QueryEngine, QueryResult,
};
use quarry_engine::{HistoryEntry, HistoryStore};

use crate::actions::{ClearQuery, Dismiss, FormatQuery, ToggleRun};
use crate::theme::{Theme, ThemeExt};
use crate::views::{QueryEditor, QueryEditorEvent, ResultGrid};

/// Entries shown in the history tab.
const HISTORY_LIMIT: usize = 30;

const EDITOR_PLACEHOLDER: &str = "SELECT * FROM read_csv('data.csv')";

/// Which surface the lower half shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultsTab {
    #[default]
    Results,
    History,
}

// =============================================================================
// Console Panel
// =============================================================================

pub struct ConsolePanel {
    editor: Entity<QueryEditor>,
    grid: Entity<ResultGrid>,
    controller: ExecutionController,
    engine: Arc<dyn QueryEngine>,
    history: Arc<HistoryStore>,
    history_entries: Vec<HistoryEntry>,
    tab: ResultsTab,
    drop_prompt: DropPrompt,
    /// Database label for the header.
    database: SharedString,
    focus_handle: FocusHandle,
}

impl ConsolePanel {
    pub fn new(
        config: &AppConfig,
        engine: Arc<dyn QueryEngine>,
        history: Arc<HistoryStore>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let editor = cx.new(|cx| QueryEditor::new(EDITOR_PLACEHOLDER, window, cx));
        cx.subscribe(&editor, |_this, _editor, event: &QueryEditorEvent, cx| match event {
            QueryEditorEvent::Changed => cx.notify(),
        })
        .detach();

        let grid_engine = engine.clone();
        let page_size = config.query.page_size;
        let grid_config = config.grid.clone();
        let grid = cx.new(|cx| ResultGrid::new(grid_engine, page_size, grid_config, cx));

        let focus_handle = editor.read(cx).focus_handle(cx);
        window.focus(&focus_handle);

        let mut panel = Self {
            editor,
            grid,
            controller: ExecutionController::new(page_size),
            engine,
            history,
            history_entries: Vec::new(),
            tab: ResultsTab::Results,
            drop_prompt: DropPrompt::new(),
            database: SharedString::from(config.query.database.clone()),
            focus_handle: cx.focus_handle(),
        };
        panel.reload_history();
        panel
    }

    // -------------------------------------------------------------------------
    // Run Lifecycle
    // -------------------------------------------------------------------------

    fn toggle_run(&mut self, cx: &mut Context<Self>) {
        let editor = self.editor.read(cx);
        let buffer = editor.text(cx);
        let selection = editor.selected_text(cx);

        let controller = &mut self.controller;
        let toggle = self.grid.update(cx, |grid, _cx| {
            controller.toggle(grid.store_mut(), &buffer, selection.as_deref())
        });

        match toggle {
            Toggle::Started(pending) => {
                self.tab = ResultsTab::Results;
                self.grid.update(cx, |grid, cx| grid.set_loading(true, cx));

                let ticket = pending.ticket;
                let fetch = pending.dispatch(self.engine.as_ref());
                cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
                    let outcome = fetch.await;
                    let _ = this.update(cx, |this, cx| {
                        this.finish_run(ticket, outcome, cx);
                    });
                })
                .detach();
                cx.notify();
            }
            Toggle::CancelRequested => cx.notify(),
            Toggle::Ignored => {}
        }
    }

    fn finish_run(
        &mut self,
        ticket: RunTicket,
        outcome: Result<QueryResult, EngineError>,
        cx: &mut Context<Self>,
    ) {
        let controller = &mut self.controller;
        let state = self.grid.update(cx, |grid, cx| {
            let state = controller.complete_run(ticket, outcome, grid.store_mut());
            if state.is_some() {
                grid.set_loading(false, cx);
            }
            state
        });

        if let (Some(status), Some(sql)) = (
            state.and_then(ExecutionState::history_status),
            self.controller.last_run_text().map(str::to_string),
        ) {
            if let Err(e) = self.history.record(&sql, status) {
                tracing::warn!("Failed to record history: {}", e);
            }
            self.reload_history();
        }
        cx.notify();
    }

    fn reload_history(&mut self) {
        match self.history.recent(HISTORY_LIMIT) {
            Ok(entries) => self.history_entries = entries,
            Err(e) => tracing::warn!("Failed to read history: {}", e),
        }
    }

    // -------------------------------------------------------------------------
    // Action Handlers
    // -------------------------------------------------------------------------

    fn on_toggle_run(&mut self, _: &ToggleRun, _window: &mut Window, cx: &mut Context<Self>) {
        self.toggle_run(cx);
    }

    fn on_format_query(&mut self, _: &FormatQuery, _window: &mut Window, cx: &mut Context<Self>) {
        let text = self.editor.read(cx).text(cx);
        let formatted = format_sql(&text);
        if formatted != text {
            self.editor
                .update(cx, |editor, cx| editor.set_text(formatted, cx));
        }
    }

    fn on_clear_query(&mut self, _: &ClearQuery, _window: &mut Window, cx: &mut Context<Self>) {
        self.editor.update(cx, |editor, cx| editor.clear(cx));
    }

    fn on_dismiss(&mut self, _: &Dismiss, _window: &mut Window, cx: &mut Context<Self>) {
        if self.drop_prompt.is_open() {
            self.drop_prompt.dismiss();
            cx.notify();
            return;
        }
        self.grid.update(cx, |grid, cx| {
            grid.close_detail(cx);
        });
    }

    fn select_tab(&mut self, tab: ResultsTab, cx: &mut Context<Self>) {
        if self.tab != tab {
            if tab == ResultsTab::History {
                self.reload_history();
            }
            self.tab = tab;
            cx.notify();
        }
    }

    fn load_history_entry(&mut self, index: usize, window: &mut Window, cx: &mut Context<Self>) {
        let Some(entry) = self.history_entries.get(index) else {
            return;
        };
        let sql = entry.sql.clone();
        self.editor.update(cx, |editor, cx| editor.set_text(sql, cx));
        let focus = self.editor.read(cx).focus_handle(cx);
        window.focus(&focus);
    }

    // -------------------------------------------------------------------------
    // File Drop
    // -------------------------------------------------------------------------

    fn on_file_drop(&mut self, paths: &ExternalPaths, window: &mut Window, cx: &mut Context<Self>) {
        let paths: Vec<PathBuf> = paths.paths().to_vec();
        let position = window.mouse_position();
        let anchor = DropAnchor {
            x: position.x.into(),
            y: position.y.into(),
        };
        if self.drop_prompt.on_file_dropped(&paths, anchor).is_some() {
            cx.notify();
        }
    }

    fn resolve_drop(&mut self, option: DropOption, window: &mut Window, cx: &mut Context<Self>) {
        let prompt = &mut self.drop_prompt;
        let resolved = self.editor.update(cx, |editor, cx| {
            editor.update_buffer(cx, |buffer| prompt.resolve(option, buffer))
        });
        if resolved {
            let focus = self.editor.read(cx).focus_handle(cx);
            window.focus(&focus);
        }
        cx.notify();
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    fn render_button(
        id: &'static str,
        label: impl Into<SharedString>,
        background: Hsla,
        foreground: Hsla,
        enabled: bool,
        theme: &Theme,
    ) -> gpui::Stateful<gpui::Div> {
        div()
            .id(id)
            .h(theme.control_height)
            .px_3()
            .flex()
            .items_center()
            .rounded(theme.radius)
            .bg(background)
            .text_color(foreground)
            .when(enabled, |this| {
                this.cursor_pointer().hover(|style| style.opacity(0.85))
            })
            .when(!enabled, |this| this.opacity(0.5))
            .child(label.into())
    }

    fn render_toolbar(&self, theme: &Theme, cx: &mut Context<Self>) -> impl IntoElement {
        let state = self.controller.state();
        let has_text = !self.editor.read(cx).is_empty(cx);

        let (run_label, run_bg, run_enabled) = match state {
            ExecutionState::Running => ("Stop", theme.error, true),
            ExecutionState::Cancelling => ("Stopping...", theme.warning, false),
            _ => ("Run", theme.accent, has_text),
        };

        div()
            .w_full()
            .flex()
            .items_center()
            .gap_2()
            .child(
                Self::render_button(
                    "run-toggle",
                    run_label,
                    run_bg,
                    theme.text_on_accent,
                    run_enabled,
                    theme,
                )
                .when(run_enabled, |this| {
                    this.on_click(cx.listener(|this, _: &ClickEvent, _window, cx| {
                        this.toggle_run(cx);
                    }))
                }),
            )
            .child(
                Self::render_button(
                    "format-query",
                    "Format",
                    theme.surface,
                    theme.text,
                    has_text,
                    theme,
                )
                .on_click(cx.listener(|this, _: &ClickEvent, window, cx| {
                    this.on_format_query(&FormatQuery, window, cx);
                })),
            )
            .child(
                Self::render_button(
                    "clear-query",
                    "Clear",
                    theme.surface,
                    theme.text,
                    has_text,
                    theme,
                )
                .on_click(cx.listener(|this, _: &ClickEvent, window, cx| {
                    this.on_clear_query(&ClearQuery, window, cx);
                })),
            )
    }

    fn render_tab(
        &self,
        tab: ResultsTab,
        label: &'static str,
        theme: &Theme,
        cx: &mut Context<Self>,
    ) -> impl IntoElement {
        let active = self.tab == tab;
        div()
            .id(ElementId::Name(SharedString::from(format!("tab-{}", label))))
            .h(theme.control_height)
            .px_3()
            .flex()
            .items_center()
            .cursor_pointer()
            .text_size(theme.font_size_small)
            .text_color(if active { theme.text } else { theme.text_muted })
            .when(active, |this| this.border_b_2().border_color(theme.accent))
            .hover(|style| style.text_color(theme.text))
            .on_click(cx.listener(move |this, _: &ClickEvent, _window, cx| {
                this.select_tab(tab, cx);
            }))
            .child(label)
    }

    fn render_status(&self, theme: &Theme, cx: &App) -> impl IntoElement {
        let store = self.grid.read(cx).store();
        let state = self.controller.state();

        let (label, color) = match state {
            ExecutionState::Idle => (String::new(), theme.text_muted),
            ExecutionState::Running => ("Running".to_string(), theme.text_muted),
            ExecutionState::Cancelling => ("Cancelling".to_string(), theme.warning),
            ExecutionState::Cancelled => ("Cancelled".to_string(), theme.warning),
            ExecutionState::Failed => ("Failed".to_string(), theme.error),
            ExecutionState::Succeeded => {
                let more = if store.has_more() { "+" } else { "" };
                (
                    format!("{}{} rows in {}", store.row_count(), more, store.query_time()),
                    theme.success,
                )
            }
        };

        div()
            .text_size(theme.font_size_small)
            .text_color(color)
            .child(SharedString::from(label))
    }

    fn render_history(&self, theme: &Theme, cx: &mut Context<Self>) -> impl IntoElement {
        if self.history_entries.is_empty() {
            return div()
                .id("history-empty")
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_color(theme.text_muted)
                .child("No queries run yet");
        }

        let entries: Vec<_> = self
            .history_entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let status_color = match entry.status.as_str() {
                    "successful" => theme.success,
                    "cancelled" => theme.warning,
                    _ => theme.error,
                };
                div()
                    .id(ElementId::Name(SharedString::from(format!(
                        "history-{}",
                        entry.id
                    ))))
                    .w_full()
                    .px_3()
                    .py_1()
                    .flex()
                    .gap_3()
                    .items_center()
                    .cursor_pointer()
                    .border_b_1()
                    .border_color(theme.grid_line)
                    .hover(|style| style.bg(theme.surface_hover))
                    .on_click(cx.listener(move |this, _: &ClickEvent, window, cx| {
                        this.load_history_entry(index, window, cx);
                    }))
                    .child(
                        div()
                            .w(px(72.0))
                            .flex_none()
                            .text_color(status_color)
                            .child(SharedString::from(entry.status.clone())),
                    )
                    .child(
                        div()
                            .flex_1()
                            .overflow_hidden()
                            .whitespace_nowrap()
                            .text_ellipsis()
                            .font_family(theme.mono_font_family.clone())
                            .child(SharedString::from(entry.sql.replace('\n', " "))),
                    )
                    .child(
                        div()
                            .flex_none()
                            .text_color(theme.text_muted)
                            .child(SharedString::from(entry.created_at.clone())),
                    )
            })
            .collect();

        div()
            .id("history-list")
            .size_full()
            .overflow_y_scroll()
            .text_size(theme.font_size_small)
            .children(entries)
    }

    fn render_drop_prompt(&self, theme: &Theme, cx: &mut Context<Self>) -> Option<impl IntoElement> {
        let choice = self.drop_prompt.choice()?;
        let anchor = self.drop_prompt.anchor().unwrap_or_default();

        let option = |id: &'static str, preview: &str, selected: DropOption| {
            div()
                .id(id)
                .px_3()
                .py_2()
                .flex()
                .flex_col()
                .cursor_pointer()
                .rounded(theme.radius)
                .hover(|style| style.bg(theme.surface_hover))
                .child(selected.label())
                .child(
                    div()
                        .text_size(theme.font_size_small)
                        .text_color(theme.text_muted)
                        .font_family(theme.mono_font_family.clone())
                        .child(SharedString::from(preview.to_string())),
                )
                .on_click(cx.listener(move |this, _: &ClickEvent, window, cx| {
                    this.resolve_drop(selected, window, cx);
                }))
        };

        let full_query = option("drop-full-query", &choice.full_query, DropOption::FullQuery);
        let fragment = option("drop-fragment", &choice.fragment, DropOption::Fragment);

        Some(
            deferred(
                div()
                    .id("drop-prompt")
                    .absolute()
                    .left(px(anchor.x))
                    .top(px(anchor.y))
                    .w(px(360.0))
                    .p_1()
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
                    .on_mouse_down_out(cx.listener(|this, _, _window, cx| {
                        this.drop_prompt.dismiss();
                        cx.notify();
                    }))
                    .child(full_query)
                    .child(fragment),
            )
            .with_priority(1),
        )
    }
}

// =============================================================================
// Focusable
// =============================================================================

impl Focusable for ConsolePanel {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

// =============================================================================
// Render
// =============================================================================

impl Render for ConsolePanel {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme().clone();

        let results = match self.tab {
            ResultsTab::Results => self.grid.clone().into_any_element(),
            ResultsTab::History => self.render_history(&theme, cx).into_any_element(),
        };
        let drop_prompt = self.render_drop_prompt(&theme, cx);

        div()
            .id("console-panel")
            .key_context("Console")
            .track_focus(&self.focus_handle)
            .on_action(cx.listener(Self::on_toggle_run))
            .on_action(cx.listener(Self::on_format_query))
            .on_action(cx.listener(Self::on_clear_query))
            .on_action(cx.listener(Self::on_dismiss))
            .on_drop(cx.listener(Self::on_file_drop))
            .drag_over::<ExternalPaths>(|style, _, _, _| style.opacity(0.9))
            .size_full()
            .relative()
            .flex()
            .flex_col()
            .bg(theme.background)
            .text_color(theme.text)
            .font_family(theme.font_family.clone())
            .text_size(theme.font_size)
            // Header
            .child(
                div()
                    .w_full()
                    .flex_none()
                    .h(theme.header_height)
                    .px_3()
                    .flex()
                    .items_center()
                    .justify_between()
                    .bg(theme.surface)
                    .border_b_1()
                    .border_color(theme.border)
                    .child(div().font_weight(gpui::FontWeight::SEMIBOLD).child("Quarry"))
                    .child(
                        div()
                            .text_size(theme.font_size_small)
                            .text_color(theme.text_muted)
                            .child(self.database.clone()),
                    ),
            )
            // Editor and toolbar
            .child(
                div()
                    .w_full()
                    .h(px(240.0))
                    .flex_none()
                    .p_2()
                    .flex()
                    .flex_col()
                    .gap_2()
                    .border_b_1()
                    .border_color(theme.border)
                    .child(div().flex_1().min_h_0().child(self.editor.clone()))
                    .child(self.render_toolbar(&theme, cx)),
            )
            // Tabs and status
            .child(
                div()
                    .w_full()
                    .flex_none()
                    .px_2()
                    .flex()
                    .items_center()
                    .justify_between()
                    .border_b_1()
                    .border_color(theme.border)
                    .child(
                        div()
                            .flex()
                            .child(self.render_tab(ResultsTab::Results, "Results", &theme, cx))
                            .child(self.render_tab(ResultsTab::History, "History", &theme, cx)),
                    )
                    .child(self.render_status(&theme, cx)),
            )
            // Results or history
            .child(div().w_full().flex_1().min_h_0().overflow_hidden().child(results))
            .children(drop_prompt)
    }
}
