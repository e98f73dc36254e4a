//! Log stream widget: the scrollable live-tail pane.
//!
//! # Navigation (when pane is focused)
//!
//! | Key | Action |
//! |-----|--------|
//! | `↑` / `k` | Move cursor up one line (scrolls view if needed) |
//! | `↓` / `j` | Move cursor down one line |
//! | `PageUp` / `Ctrl+u` | Scroll up one page |
//! | `PageDown` / `Ctrl+d` | Scroll down one page |
//! | `G` | Jump to tail and follow again |
//!
//! # Scroll semantics
//!
//! `scroll_offset` = number of records hidden at the bottom (0 = live tail).
//! `cursor` = absolute index into `records` (0 = oldest). While scrolled back
//! the view stays put as new records arrive; they are counted in
//! `buffered_new` until the user returns to the tail.

use std::cell::Cell;
use std::collections::VecDeque;

use crate::event::{AppEvent, Direction};
use crate::theme::Theme;
use chrono::format::{Item, StrftimeItems};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget,
    },
};
use stail_core::{config::UiConfig, Record};

const PAGE_STEP: usize = 10;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

pub struct LogStreamState {
    records: VecDeque<Record>,
    /// Oldest records are dropped beyond this many.
    max_rows: usize,
    /// Number of records hidden at the bottom (0 = live tail).
    pub scroll_offset: usize,
    /// Absolute index into `records` of the highlighted line.
    pub cursor: usize,
    /// True once the user scrolls away from the tail.
    pub scrolled_back: bool,
    /// Records that arrived while scrolled back.
    pub buffered_new: usize,
    pub show_timestamps: bool,
    pub show_tags: bool,
    pub timestamp_format: String,
    /// Cached from the last render so `handle()` can do cursor-aware scrolling.
    last_height: Cell<usize>,
}

impl LogStreamState {
    pub fn new(ui: &UiConfig) -> Self {
        Self {
            records: VecDeque::new(),
            max_rows: ui.max_rows.max(1),
            scroll_offset: 0,
            cursor: 0,
            scrolled_back: false,
            buffered_new: 0,
            show_timestamps: ui.show_timestamps,
            show_tags: ui.show_tags,
            timestamp_format: checked_format(&ui.timestamp_format),
            last_height: Cell::new(40),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Append a record at the tail, evicting the oldest past `max_rows`.
    pub fn push(&mut self, record: Record) {
        self.records.push_back(record);
        let evicted = self.records.len() > self.max_rows;
        if evicted {
            self.records.pop_front();
        }

        if self.scrolled_back {
            self.buffered_new += 1;
            // Keep the same records on screen.
            self.scroll_offset = (self.scroll_offset + 1).min(self.records.len());
            if evicted {
                self.cursor = self.cursor.saturating_sub(1);
            }
        } else {
            self.cursor = self.records.len() - 1;
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.follow();
    }

    /// Return to the live tail.
    pub fn follow(&mut self) {
        self.scroll_offset = 0;
        self.cursor = self.records.len().saturating_sub(1);
        self.scrolled_back = false;
        self.buffered_new = 0;
    }

    fn height(&self) -> usize {
        self.last_height.get().max(1)
    }

    /// Returns `(start, end)`, the exclusive range of records currently visible.
    fn visible_range(&self) -> (usize, usize) {
        let total = self.records.len();
        let end = total.saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(self.height());
        (start, end)
    }

    /// Handle a navigation event from the app shell.
    pub fn handle(&mut self, event: &AppEvent) {
        let total = self.records.len();
        if total == 0 {
            return;
        }

        match event {
            AppEvent::Nav(Direction::Up) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                }
                self.scrolled_back = true;
                let (start, _) = self.visible_range();
                if self.cursor < start {
                    self.scroll_offset = total.saturating_sub(self.cursor + self.height());
                }
                tracing::debug!(
                    cursor = self.cursor,
                    scroll_offset = self.scroll_offset,
                    "stream: cursor up"
                );
            }
            AppEvent::Nav(Direction::Down) => {
                if self.cursor + 1 < total {
                    self.cursor += 1;
                }
                let (_, end) = self.visible_range();
                if self.cursor >= end {
                    self.scroll_offset = self.scroll_offset.saturating_sub(1);
                }
                if self.scroll_offset == 0 && self.cursor + 1 == total {
                    self.follow();
                }
                tracing::debug!(
                    cursor = self.cursor,
                    scroll_offset = self.scroll_offset,
                    scrolled_back = self.scrolled_back,
                    "stream: cursor down"
                );
            }

            AppEvent::ScrollUp => {
                self.scrolled_back = true;
                self.scroll_offset = (self.scroll_offset + PAGE_STEP).min(total);
                let (_, end) = self.visible_range();
                self.cursor = end.saturating_sub(1);
                tracing::debug!(scroll_offset = self.scroll_offset, "stream: page up");
            }
            AppEvent::ScrollDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(PAGE_STEP);
                let (_, end) = self.visible_range();
                self.cursor = end.saturating_sub(1);
                if self.scroll_offset == 0 {
                    self.follow();
                }
                tracing::debug!(scroll_offset = self.scroll_offset, "stream: page down");
            }

            AppEvent::ScrollToTail => {
                self.follow();
                tracing::debug!(cursor = self.cursor, "stream: jumped to tail");
            }

            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Widget
// ---------------------------------------------------------------------------

pub struct LogStream<'a> {
    state: &'a LogStreamState,
    focused: bool,
    theme: &'a Theme,
}

impl<'a> LogStream<'a> {
    pub fn new(state: &'a LogStreamState, focused: bool, theme: &'a Theme) -> Self {
        Self { state, focused, theme }
    }
}

impl Widget for LogStream<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            self.theme.border_focused
        } else {
            self.theme.border_unfocused
        };

        let block = Block::bordered().title("Logs").border_style(border_style);
        let inner = block.inner(area);
        block.render(area, buf);

        let height = inner.height as usize;
        // Draw always runs before handle().
        self.state.last_height.set(height);

        let total = self.state.records.len();
        let end = total.saturating_sub(self.state.scroll_offset);
        let start = end.saturating_sub(height);

        let cursor_row: Option<usize> =
            if self.focused && self.state.cursor >= start && self.state.cursor < end {
                Some(self.state.cursor - start)
            } else {
                None
            };

        let mut lines: Vec<Line<'static>> = self
            .state
            .records
            .range(start..end)
            .enumerate()
            .map(|(row, record)| {
                let mut line = render_record(record, self.state, self.theme);
                if Some(row) == cursor_row {
                    line = line.patch_style(Style::default().add_modifier(Modifier::REVERSED));
                }
                line
            })
            .collect();

        if self.state.scrolled_back {
            let msg = if self.state.buffered_new > 0 {
                format!(
                    " ▲  scrolled back, {} new records (G to follow) ",
                    self.state.buffered_new
                )
            } else {
                " ▲  scrolled back (G to follow) ".to_string()
            };
            let banner = Line::from(Span::styled(
                msg,
                Style::default()
                    .bg(Color::DarkGray)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ));
            if lines.is_empty() {
                lines.push(banner);
            } else {
                lines[0] = banner;
            }
        }

        // 1-column scrollbar strip inside the borders so the track height
        // equals the number of visible rows.
        let text_area = Rect { width: inner.width.saturating_sub(1), ..inner };
        let sb_area = Rect {
            x: inner.right().saturating_sub(1),
            width: 1,
            ..inner
        };

        Paragraph::new(lines).render(text_area, buf);

        if total > 0 {
            let mut sb_state = ScrollbarState::new(total)
                .position(start)
                .viewport_content_length(height);
            StatefulWidget::render(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(None)
                    .end_symbol(None),
                sb_area,
                buf,
                &mut sb_state,
            );
        }
    }
}

/// A bad strftime string would make `format!` panic at render time.
fn checked_format(fmt: &str) -> String {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        tracing::warn!(format = fmt, "invalid timestamp_format, using default");
        UiConfig::default().timestamp_format
    } else {
        fmt.to_string()
    }
}

// ---------------------------------------------------------------------------
// Record rendering
// ---------------------------------------------------------------------------

fn render_record(record: &Record, state: &LogStreamState, theme: &Theme) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let dim = Style::default().add_modifier(Modifier::DIM);

    if state.show_timestamps {
        spans.push(Span::styled(
            format!("{} ", record.timestamp().format(&state.timestamp_format)),
            dim,
        ));
    }

    let level_style = theme.level_style(record.level());
    spans.push(Span::styled(
        format!("{:<5} ", record.level().to_ascii_uppercase()),
        level_style.add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("│ ".to_string(), dim));
    spans.push(Span::styled(record.message().to_string(), level_style));

    if state.show_tags {
        for tag in record.tags() {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(tag.clone(), theme.tag_style(tag)));
        }
    }

    Line::from(spans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
