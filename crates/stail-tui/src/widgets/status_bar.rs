//! Status bar widget: the 1-line strip at the top of the screen.
//!
//! Shows the stream state badge, the active backend query and the number of
//! records held in the log pane, with keybinding hints right-aligned.

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use stail_core::StreamState;

pub struct StatusBar<'a> {
    state: StreamState,
    query: &'a str,
    records: usize,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(state: StreamState, query: &'a str, records: usize, theme: &'a Theme) -> Self {
        Self { state, query, records, theme }
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dim = Style::default().add_modifier(Modifier::DIM);
        let query = if self.query.is_empty() { "*" } else { self.query };

        let line = Line::from(vec![
            Span::styled(
                format!(" {} ", self.state.to_string().to_uppercase()),
                self.theme.status_style(self.state),
            ),
            Span::raw("  "),
            Span::styled("query: ", dim),
            Span::raw(query.to_string()),
            Span::styled(format!("  {} records", self.records), dim),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);

        let hint = " p:pause  /:query  q:quit  ?:help ";
        let hint_x = area.right().saturating_sub(hint.chars().count() as u16);
        buf.set_string(hint_x, area.y, hint, dim);
    }
}
