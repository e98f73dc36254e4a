//! Top-level application state and the main event loop.
//!
//! [`App::run`] sets up the terminal, drives the crossterm event loop, and
//! tears everything down cleanly on exit or panic. Each frame it drains the
//! record channel without blocking and mirrors the controller's state into
//! the status bar; key handling turns into [`StreamCommand`]s that the loop
//! forwards to the [`StreamHandle`].

use crate::{
    commands::{execute_command, Command},
    event::{self, AppEvent},
    theme::Theme,
    widgets::{
        command_bar::{CommandBar, CommandBarState},
        help::HelpPopup,
        log_stream::{LogStream, LogStreamState},
        query_bar::{QueryBar, QueryBarState},
        status_bar::StatusBar,
    },
};
use crossterm::{
    event::{self as ct_event, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction as LayoutDir, Layout, Rect},
    Frame, Terminal,
};
use stail_core::{config::Config, Record, StreamHandle, StreamState};
use std::{io, time::Duration};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Upper bound on records moved into the log pane per frame.
const MAX_DRAIN_PER_FRAME: usize = 4096;

// ---------------------------------------------------------------------------
// Focus + stream commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Stream,
    QueryBar,
    /// Vim-style `:` command line is active.
    Command,
}

/// A control-plane request produced by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    Pause,
    Resume,
    UpdateQuery(String),
}

impl StreamCommand {
    pub fn apply(self, handle: &StreamHandle) {
        match self {
            StreamCommand::Pause => handle.pause(),
            StreamCommand::Resume => handle.resume(),
            StreamCommand::UpdateQuery(text) => handle.update_query(&text),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub stream: LogStreamState,
    pub query: QueryBarState,
    pub focus: Focus,
    /// Focus state before entering command mode, restored on exit.
    pub prev_focus: Focus,
    pub theme: Theme,
    pub show_help: bool,
    pub command_bar: CommandBarState,
    /// Last state reported by the controller.
    pub stream_state: StreamState,
    /// Query the source is currently using.
    pub active_query: String,
    pub quit: bool,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    state: AppState,
}

impl App {
    pub fn new(config: &Config, theme: Theme) -> Self {
        let state = AppState {
            stream: LogStreamState::new(&config.ui),
            query: QueryBarState::new(&config.datadog.query),
            focus: Focus::Stream,
            prev_focus: Focus::Stream,
            theme,
            show_help: false,
            command_bar: CommandBarState::default(),
            stream_state: StreamState::Running,
            active_query: config.datadog.query.clone(),
            quit: false,
        };

        App { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Move pending records into the log pane without blocking. Returns how
    /// many were taken.
    pub fn ingest(&mut self, records: &mut mpsc::Receiver<Record>) -> usize {
        let mut taken = 0;
        while taken < MAX_DRAIN_PER_FRAME {
            match records.try_recv() {
                Ok(record) => {
                    self.state.stream.push(record);
                    taken += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        taken
    }

    /// Mirror the controller's view of the world into the status bar.
    pub fn sync(&mut self, state: StreamState, query: String) {
        if state != self.state.stream_state {
            tracing::debug!(from = %self.state.stream_state, to = %state, "stream state");
        }
        self.state.stream_state = state;
        self.state.active_query = query;
    }

    /// Set up the terminal, run the event loop, and restore the terminal on exit.
    pub fn run(
        mut self,
        handle: &StreamHandle,
        records: &mut mpsc::Receiver<Record>,
    ) -> anyhow::Result<()> {
        install_panic_hook();

        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, handle, records);

        // Always restore terminal, even if the loop returned an error
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        handle: &StreamHandle,
        records: &mut mpsc::Receiver<Record>,
    ) -> anyhow::Result<()> {
        loop {
            self.ingest(records);
            self.sync(handle.state(), handle.query());

            {
                let s = &self.state;
                terminal.draw(|frame| draw(frame, s))?;
            }

            if self.state.quit {
                break;
            }

            if ct_event::poll(Duration::from_millis(16))? {
                let raw = ct_event::read()?;
                if let Event::Key(key) = &raw {
                    if key.kind != ct_event::KeyEventKind::Press {
                        continue;
                    }
                }
                // Use insert-mode mapping when a text widget is focused
                let app_event = if is_insert_mode(self.state.focus) {
                    event::to_app_event_insert(raw)
                } else {
                    event::to_app_event(raw)
                };
                if let Some(ev) = app_event {
                    tracing::debug!(focus = ?self.state.focus, event = ?ev, "key event");
                    if let Some(command) = self.handle(ev) {
                        tracing::debug!(command = ?command, "stream command");
                        command.apply(handle);
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply one event to the UI state. Returns the stream command it
    /// implies, if any.
    pub fn handle(&mut self, event: AppEvent) -> Option<StreamCommand> {
        let s = &mut self.state;

        // Help popup intercepts all events; only close keys pass through.
        if s.show_help {
            match event {
                AppEvent::Char('?') | AppEvent::Escape => s.show_help = false,
                AppEvent::Quit => {
                    s.show_help = false;
                    s.quit = true;
                }
                _ => {}
            }
            return None;
        }

        if s.focus == Focus::Command {
            return handle_command_mode(s, event);
        }

        match event {
            AppEvent::Quit => {
                tracing::debug!("quit");
                s.quit = true;
                None
            }

            AppEvent::Char('?') if s.focus != Focus::QueryBar => {
                s.show_help = true;
                None
            }

            AppEvent::Char(':') if s.focus != Focus::QueryBar => {
                tracing::debug!(prev_focus = ?s.focus, "entering command mode");
                s.prev_focus = s.focus;
                s.command_bar.clear();
                s.focus = Focus::Command;
                None
            }

            AppEvent::TogglePause => match s.stream_state {
                StreamState::Running => Some(StreamCommand::Pause),
                StreamState::Paused => Some(StreamCommand::Resume),
                StreamState::Stopped => None,
            },

            AppEvent::Escape => {
                if s.focus == Focus::QueryBar {
                    s.focus = Focus::Stream;
                }
                None
            }

            AppEvent::FocusNext => {
                s.focus = match s.focus {
                    Focus::Stream => Focus::QueryBar,
                    Focus::QueryBar | Focus::Command => Focus::Stream,
                };
                None
            }

            AppEvent::QueryFocus => {
                s.focus = Focus::QueryBar;
                None
            }

            AppEvent::Enter if s.focus == Focus::QueryBar => {
                let text = s.query.query.trim().to_string();
                tracing::debug!(query = %text, "applying query");
                s.focus = Focus::Stream;
                Some(StreamCommand::UpdateQuery(text))
            }

            // Terminal resize is handled automatically by ratatui
            AppEvent::Resize(_, _) => None,

            other => {
                match s.focus {
                    Focus::Stream => s.stream.handle(&other),
                    Focus::QueryBar => s.query.handle(&other),
                    Focus::Command => {}
                }
                None
            }
        }
    }
}

fn handle_command_mode(s: &mut AppState, event: AppEvent) -> Option<StreamCommand> {
    match event {
        AppEvent::Escape => {
            s.command_bar.clear();
            s.focus = s.prev_focus;
            None
        }
        AppEvent::Quit => {
            s.quit = true;
            None
        }
        AppEvent::Enter => {
            let input = s.command_bar.input.clone();
            match Command::parse(&input) {
                Ok(cmd) => {
                    tracing::debug!(command = ?cmd, "executing command");
                    s.command_bar.clear();
                    s.focus = s.prev_focus;
                    let out = execute_command(s, cmd);
                    // Execution errors keep the bar open to show them.
                    if s.command_bar.error.is_some() {
                        s.focus = Focus::Command;
                    }
                    out
                }
                Err(msg) if msg.is_empty() => {
                    s.command_bar.clear();
                    s.focus = s.prev_focus;
                    None
                }
                Err(msg) => {
                    s.command_bar.error = Some(msg);
                    None
                }
            }
        }
        other => {
            s.command_bar.handle(&other);
            None
        }
    }
}

/// True when alphabetic keys should produce characters rather than trigger
/// shortcuts.
fn is_insert_mode(focus: Focus) -> bool {
    matches!(focus, Focus::QueryBar | Focus::Command)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw(frame: &mut Frame, state: &AppState) {
    let area = frame.area();

    // Vertical: 1-line status bar | log stream | 3-line query bar
    let vert = Layout::default()
        .direction(LayoutDir::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(3),
        ])
        .split(area);

    frame.render_widget(
        StatusBar::new(
            state.stream_state,
            &state.active_query,
            state.stream.len(),
            &state.theme,
        ),
        vert[0],
    );
    frame.render_widget(
        LogStream::new(&state.stream, state.focus == Focus::Stream, &state.theme),
        vert[1],
    );
    frame.render_widget(
        QueryBar::new(&state.query, state.focus == Focus::QueryBar, &state.theme),
        vert[2],
    );

    if state.show_help {
        frame.render_widget(HelpPopup::new(&state.theme), area);
    }

    // Command bar overlays the bottom row of the screen
    if state.focus == Focus::Command {
        let cmd_area = Rect { y: area.bottom().saturating_sub(1), height: 1, ..area };
        frame.render_widget(CommandBar::new(&state.command_bar, &state.theme), cmd_area);
        let col = state.command_bar.cursor_col(cmd_area);
        frame.set_cursor_position((col, cmd_area.y));
        return;
    }

    if state.focus == Focus::QueryBar {
        let qb = QueryBar::new(&state.query, true, &state.theme);
        frame.set_cursor_position(qb.cursor_position(vert[2]));
    }
}

// ---------------------------------------------------------------------------
// Terminal helpers
// ---------------------------------------------------------------------------

fn install_panic_hook() {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original(info);
    }));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    fn app() -> App {
        App::new(&Config::defaults(), Theme::load_default())
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle(AppEvent::Char(c));
        }
    }

    fn record(n: i64) -> Record {
        Record::new(format!("r{n}"), Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap())
            .with_message(format!("line {n}"))
    }

    #[test]
    fn toggle_pause_follows_stream_state() {
        let mut app = app();
        assert_eq!(app.handle(AppEvent::TogglePause), Some(StreamCommand::Pause));

        app.sync(StreamState::Paused, String::new());
        assert_eq!(app.handle(AppEvent::TogglePause), Some(StreamCommand::Resume));

        app.sync(StreamState::Stopped, String::new());
        assert_eq!(app.handle(AppEvent::TogglePause), None);
    }

    #[test]
    fn query_bar_enter_updates_query() {
        let mut app = app();
        app.handle(AppEvent::QueryFocus);
        type_str(&mut app, "service:api ");
        let cmd = app.handle(AppEvent::Enter);
        assert_eq!(cmd, Some(StreamCommand::UpdateQuery("service:api".into())));
        assert_eq!(app.state().focus, Focus::Stream);
    }

    #[test]
    fn shortcut_letters_are_text_in_query_bar() {
        let mut app = app();
        app.handle(AppEvent::QueryFocus);
        // '?' and ':' are literal while typing a query
        type_str(&mut app, "a?:");
        assert!(!app.state().show_help);
        assert_eq!(app.state().focus, Focus::QueryBar);
        assert_eq!(app.state().query.query, "a?:");
    }

    #[test]
    fn command_mode_pause_and_query() {
        let mut app = app();
        app.handle(AppEvent::Char(':'));
        assert_eq!(app.state().focus, Focus::Command);
        type_str(&mut app, "pause");
        assert_eq!(app.handle(AppEvent::Enter), Some(StreamCommand::Pause));
        assert_eq!(app.state().focus, Focus::Stream);

        app.handle(AppEvent::Char(':'));
        type_str(&mut app, "query status:error");
        assert_eq!(
            app.handle(AppEvent::Enter),
            Some(StreamCommand::UpdateQuery("status:error".into()))
        );
        assert_eq!(app.state().query.query, "status:error");
    }

    #[test]
    fn command_errors_keep_bar_open() {
        let mut app = app();
        app.handle(AppEvent::Char(':'));
        type_str(&mut app, "theme solarized");
        assert_eq!(app.handle(AppEvent::Enter), None);
        assert_eq!(app.state().focus, Focus::Command);
        assert!(app.state().command_bar.error.is_some());

        app.handle(AppEvent::Escape);
        assert_eq!(app.state().focus, Focus::Stream);
    }

    #[test]
    fn help_popup_swallows_keys() {
        let mut app = app();
        app.handle(AppEvent::Char('?'));
        assert!(app.state().show_help);
        assert_eq!(app.handle(AppEvent::TogglePause), None);
        app.handle(AppEvent::Escape);
        assert!(!app.state().show_help);
    }

    #[test]
    fn quit_sets_flag() {
        let mut app = app();
        app.handle(AppEvent::Quit);
        assert!(app.state().quit);
    }

    #[test]
    fn ingest_drains_without_blocking() {
        let mut app = app();
        let (tx, mut rx) = mpsc::channel(8);
        for n in 0..3 {
            tx.try_send(record(n)).unwrap();
        }
        assert_eq!(app.ingest(&mut rx), 3);
        assert_eq!(app.ingest(&mut rx), 0);

        drop(tx);
        assert_eq!(app.ingest(&mut rx), 0);
        assert_eq!(app.state().stream.len(), 3);
    }

    #[test]
    fn clear_command_empties_pane() {
        let mut app = app();
        let (tx, mut rx) = mpsc::channel(8);
        tx.try_send(record(1)).unwrap();
        app.ingest(&mut rx);

        app.handle(AppEvent::Char(':'));
        type_str(&mut app, "clear");
        app.handle(AppEvent::Enter);
        assert!(app.state().stream.is_empty());
    }

    #[test]
    fn draws_without_panicking_on_tiny_terminal() {
        let app = app();
        let mut terminal = Terminal::new(TestBackend::new(10, 3)).unwrap();
        terminal.draw(|f| draw(f, app.state())).unwrap();
    }
}
