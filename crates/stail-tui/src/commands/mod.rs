// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

use crate::{
    app::{AppState, StreamCommand},
    theme::Theme,
};

/// A parsed, validated command ready to be executed by the app shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Stop the stream and close the app
    Quit,
    Pause,
    Resume,
    // Replace the filter query; empty clears it
    Query(String),
    // Drop every record from the log pane
    Clear,
    // Display help
    Help,
    // Change theme
    Theme(String),
    // Toggle display of timestamps
    Timestamps,
    // Toggle display of tags
    Tags,
    // Jump to end of log stream and follow
    Tail,
}

impl Command {
    /// Parse a raw command string (the text after the `:` prefix).
    ///
    /// Returns `Ok(cmd)` on success, `Err(message)` on failure. An empty
    /// string returns `Err("")` as a sentinel meaning "close without acting".
    pub fn parse(input: &str) -> Result<Command, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(String::new());
        }

        let (word, rest) = input
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((input, ""));

        match word {
            "q" | "quit" | "q!" | "quit!" => Ok(Command::Quit),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "query" => Ok(Command::Query(rest.to_string())),
            "clear" => Ok(Command::Clear),
            "help" => Ok(Command::Help),
            "ts" | "timestamps" => Ok(Command::Timestamps),
            "tags" => Ok(Command::Tags),
            "tail" => Ok(Command::Tail),
            "theme" => {
                if rest.is_empty() {
                    Err("usage: theme <default|gruvbox>".to_string())
                } else {
                    Ok(Command::Theme(rest.to_string()))
                }
            }
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// Execute a parsed [`Command`] against the application state. Commands that
/// drive the stream are handed back for the event loop to forward.
pub fn execute_command(s: &mut AppState, cmd: Command) -> Option<StreamCommand> {
    match cmd {
        Command::Quit => {
            s.quit = true;
            None
        }
        Command::Pause => Some(StreamCommand::Pause),
        Command::Resume => Some(StreamCommand::Resume),
        Command::Query(text) => {
            s.query.set(&text);
            Some(StreamCommand::UpdateQuery(text))
        }
        Command::Clear => {
            s.stream.clear();
            None
        }
        Command::Help => {
            s.show_help = !s.show_help;
            None
        }
        Command::Theme(name) => {
            match Theme::by_name(&name) {
                Some(theme) => s.theme = theme,
                None => s.command_bar.error = Some(format!("unknown theme: {name}")),
            }
            None
        }
        Command::Timestamps => {
            s.stream.show_timestamps = !s.stream.show_timestamps;
            None
        }
        Command::Tags => {
            s.stream.show_tags = !s.stream.show_tags;
            None
        }
        Command::Tail => {
            s.stream.follow();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_quit() {
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("  quit  "), Ok(Command::Quit));
    }

    #[test]
    fn parse_stream_controls() {
        assert_eq!(Command::parse("pause"), Ok(Command::Pause));
        assert_eq!(Command::parse("resume"), Ok(Command::Resume));
    }

    #[test]
    fn parse_query_keeps_inner_spaces() {
        assert_eq!(
            Command::parse("query service:api  status:error"),
            Ok(Command::Query("service:api  status:error".to_string()))
        );
        assert_eq!(Command::parse("query"), Ok(Command::Query(String::new())));
    }

    #[test]
    fn parse_theme() {
        assert_eq!(
            Command::parse("theme gruvbox"),
            Ok(Command::Theme("gruvbox".to_string()))
        );
        assert!(Command::parse("theme").is_err());
    }

    #[test]
    fn parse_empty_returns_sentinel_err() {
        assert_eq!(Command::parse(""), Err(String::new()));
        assert_eq!(Command::parse("  "), Err(String::new()));
    }

    #[test]
    fn parse_unknown() {
        let err = Command::parse("frobnicate").unwrap_err();
        assert!(err.contains("frobnicate"));
    }
}
