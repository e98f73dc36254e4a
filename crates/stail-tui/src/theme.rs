//! Colour theme for the stail TUI.
//!
//! Themes are defined as TOML files embedded in the binary via
//! [`include_str!`] so the application works without any files on disk. Call
//! [`Theme::load_default`] at startup and pass the result through the
//! application as a shared reference.
//!
//! # Level styles
//!
//! Datadog reports a free-form `status` per log. The syslog-style names it
//! uses are folded onto six buckets (`trace`, `debug`, `info`, `warn`,
//! `error`, `fatal`) before lookup; unknown statuses render unstyled.
//!
//! # Tag colours
//!
//! Tags are hashed to a stable index into the palette so the same
//! `service:api` tag always gets the same colour within a session.

use config::{Config, File, FileFormat};
use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;
use stail_core::StreamState;

const DEFAULT_THEME_SRC: &str = include_str!("themes/default.toml");
const GRUVBOX_DARK_THEME_SRC: &str = include_str!("themes/gruvbox_dark.toml");

// ---------------------------------------------------------------------------
// Raw (serde) types, mirroring the TOML structure
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawStyle {
    fg: Option<String>,
    bg: Option<String>,
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    dim: bool,
    #[serde(default)]
    italic: bool,
    #[serde(default)]
    underlined: bool,
}

impl RawStyle {
    fn into_style(self) -> Style {
        let mut style = Style::default();
        if let Some(c) = self.fg.as_deref().and_then(parse_color) {
            style = style.fg(c);
        }
        if let Some(c) = self.bg.as_deref().and_then(parse_color) {
            style = style.bg(c);
        }
        if self.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.dim {
            style = style.add_modifier(Modifier::DIM);
        }
        if self.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.underlined {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        style
    }
}

#[derive(Debug, Deserialize)]
struct RawLevels {
    trace: RawStyle,
    debug: RawStyle,
    info: RawStyle,
    warn: RawStyle,
    error: RawStyle,
    fatal: RawStyle,
}

#[derive(Debug, Deserialize)]
struct RawBorders {
    focused: RawStyle,
    unfocused: RawStyle,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    running: RawStyle,
    paused: RawStyle,
    stopped: RawStyle,
}

#[derive(Debug, Deserialize)]
struct RawTags {
    palette: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTheme {
    name: String,
    levels: RawLevels,
    borders: RawBorders,
    status: RawStatus,
    tags: RawTags,
}

// ---------------------------------------------------------------------------
// Public Theme type
// ---------------------------------------------------------------------------

/// Application colour theme. All styles are pre-resolved ratatui [`Style`]
/// values.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,

    pub level_trace: Style,
    pub level_debug: Style,
    pub level_info: Style,
    pub level_warn: Style,
    pub level_error: Style,
    pub level_fatal: Style,

    /// Border style for the currently focused pane.
    pub border_focused: Style,
    /// Border style for unfocused panes.
    pub border_unfocused: Style,

    /// Status-bar badge for each stream state.
    pub status_running: Style,
    pub status_paused: Style,
    pub status_stopped: Style,

    tag_palette: Vec<Color>,
}

impl Theme {
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed.
    pub fn load_default() -> Self {
        Self::from_toml_str(DEFAULT_THEME_SRC).expect("embedded default theme must be valid TOML")
    }

    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed.
    pub fn load_gruvbox_dark() -> Self {
        Self::from_toml_str(GRUVBOX_DARK_THEME_SRC)
            .expect("embedded gruvbox dark theme must be valid TOML")
    }

    /// Resolve a theme by name, as typed in `:theme <name>`.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "default" => Some(Self::load_default()),
            "gruvbox" | "gruvbox_dark" | "gruvbox-dark" => Some(Self::load_gruvbox_dark()),
            _ => None,
        }
    }

    /// Parse a theme from a TOML string. Unknown keys are ignored.
    pub fn from_toml_str(src: &str) -> anyhow::Result<Self> {
        let raw: RawTheme = Config::builder()
            .add_source(File::from_str(src, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        Ok(Self {
            name: raw.name,
            level_trace: raw.levels.trace.into_style(),
            level_debug: raw.levels.debug.into_style(),
            level_info: raw.levels.info.into_style(),
            level_warn: raw.levels.warn.into_style(),
            level_error: raw.levels.error.into_style(),
            level_fatal: raw.levels.fatal.into_style(),
            border_focused: raw.borders.focused.into_style(),
            border_unfocused: raw.borders.unfocused.into_style(),
            status_running: raw.status.running.into_style(),
            status_paused: raw.status.paused.into_style(),
            status_stopped: raw.status.stopped.into_style(),
            tag_palette: raw.tags.palette.iter().filter_map(|s| parse_color(s)).collect(),
        })
    }

    /// Style for a Datadog `status` value, or the default style when the
    /// status is empty or unknown.
    pub fn level_style(&self, status: &str) -> Style {
        match status.to_ascii_lowercase().as_str() {
            "trace" => self.level_trace,
            "debug" => self.level_debug,
            "info" | "notice" | "ok" => self.level_info,
            "warn" | "warning" => self.level_warn,
            "error" | "err" => self.level_error,
            "critical" | "alert" | "emergency" | "emerg" | "fatal" => self.level_fatal,
            _ => Style::default(),
        }
    }

    pub fn status_style(&self, state: StreamState) -> Style {
        match state {
            StreamState::Running => self.status_running,
            StreamState::Paused => self.status_paused,
            StreamState::Stopped => self.status_stopped,
        }
    }

    /// Stable colour for a tag within a session.
    pub fn tag_style(&self, tag: &str) -> Style {
        if self.tag_palette.is_empty() {
            return Style::default();
        }
        let idx = stable_hash(tag) % self.tag_palette.len();
        Style::default().fg(self.tag_palette[idx])
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// djb2-style hash, stable across Rust versions and process restarts.
fn stable_hash(s: &str) -> usize {
    s.bytes().fold(5381usize, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(b as usize)
    })
}

/// Parse a colour name into a ratatui [`Color`].
///
/// Accepts:
/// - Named terminal colours (case-insensitive): `red`, `dark_gray`, etc.
/// - Hex RGB: `#rrggbb`
/// - 256-colour indexed: `indexed:N`
fn parse_color(s: &str) -> Option<Color> {
    match s.to_ascii_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "gray" | "grey" => Some(Color::Gray),
        "dark_gray" | "darkgray" | "dark_grey" | "darkgrey" => Some(Color::DarkGray),
        "light_red" => Some(Color::LightRed),
        "light_green" => Some(Color::LightGreen),
        "light_yellow" => Some(Color::LightYellow),
        "light_blue" => Some(Color::LightBlue),
        "light_magenta" => Some(Color::LightMagenta),
        "light_cyan" => Some(Color::LightCyan),
        "white" => Some(Color::White),
        s if s.starts_with('#') && s.len() == 7 => {
            let r = u8::from_str_radix(&s[1..3], 16).ok()?;
            let g = u8::from_str_radix(&s[3..5], 16).ok()?;
            let b = u8::from_str_radix(&s[5..7], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        s if s.starts_with("indexed:") => {
            let n: u8 = s["indexed:".len()..].parse().ok()?;
            Some(Color::Indexed(n))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_theme_loads() {
        let theme = Theme::load_default();
        assert_eq!(theme.name, "default");
        assert_ne!(theme.level_error, Style::default());
        assert_ne!(theme.border_focused, Style::default());
        assert_ne!(theme.status_paused, Style::default());
        assert!(!theme.tag_palette.is_empty());
    }

    #[test]
    fn gruvbox_dark_theme_loads() {
        let theme = Theme::load_gruvbox_dark();
        assert_eq!(theme.name, "gruvbox");
        assert_ne!(theme.level_error, Style::default());
        assert!(!theme.tag_palette.is_empty());
    }

    #[test]
    fn by_name_resolves_aliases() {
        assert_eq!(Theme::by_name("Gruvbox-Dark").map(|t| t.name), Some("gruvbox".into()));
        assert_eq!(Theme::by_name("default").map(|t| t.name), Some("default".into()));
        assert!(Theme::by_name("solarized").is_none());
    }

    #[test]
    fn datadog_statuses_fold_onto_levels() {
        let theme = Theme::load_default();
        assert_eq!(theme.level_style("critical"), theme.level_fatal);
        assert_eq!(theme.level_style("Emergency"), theme.level_fatal);
        assert_eq!(theme.level_style("warning"), theme.level_warn);
        assert_eq!(theme.level_style("notice"), theme.level_info);
        assert_eq!(theme.level_style("ERROR"), theme.level_error);
        assert_eq!(theme.level_style(""), Style::default());
        assert_eq!(theme.level_style("chatty"), Style::default());
    }

    #[test]
    fn tag_style_is_stable() {
        let theme = Theme::load_default();
        assert_eq!(theme.tag_style("service:api"), theme.tag_style("service:api"));
    }

    #[test]
    fn different_tags_can_differ() {
        let theme = Theme::load_default();
        let styles: Vec<_> = ["env:prod", "service:api", "host:a", "team:core", "region:eu", "v:2"]
            .iter()
            .map(|n| theme.tag_style(n))
            .collect();
        let unique: std::collections::HashSet<_> = styles.iter().collect();
        assert!(unique.len() > 1, "all tags mapped to the same colour");
    }

    #[test]
    fn parse_hex_color() {
        assert_eq!(parse_color("#ff0080"), Some(Color::Rgb(255, 0, 128)));
    }

    #[test]
    fn parse_indexed_color() {
        assert_eq!(parse_color("indexed:42"), Some(Color::Indexed(42)));
    }

    #[test]
    fn parse_unknown_color_returns_none() {
        assert_eq!(parse_color("chartreuse"), None);
    }
}
