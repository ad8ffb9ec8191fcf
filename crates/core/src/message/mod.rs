//! Human readable status lines and result messages.
//!
//! Lines are built once from styled segments and rendered either with ANSI
//! colours (for the terminal) or plain (for the JSON error report).

mod lines;

pub use lines::*;

use std::fmt::Display;
use std::io::IsTerminal;

/// Determine if color output should be enabled.
///
/// Priority: `NO_COLOR=1` disables, `COLOR=1` forces, otherwise TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

const RESET: &str = "\x1b[0m";

/// Colour role of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Green,
    Magenta,
    Blue,
    Red,
    /// Bright white, bold. Used for ids, names and sizes.
    Value,
}

impl Tone {
    fn code(&self) -> Option<&'static str> {
        match self {
            Tone::Plain => None,
            Tone::Green => Some("\x1b[32m"),
            Tone::Magenta => Some("\x1b[35m"),
            Tone::Blue => Some("\x1b[34m"),
            Tone::Red => Some("\x1b[31m"),
            Tone::Value => Some("\x1b[1;97m"),
        }
    }
}

/// A line of text made of coloured segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Styled {
    segments: Vec<(Tone, String)>,
}

impl Styled {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, tone: Tone, text: impl Display) -> Self {
        self.segments.push((tone, text.to_string()));
        self
    }

    pub fn plain(self, text: impl Display) -> Self {
        self.push(Tone::Plain, text)
    }

    pub fn value(self, text: impl Display) -> Self {
        self.push(Tone::Value, text)
    }

    /// Append every segment of another line.
    pub fn append(mut self, other: Styled) -> Self {
        self.segments.extend(other.segments);
        self
    }

    /// Render with ANSI escapes when `color` is set.
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        for (tone, text) in &self.segments {
            match tone.code() {
                Some(code) if color => {
                    out.push_str(code);
                    out.push_str(text);
                    out.push_str(RESET);
                }
                _ => out.push_str(text),
            }
        }
        out
    }

    pub fn plain_text(&self) -> String {
        self.render(false)
    }
}
