use std::io::{self, Write};

use colored::*;

use crate::event::{ConnectionState, MessageKind};
use crate::view::{ChatView, InputHeight, MessageBody, MessageEntry};

/// Colored, append-only terminal rendering of a [`ChatView`].
///
/// A terminal cannot take back printed lines, so clearing the list prints a
/// rule instead, and status changes are printed as they happen (repeats of
/// the current status are suppressed).
pub struct TerminalView<W: Write = io::Stdout> {
    out: W,
    input: String,
    input_height: InputHeight,
    connection: Option<(String, ConnectionState)>,
    project: String,
}

impl TerminalView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            input: String::new(),
            input_height: InputHeight::Auto,
            connection: None,
            project: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn input_height(&self) -> InputHeight {
        self.input_height
    }

    // Write errors on a terminal (closed pipe) have no one to report to.
    fn line(&mut self, text: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn paint(kind: MessageKind, text: &str) -> ColoredString {
        match kind {
            MessageKind::Finished => text.bright_green(),
            MessageKind::Error => text.bright_red(),
            MessageKind::Warning => text.yellow(),
            MessageKind::User | MessageKind::Bot | MessageKind::Markdown => text.normal(),
        }
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn show_user_message(&mut self, text: &str) {
        self.line(format!("{} {}", "You:".bright_yellow().bold(), text.bright_white()));
    }

    fn append_message(&mut self, entry: MessageEntry) {
        match &entry.body {
            // Formatter output already carries its own styling.
            MessageBody::Markup(markup) => self.line(markup),
            MessageBody::Text(text) => {
                let painted = Self::paint(entry.kind, text);
                self.line(painted);
            }
        }
        if let Some(label) = &entry.time_label {
            self.line(label.dimmed());
        }
    }

    fn clear_messages(&mut self) {
        self.line("=".repeat(50).bright_blue());
    }

    fn scroll_to_bottom(&mut self) {
        let _ = self.out.flush();
    }

    fn set_connection_status(&mut self, text: &str, state: ConnectionState) {
        let next = (text.to_string(), state);
        if self.connection.as_ref() == Some(&next) {
            return;
        }
        let badge = match state {
            ConnectionState::Connected => format!("[{}]", text).bright_green(),
            ConnectionState::Disconnected => format!("[{}]", text).bright_red(),
        };
        self.line(badge);
        self.connection = Some(next);
    }

    fn set_project_status(&mut self, text: &str) {
        if self.project == text {
            return;
        }
        self.project = text.to_string();
        self.line(format!("{} {}", "Project:".bright_cyan(), text));
    }

    fn input_value(&self) -> String {
        self.input.clone()
    }

    fn set_input_value(&mut self, value: &str) {
        self.input = value.to_string();
    }

    /// Rows the composed input occupies.
    fn input_content_height(&self) -> u32 {
        self.input.split('\n').count() as u32
    }

    fn set_input_height(&mut self, height: InputHeight) {
        self.input_height = height;
    }
}
