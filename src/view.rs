//! The widget's display surface.
//!
//! A [`ChatView`] stands in for the four page anchors the widget binds to:
//! the message list, the user-message slot, the text input and the status
//! indicator (connection text + project text). The widget is its only writer.

use chrono::{Local, TimeZone};

use crate::event::{ConnectionState, MessageKind};

/// Body of a list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Shown verbatim, never interpreted as markup.
    Text(String),
    /// Formatter output, rendered as markup by the view.
    Markup(String),
}

impl MessageBody {
    pub fn as_str(&self) -> &str {
        match self {
            MessageBody::Text(s) | MessageBody::Markup(s) => s,
        }
    }
}

/// One rendered entry of the message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub kind: MessageKind,
    pub body: MessageBody,
    /// Local time-of-day label shown under the body.
    pub time_label: Option<String>,
}

impl MessageEntry {
    pub fn class_name(&self) -> String {
        self.kind.css_class()
    }
}

/// Height of the auto-growing input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputHeight {
    /// Natural height; lets the view measure its content.
    #[default]
    Auto,
    Fixed(u32),
}

pub trait ChatView {
    /// Overwrite the user-message slot.
    fn show_user_message(&mut self, text: &str);
    fn append_message(&mut self, entry: MessageEntry);
    fn clear_messages(&mut self);
    fn scroll_to_bottom(&mut self);

    fn set_connection_status(&mut self, text: &str, state: ConnectionState);
    fn set_project_status(&mut self, text: &str);

    fn input_value(&self) -> String;
    fn set_input_value(&mut self, value: &str);
    /// Height the input's content needs at the current width.
    fn input_content_height(&self) -> u32;
    fn set_input_height(&mut self, height: InputHeight);
}

/// `HH:MM:SS` in the local timezone for a fractional Unix timestamp.
///
/// Zero and non-finite timestamps get no label.
pub fn local_time_label(timestamp: f64) -> Option<String> {
    if timestamp == 0.0 || !timestamp.is_finite() {
        return None;
    }
    let millis = (timestamp * 1000.0).round() as i64;
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%H:%M:%S").to_string())
}

// ---------------------------------------------------------------------------
// MemoryView
// ---------------------------------------------------------------------------

/// Line height used by [`MemoryView`] to measure input content.
pub const MEMORY_LINE_HEIGHT: u32 = 20;

/// A view that only records state. Used headless and in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryView {
    pub user_message: String,
    pub messages: Vec<MessageEntry>,
    pub connection_text: String,
    pub connection_state: Option<ConnectionState>,
    pub project_text: String,
    pub input: String,
    pub input_height: InputHeight,
    /// Number of times the list was scrolled to its bottom edge.
    pub scrolls: usize,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_message(&self) -> Option<&MessageEntry> {
        self.messages.last()
    }
}

impl ChatView for MemoryView {
    fn show_user_message(&mut self, text: &str) {
        self.user_message = text.to_string();
    }

    fn append_message(&mut self, entry: MessageEntry) {
        self.messages.push(entry);
    }

    fn clear_messages(&mut self) {
        self.messages.clear();
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
    }

    fn set_connection_status(&mut self, text: &str, state: ConnectionState) {
        self.connection_text = text.to_string();
        self.connection_state = Some(state);
    }

    fn set_project_status(&mut self, text: &str) {
        self.project_text = text.to_string();
    }

    fn input_value(&self) -> String {
        self.input.clone()
    }

    fn set_input_value(&mut self, value: &str) {
        self.input = value.to_string();
    }

    fn input_content_height(&self) -> u32 {
        let lines = self.input.split('\n').count() as u32;
        lines * MEMORY_LINE_HEIGHT
    }

    fn set_input_height(&mut self, height: InputHeight) {
        self.input_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_label_format() {
        let label = local_time_label(1_700_000_000.0).expect("label");
        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid")
            .format("%H:%M:%S")
            .to_string();
        assert_eq!(label, expected);
        assert_eq!(label.len(), 8);
    }

    #[test]
    fn test_time_label_zero_is_none() {
        assert!(local_time_label(0.0).is_none());
    }

    #[test]
    fn test_time_label_nan_is_none() {
        assert!(local_time_label(f64::NAN).is_none());
        assert!(local_time_label(f64::INFINITY).is_none());
    }

    #[test]
    fn test_entry_class_name() {
        let entry = MessageEntry {
            kind: MessageKind::Warning,
            body: MessageBody::Text("careful".into()),
            time_label: None,
        };
        assert_eq!(entry.class_name(), "message warning-message");
        assert_eq!(entry.body.as_str(), "careful");
    }

    #[test]
    fn test_memory_view_content_height_counts_lines() {
        let mut view = MemoryView::new();
        view.set_input_value("one");
        assert_eq!(view.input_content_height(), MEMORY_LINE_HEIGHT);
        view.set_input_value("one\ntwo\nthree");
        assert_eq!(view.input_content_height(), 3 * MEMORY_LINE_HEIGHT);
    }

    #[test]
    fn test_memory_view_clear_messages() {
        let mut view = MemoryView::new();
        view.append_message(MessageEntry {
            kind: MessageKind::Bot,
            body: MessageBody::Text("x".into()),
            time_label: None,
        });
        view.clear_messages();
        assert!(view.messages.is_empty());
    }
}
