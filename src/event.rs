//! Wire types: inbound stream envelopes and outbound request/response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// The `type` tag of a server event.
///
/// Tags outside the known set land in [`EventKind::Other`] and are rendered as
/// ordinary bot output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Status,
    End,
    Error,
    Warning,
    Heartbeat,
    Markdown,
    /// Unrecognized tag, or `None` when the envelope had no string `type`.
    Other(Option<String>),
}

impl EventKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("status") => EventKind::Status,
            Some("end") => EventKind::End,
            Some("error") => EventKind::Error,
            Some("warning") => EventKind::Warning,
            Some("heartbeat") => EventKind::Heartbeat,
            Some("markdown") => EventKind::Markdown,
            other => EventKind::Other(other.map(str::to_string)),
        }
    }
}

/// One parsed server-push frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub kind: EventKind,
    pub message: String,
    /// Seconds since the Unix epoch, fractional.
    pub timestamp: Option<f64>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Value,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    timestamp: Value,
}

impl ServerEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse a frame's `data` payload.
    ///
    /// Extra fields such as `role` are ignored. A missing or `null` message
    /// becomes the empty string; any other non-string message is kept as its
    /// JSON text.
    pub fn parse(data: &str) -> Result<Self, ChatError> {
        let value: Value = serde_json::from_str(data)?;
        if !value.is_object() {
            return Err(ChatError::MalformedEvent(format!(
                "expected a JSON object, got {}",
                json_type_name(&value)
            )));
        }
        let env: Envelope = serde_json::from_value(value)?;

        let message = match env.message {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Ok(ServerEvent {
            kind: EventKind::from_tag(env.kind.as_str()),
            message,
            timestamp: env.timestamp.as_f64().filter(|t| t.is_finite()),
        })
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Rendering categories
// ---------------------------------------------------------------------------

/// How a message is displayed. `User` goes to the dedicated user slot; all
/// other kinds are appended to the message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    User,
    Bot,
    Finished,
    Error,
    Warning,
    Markdown,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Bot => "bot",
            MessageKind::Finished => "finished",
            MessageKind::Error => "error",
            MessageKind::Warning => "warning",
            MessageKind::Markdown => "markdown",
        }
    }

    /// Class list of a list entry, e.g. `"message finished-message"`.
    pub fn css_class(self) -> String {
        format!("message {}-message", self.as_str())
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection-health class of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }

    pub fn css_class(self) -> String {
        format!("status {}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Body of `POST /send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Stop,
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::Stop => write!(f, "stop"),
        }
    }
}

/// Body of `POST /control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub session_id: String,
}

/// Response of both submission endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmitResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Server-supplied reason, or a placeholder when the server sent none.
    pub fn reason(&self) -> &str {
        self.message.as_deref().unwrap_or("unknown error")
    }
}
