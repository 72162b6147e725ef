//! # chatwire
//!
//! Client side of a streaming chat session with an agent server.
//!
//! The server pushes JSON events over `GET /events?session_id=...`
//! (Server-Sent Events); the client submits user text to
//! `POST /send_message` and out-of-band directives to `POST /control`.
//! [`ChatWidget`] binds those three endpoints to a [`ChatView`]: it renders
//! each event by type, echoes user input, keeps a connection indicator and
//! reopens a closed stream after a fixed delay.
//!
//! Two views ship with the crate: [`MemoryView`] (headless, used in tests)
//! and [`TerminalView`] (colored stdout, used by the `chatwire` binary).

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod markdown;
pub mod sse;
pub mod stream;
pub mod terminal;
pub mod transport;
pub mod view;
pub mod widget;

pub use config::ChatConfig;
pub use error::ChatError;
pub use event::{
    ConnectionState, ControlCommand, ControlRequest, EventKind, MessageKind, SendMessageRequest,
    ServerEvent, SubmitResponse,
};
pub use markdown::{AnsiMarkdown, HtmlMarkdown, MarkdownFormatter};
pub use stream::{ReadyState, ReadyStateCell, StreamHandle, StreamSignal, StreamSink};
pub use terminal::TerminalView;
pub use transport::{ChatTransport, HttpTransport};
pub use view::{ChatView, InputHeight, MemoryView, MessageBody, MessageEntry};
pub use widget::{ChatWidget, Key, KeyPress, WidgetEvent, WidgetHandle};
