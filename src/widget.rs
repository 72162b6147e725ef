//! # ChatWidget
//!
//! Binds a [`ChatView`] to a [`ChatTransport`]: stream events become view
//! updates, submit keystrokes become outbound calls.
//!
//! ## Execution model
//!
//! One task owns the widget and drains a queue of [`WidgetEvent`]s. Network
//! calls and the reconnect timer run in spawned tasks that post their results
//! back into the same queue, so the view is only ever touched from the owning
//! task and stream frames are handled in delivery order.
//!
//! ```rust,ignore
//! let mut widget = ChatWidget::new(config, HttpTransport::new(&config), view, AnsiMarkdown);
//! let handle = widget.handle();
//! widget.init();
//! tokio::spawn(feed_input(handle));
//! widget.run().await;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::event::{
    ConnectionState, ControlCommand, ControlRequest, EventKind, MessageKind, SendMessageRequest,
    ServerEvent, SubmitResponse,
};
use crate::markdown::MarkdownFormatter;
use crate::stream::{ReadyState, StreamHandle, StreamSignal, StreamSink};
use crate::transport::ChatTransport;
use crate::view::{local_time_label, ChatView, InputHeight, MessageBody, MessageEntry};

/// Typed into the input on its own, requests a stop instead of a message.
pub const STOP_SENTINEL: &str = "!!";
/// Added to the measured content height when the input auto-grows.
pub const INPUT_HEIGHT_PADDING: u32 = 5;

pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_CONNECTION_ERROR: &str = "Connection Error";
pub const STATUS_FAILED_TO_CONNECT: &str = "Failed to Connect";
pub const STATUS_SEND_ERROR: &str = "Send Error";

pub const SEND_MESSAGE_FAILED: &str = "Error: Failed to send message";
pub const SEND_COMMAND_FAILED: &str = "Error: Failed to send command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Char(char),
}

/// A keydown on the text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
}

impl KeyPress {
    pub fn ctrl_enter() -> Self {
        Self {
            key: Key::Enter,
            ctrl: true,
        }
    }

    pub fn is_submit(&self) -> bool {
        self.ctrl && self.key == Key::Enter
    }
}

/// Which endpoint a finished submission went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Message,
    Control,
}

/// Everything the widget reacts to.
#[derive(Debug)]
pub enum WidgetEvent {
    Key(KeyPress),
    /// The input's value changed to this text.
    Input(String),
    Stream(StreamSignal),
    /// The fixed reconnect delay after a stream error has elapsed.
    ReconnectDue,
    Submitted {
        submission: Submission,
        outcome: Result<SubmitResponse, ChatError>,
    },
    Shutdown,
}

/// Cloneable sender for input producers (keyboard, stdin, tests).
#[derive(Debug, Clone)]
pub struct WidgetHandle {
    tx: mpsc::UnboundedSender<WidgetEvent>,
}

impl WidgetHandle {
    /// Returns false once the widget has stopped.
    pub fn send(&self, event: WidgetEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn key(&self, key: KeyPress) -> bool {
        self.send(WidgetEvent::Key(key))
    }

    pub fn input(&self, value: impl Into<String>) -> bool {
        self.send(WidgetEvent::Input(value.into()))
    }

    pub fn shutdown(&self) -> bool {
        self.send(WidgetEvent::Shutdown)
    }
}

pub struct ChatWidget<T, V, M> {
    config: ChatConfig,
    transport: Arc<T>,
    view: V,
    markdown: M,
    stream: Option<StreamHandle>,
    events_tx: mpsc::UnboundedSender<WidgetEvent>,
    events_rx: mpsc::UnboundedReceiver<WidgetEvent>,
}

impl<T, V, M> ChatWidget<T, V, M>
where
    T: ChatTransport,
    V: ChatView,
    M: MarkdownFormatter,
{
    pub fn new(config: ChatConfig, transport: T, view: V, markdown: M) -> Self {
        Self::with_shared_transport(config, Arc::new(transport), view, markdown)
    }

    pub fn with_shared_transport(
        config: ChatConfig,
        transport: Arc<T>,
        view: V,
        markdown: M,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            view,
            markdown,
            stream: None,
            events_tx,
            events_rx,
        }
    }

    /// Start listening: open the event stream. Input events are accepted from
    /// any [`WidgetHandle`] as soon as the widget exists.
    pub fn init(&mut self) {
        self.connect_sse();
    }

    pub fn handle(&self) -> WidgetHandle {
        WidgetHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// `None` before the first subscription, or if it could not be created.
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.stream.as_ref().map(StreamHandle::ready_state)
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Process events until [`WidgetEvent::Shutdown`].
    pub async fn run(mut self) -> V {
        while let Some(event) = self.events_rx.recv().await {
            if matches!(event, WidgetEvent::Shutdown) {
                info!("chat widget shutting down");
                break;
            }
            self.dispatch(event);
        }
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.view
    }

    /// Wait for the next queued event without handling it.
    pub async fn next_event(&mut self) -> Option<WidgetEvent> {
        self.events_rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<WidgetEvent> {
        self.events_rx.try_recv().ok()
    }

    pub fn dispatch(&mut self, event: WidgetEvent) {
        match event {
            WidgetEvent::Key(key) => self.handle_key(key),
            WidgetEvent::Input(value) => {
                self.view.set_input_value(&value);
                self.handle_input_changed();
            }
            WidgetEvent::Stream(signal) => self.handle_stream_signal(signal),
            WidgetEvent::ReconnectDue => self.handle_reconnect_due(),
            WidgetEvent::Submitted {
                submission,
                outcome,
            } => self.handle_submitted(submission, outcome),
            WidgetEvent::Shutdown => {}
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub fn handle_key(&mut self, key: KeyPress) {
        if !key.is_submit() {
            return;
        }
        let value = self.view.input_value();
        let message = value.trim();

        if message == STOP_SENTINEL {
            self.send_control(ControlCommand::Stop);
        } else {
            self.send_message(message);
        }
    }

    /// Auto-grow: measure at natural height, then fix to content plus padding.
    pub fn handle_input_changed(&mut self) {
        self.view.set_input_height(InputHeight::Auto);
        let content = self.view.input_content_height();
        self.view
            .set_input_height(InputHeight::Fixed(content + INPUT_HEIGHT_PADDING));
    }

    fn reset_input(&mut self) {
        self.view.set_input_value("");
        self.view.set_input_height(InputHeight::Auto);
    }

    // -----------------------------------------------------------------------
    // Stream
    // -----------------------------------------------------------------------

    pub fn connect_sse(&mut self) {
        let sink = StreamSink::new(self.events_tx.clone());
        match self.transport.subscribe(&self.config.session_id, sink) {
            Ok(handle) => {
                debug!(session_id = %self.config.session_id, "event stream subscribed");
                self.stream = Some(handle);
            }
            Err(e) => {
                error!(error = %e, "Failed to connect event stream");
                self.update_status(STATUS_FAILED_TO_CONNECT, ConnectionState::Disconnected);
            }
        }
    }

    fn handle_stream_signal(&mut self, signal: StreamSignal) {
        match signal {
            StreamSignal::Open => debug!("event stream open"),
            StreamSignal::Message(data) => self.handle_frame(&data),
            StreamSignal::Error => self.handle_stream_error(),
        }
    }

    /// One inbound frame payload. Unparseable payloads are logged and dropped.
    pub fn handle_frame(&mut self, data: &str) {
        match ServerEvent::parse(data) {
            Ok(event) => self.handle_server_message(event),
            Err(e) => error!(error = %e, "Error parsing stream message"),
        }
    }

    pub fn handle_server_message(&mut self, event: ServerEvent) {
        self.update_status(STATUS_CONNECTED, ConnectionState::Connected);

        let ServerEvent {
            kind,
            message,
            timestamp,
        } = event;

        match kind {
            EventKind::Status => self.update_project_status(&message),
            EventKind::End => self.add_message(&message, MessageKind::Finished, timestamp),
            EventKind::Error => self.add_message(&message, MessageKind::Error, timestamp),
            EventKind::Warning => self.add_message(&message, MessageKind::Warning, timestamp),
            EventKind::Heartbeat => {}
            EventKind::Markdown => self.add_message(&message, MessageKind::Markdown, timestamp),
            EventKind::Other(_) => self.add_message(&message, MessageKind::Bot, timestamp),
        }
    }

    /// Mark the connection broken and schedule one reopen attempt. Each error
    /// schedules its own timer; they are not deduplicated.
    pub fn handle_stream_error(&mut self) {
        self.update_status(STATUS_CONNECTION_ERROR, ConnectionState::Disconnected);

        let delay = self.config.reconnect_delay();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(WidgetEvent::ReconnectDue);
        });
    }

    fn handle_reconnect_due(&mut self) {
        match self.ready_state() {
            Some(ReadyState::Closed) => {
                info!("event stream closed, reconnecting");
                self.connect_sse();
            }
            Some(state) => debug!(?state, "event stream still alive, reconnect skipped"),
            None => debug!("no event stream to reconnect"),
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Echo, clear the input and the message list, then submit. Empty text
    /// does nothing.
    pub fn send_message(&mut self, message: &str) {
        if message.is_empty() {
            return;
        }

        self.add_message(message, MessageKind::User, None);
        self.reset_input();
        self.view.clear_messages();

        let request = SendMessageRequest {
            message: message.to_string(),
            session_id: self.config.session_id.clone(),
        };
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.send_message(&request).await;
            let _ = tx.send(WidgetEvent::Submitted {
                submission: Submission::Message,
                outcome,
            });
        });
    }

    /// Clear the input and submit a control directive. The message list and
    /// user slot are left alone.
    pub fn send_control(&mut self, command: ControlCommand) {
        self.reset_input();

        let request = ControlRequest {
            command,
            session_id: self.config.session_id.clone(),
        };
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.send_control(&request).await;
            let _ = tx.send(WidgetEvent::Submitted {
                submission: Submission::Control,
                outcome,
            });
        });
    }

    fn handle_submitted(
        &mut self,
        submission: Submission,
        outcome: Result<SubmitResponse, ChatError>,
    ) {
        match outcome {
            Ok(response) if response.is_success() => {
                debug!(?submission, "submission accepted");
            }
            Ok(response) => {
                warn!(?submission, reason = response.reason(), "submission rejected");
                self.add_message(
                    &format!("Error: {}", response.reason()),
                    MessageKind::Error,
                    None,
                );
            }
            Err(e) => match submission {
                Submission::Message => {
                    error!(error = %e, "Error sending message");
                    self.add_message(SEND_MESSAGE_FAILED, MessageKind::Error, None);
                    self.update_status(STATUS_SEND_ERROR, ConnectionState::Disconnected);
                }
                Submission::Control => {
                    error!(error = %e, "Error sending command");
                    self.add_message(SEND_COMMAND_FAILED, MessageKind::Error, None);
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// User text overwrites the user slot; everything else is appended to the
    /// list, followed by a scroll to the bottom.
    pub fn add_message(&mut self, message: &str, kind: MessageKind, timestamp: Option<f64>) {
        if kind == MessageKind::User {
            self.view.show_user_message(message);
            return;
        }

        let body = if kind == MessageKind::Markdown {
            MessageBody::Markup(self.markdown.format(message))
        } else {
            MessageBody::Text(message.to_string())
        };

        self.view.append_message(MessageEntry {
            kind,
            body,
            time_label: timestamp.and_then(local_time_label),
        });
        self.view.scroll_to_bottom();
    }

    pub fn update_status(&mut self, text: &str, state: ConnectionState) {
        self.view.set_connection_status(text, state);
    }

    pub fn update_project_status(&mut self, text: &str) {
        self.view.set_project_status(text);
    }
}
