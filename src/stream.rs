//! Server-push subscription with browser `EventSource` semantics.
//!
//! The subscription task owns the HTTP connection and reports back to the
//! widget through a [`StreamSink`]. It reconnects on its own after a dropped
//! connection (state [`ReadyState::Connecting`]) and gives up only when the
//! server answers with a non-200 status or a non-event-stream content type
//! (state [`ReadyState::Closed`]). The widget's own reconnect timer only acts
//! on the second case.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::sse::SseDecoder;
use crate::widget::WidgetEvent;

/// Default reconnection time of a stream before the server sends `retry:`.
pub const DEFAULT_STREAM_RETRY: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

/// Shared, lock-free view of a stream's [`ReadyState`].
#[derive(Debug, Clone)]
pub struct ReadyStateCell(Arc<AtomicU8>);

impl ReadyStateCell {
    pub fn new(state: ReadyState) -> Self {
        Self(Arc::new(AtomicU8::new(Self::encode(state))))
    }

    pub fn get(&self) -> ReadyState {
        match self.0.load(Ordering::Acquire) {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }

    pub fn set(&self, state: ReadyState) {
        self.0.store(Self::encode(state), Ordering::Release);
    }

    fn encode(state: ReadyState) -> u8 {
        match state {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closed => 2,
        }
    }
}

impl Default for ReadyStateCell {
    fn default() -> Self {
        Self::new(ReadyState::Connecting)
    }
}

/// What a subscription reports to the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Open,
    /// Payload of one default-typed frame.
    Message(String),
    /// Transport-level failure. Check the handle's ready state to tell a
    /// self-healing drop from a closed stream.
    Error,
}

/// Sending half handed to a transport when the widget subscribes.
#[derive(Debug, Clone)]
pub struct StreamSink {
    tx: mpsc::UnboundedSender<WidgetEvent>,
}

impl StreamSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<WidgetEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the widget is gone.
    pub fn emit(&self, signal: StreamSignal) -> bool {
        self.tx.send(WidgetEvent::Stream(signal)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owner's handle on a live subscription. Dropping it stops the task.
#[derive(Debug)]
pub struct StreamHandle {
    state: ReadyStateCell,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn new(state: ReadyStateCell, task: JoinHandle<()>) -> Self {
        Self {
            state,
            task: Some(task),
        }
    }

    /// A handle whose state is driven by someone else (no task to stop).
    pub fn detached(state: ReadyStateCell) -> Self {
        Self { state, task: None }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state.set(ReadyState::Closed);
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Why one connection attempt ended.
enum Outcome {
    /// Dropped or never reached; the stream will reconnect itself.
    Reestablish,
    /// Refused by the server; the stream is closed for good.
    Fail,
    /// The widget went away.
    Abandoned,
}

/// Spawn the subscription task for `url`.
pub fn spawn_event_stream(client: Client, url: Url, sink: StreamSink) -> StreamHandle {
    let state = ReadyStateCell::new(ReadyState::Connecting);
    let task = tokio::spawn(run_event_stream(client, url, state.clone(), sink));
    StreamHandle::new(state, task)
}

async fn run_event_stream(client: Client, url: Url, state: ReadyStateCell, sink: StreamSink) {
    let mut decoder = SseDecoder::new();

    loop {
        state.set(ReadyState::Connecting);
        decoder.reset_connection();

        match connect_once(&client, &url, &state, &sink, &mut decoder).await {
            Outcome::Abandoned => return,
            Outcome::Fail => {
                state.set(ReadyState::Closed);
                sink.emit(StreamSignal::Error);
                return;
            }
            Outcome::Reestablish => {
                state.set(ReadyState::Connecting);
                if !sink.emit(StreamSignal::Error) {
                    return;
                }
                let delay = decoder.retry().unwrap_or(DEFAULT_STREAM_RETRY);
                debug!(url = %url, delay_ms = delay.as_millis() as u64, "event stream reconnecting");
                tokio::time::sleep(delay).await;
                if sink.is_closed() {
                    return;
                }
            }
        }
    }
}

async fn connect_once(
    client: &Client,
    url: &Url,
    state: &ReadyStateCell,
    sink: &StreamSink,
    decoder: &mut SseDecoder,
) -> Outcome {
    let mut request = client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = decoder.last_event_id() {
        request = request.header("Last-Event-ID", id);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, url = %url, "event stream connection failed");
            return Outcome::Reestablish;
        }
    };

    if response.status() != StatusCode::OK {
        warn!(status = response.status().as_u16(), url = %url, "event stream refused");
        return Outcome::Fail;
    }
    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("text/event-stream"))
        .unwrap_or(false);
    if !is_event_stream {
        warn!(url = %url, "event stream response has wrong content type");
        return Outcome::Fail;
    }

    state.set(ReadyState::Open);
    info!(url = %url, "event stream open");
    if !sink.emit(StreamSignal::Open) {
        return Outcome::Abandoned;
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, url = %url, "event stream read failed");
                return Outcome::Reestablish;
            }
        };
        for frame in decoder.feed(&chunk) {
            if !frame.is_message() {
                debug!(event = %frame.event, "skipping named event");
                continue;
            }
            if !sink.emit(StreamSignal::Message(frame.data)) {
                return Outcome::Abandoned;
            }
        }
    }

    debug!(url = %url, "event stream ended by server");
    Outcome::Reestablish
}
