//! The widget's three external capabilities: subscribe, send a message, send
//! a control command.

use std::future::Future;

use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::event::{ControlRequest, SendMessageRequest, SubmitResponse};
use crate::stream::{spawn_event_stream, StreamHandle, StreamSink};

/// Network side of the widget.
///
/// `subscribe` must not block: it starts the subscription and returns a
/// handle whose ready state the widget polls when its reconnect timer fires.
pub trait ChatTransport: Send + Sync + 'static {
    fn subscribe(&self, session_id: &str, sink: StreamSink) -> Result<StreamHandle, ChatError>;

    fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> impl Future<Output = Result<SubmitResponse, ChatError>> + Send;

    fn send_control(
        &self,
        request: &ControlRequest,
    ) -> impl Future<Output = Result<SubmitResponse, ChatError>> + Send;
}

/// reqwest-backed transport talking to `/events`, `/send_message` and
/// `/control` under the configured base URL.
pub struct HttpTransport {
    config: ChatConfig,
    /// Submissions: connect and whole-request timeouts.
    client: Client,
    /// Event stream: connect timeout only.
    stream_client: Client,
}

impl HttpTransport {
    pub fn new(config: &ChatConfig) -> Self {
        // Client::builder() only fails in broken TLS environments; fall back
        // to a default client rather than refusing to start.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .unwrap_or_default();

        Self {
            config: config.clone(),
            client,
            stream_client,
        }
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<SubmitResponse, ChatError> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| ChatError::Request {
                url: url.to_string(),
                source,
            })?;

        // The status code is not consulted: the JSON body decides success,
        // and error responses carry a JSON body with the reason.
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|source| ChatError::Request {
            url: url.to_string(),
            source,
        })?;
        debug!(url = %url, status, "submission answered");

        serde_json::from_slice::<SubmitResponse>(&bytes).map_err(|e| ChatError::Decode {
            url: url.to_string(),
            status,
            detail: e.to_string(),
        })
    }
}

impl ChatTransport for HttpTransport {
    fn subscribe(&self, session_id: &str, sink: StreamSink) -> Result<StreamHandle, ChatError> {
        let mut config = self.config.clone();
        config.session_id = session_id.to_string();
        let url = config.events_url()?;
        Ok(spawn_event_stream(self.stream_client.clone(), url, sink))
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SubmitResponse, ChatError> {
        let url = self.config.endpoint("/send_message")?;
        self.post_json(url, request).await
    }

    async fn send_control(&self, request: &ControlRequest) -> Result<SubmitResponse, ChatError> {
        let url = self.config.endpoint("/control")?;
        self.post_json(url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ControlCommand;

    #[tokio::test]
    async fn test_send_message_bad_base_url_is_invalid_url() {
        let transport = HttpTransport::new(&ChatConfig::new("not a url", "s"));
        let req = SendMessageRequest {
            message: "hi".into(),
            session_id: "s".into(),
        };
        let err = transport.send_message(&req).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_send_control_unreachable_is_request_error() {
        // Port 9 (discard) on localhost is essentially never listening.
        let transport = HttpTransport::new(&ChatConfig::new("http://127.0.0.1:9", "s"));
        let req = ControlRequest {
            command: ControlCommand::Stop,
            session_id: "s".into(),
        };
        let err = transport.send_control(&req).await.unwrap_err();
        assert!(matches!(err, ChatError::Request { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_bad_base_url_fails_synchronously() {
        let transport = HttpTransport::new(&ChatConfig::new("::::", "s"));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let result = transport.subscribe("s", StreamSink::new(tx));
        assert!(matches!(result, Err(ChatError::InvalidUrl { .. })));
    }
}
