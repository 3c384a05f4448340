//! Gemini Live API client implementation.
//!
//! [`GeminiLiveConnector`] implements [`UpstreamConnector`] over the Gemini Live
//! `BidiGenerateContent` WebSocket. Each `open` performs the setup handshake,
//! optionally primes the session with shop context, and splits the socket into a
//! [`GeminiSender`] (write half) and a lazy event stream (read half).
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON messages (text or binary frames)
//! - Audio in: PCM 16-bit, 16kHz, mono, base64 encoded
//! - Audio out: PCM 16-bit, 24kHz, mono, base64 encoded

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::config::GEMINI_LIVE_URL;
use super::messages::{ClientMessage, ServerMessage};
use crate::core::realtime::base::{
    ClientFrame, LiveSessionConfig, RealtimeError, RealtimeResult, UpstreamConnector,
    UpstreamEvents, UpstreamSender, UpstreamSession,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Default time allowed for the setup handshake.
const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
///
/// Holds the process-wide API key and endpoint; shared by every bridge session.
#[derive(Clone)]
pub struct GeminiLiveConnector {
    api_key: String,
    endpoint: String,
    setup_timeout: Duration,
}

impl std::fmt::Debug for GeminiLiveConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveConnector")
            .field("endpoint", &self.endpoint)
            .field("setup_timeout", &self.setup_timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiLiveConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: GEMINI_LIVE_URL.to_string(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }

    /// Override the endpoint (used for regional endpoints and tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Build the WebSocket URL with the API key parameter.
    fn build_ws_url(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("Invalid Gemini endpoint: {e}"))
        })?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Wait for `setupComplete`, failing on close, transport error or timeout.
    async fn await_setup_complete(&self, source: &mut WsSource) -> RealtimeResult<()> {
        let handshake = async {
            while let Some(msg) = source.next().await {
                let msg = msg.map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
                match msg {
                    Message::Text(_) | Message::Binary(_) => {
                        let Some(server_msg) = parse_server_message(&msg) else {
                            continue;
                        };
                        if server_msg.is_setup_complete() {
                            return Ok(());
                        }
                        if let Some(error) = server_msg.error {
                            return Err(RealtimeError::ConnectionFailed(
                                error
                                    .message
                                    .unwrap_or_else(|| "setup rejected".to_string()),
                            ));
                        }
                        tracing::debug!("Ignoring Gemini message received before setupComplete");
                    }
                    Message::Close(frame) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "no close frame".to_string());
                        return Err(RealtimeError::ConnectionFailed(format!(
                            "Gemini closed the session during setup: {reason}"
                        )));
                    }
                    _ => {}
                }
            }
            Err(RealtimeError::ConnectionFailed(
                "Gemini closed the session during setup".to_string(),
            ))
        };

        tokio::time::timeout(self.setup_timeout, handshake)
            .await
            .map_err(|_| {
                RealtimeError::Timeout(format!(
                    "setupComplete not received within {}ms",
                    self.setup_timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl UpstreamConnector for GeminiLiveConnector {
    async fn open(
        &self,
        model: &str,
        config: &LiveSessionConfig,
        system_context: &str,
    ) -> RealtimeResult<UpstreamSession> {
        if self.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        if config.response_modalities.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "at least one response modality is required".to_string(),
            ));
        }

        let url = self.build_ws_url()?;
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        tracing::info!(model = %model, "Connected to Gemini Live API");

        let (sink, mut source) = ws_stream.split();
        let mut sender = GeminiSender::new(sink);

        sender
            .send_message(&ClientMessage::setup(model, config))
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        if let Err(e) = self.await_setup_complete(&mut source).await {
            let _ = sender.close().await;
            return Err(e);
        }
        tracing::debug!("Gemini Live setup complete");

        if !system_context.is_empty() {
            if let Err(e) = sender.send_message(&ClientMessage::priming(system_context)).await {
                let _ = sender.close().await;
                return Err(RealtimeError::ConnectionFailed(format!(
                    "Failed to send priming context: {e}"
                )));
            }
            tracing::debug!(bytes = system_context.len(), "Sent priming context");
        }

        Ok(UpstreamSession::new(Box::new(sender), event_stream(source)))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// =============================================================================
// Write Half
// =============================================================================

/// Write half of a Gemini Live session.
///
/// Frames are written straight to the socket sink, so a slow upstream blocks the
/// caller rather than growing a queue.
pub struct GeminiSender {
    sink: WsSink,
    closed: bool,
}

impl GeminiSender {
    fn new(sink: WsSink) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    async fn send_message(&mut self, message: &ClientMessage) -> RealtimeResult<()> {
        if self.closed {
            return Err(RealtimeError::SessionClosed(
                "upstream session already closed".to_string(),
            ));
        }
        let json = serde_json::to_string(message)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl UpstreamSender for GeminiSender {
    async fn send(&mut self, frame: ClientFrame) -> RealtimeResult<()> {
        self.send_message(&ClientMessage::from_frame(frame)).await
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink
            .close()
            .await
            .map_err(|e| RealtimeError::SendFailed(e.to_string()))
    }
}

// =============================================================================
// Read Half
// =============================================================================

fn parse_server_message(msg: &Message) -> Option<ServerMessage> {
    let parsed = match msg {
        Message::Text(text) => serde_json::from_str::<ServerMessage>(text.as_str()),
        Message::Binary(data) => serde_json::from_slice::<ServerMessage>(data),
        _ => return None,
    };
    match parsed {
        Ok(server_msg) => Some(server_msg),
        Err(e) => {
            tracing::warn!("Failed to parse Gemini message: {}", e);
            None
        }
    }
}

/// Turn the read half into the session's event sequence.
fn event_stream(mut source: WsSource) -> UpstreamEvents {
    let stream = async_stream::stream! {
        while let Some(msg) = source.next().await {
            match msg {
                Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                    if let Some(server_msg) = parse_server_message(&msg) {
                        for event in server_msg.into_events() {
                            yield Ok(event);
                        }
                    }
                }
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(f) if f.code != CloseCode::Normal => {
                            yield Err(RealtimeError::ReceiveFailed(format!(
                                "Gemini closed the session: {} {}",
                                u16::from(f.code),
                                f.reason
                            )));
                        }
                        _ => tracing::info!("Gemini Live session closed by server"),
                    }
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    yield Err(RealtimeError::ReceiveFailed(e.to_string()));
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ws_url_appends_key() {
        let connector = GeminiLiveConnector::new("test-key");
        let url = connector.build_ws_url().unwrap();
        assert!(url.as_str().starts_with(GEMINI_LIVE_URL));
        assert_eq!(url.query(), Some("key=test-key"));
    }

    #[test]
    fn test_build_ws_url_rejects_garbage_endpoint() {
        let connector = GeminiLiveConnector::new("k").with_endpoint("not a url");
        assert!(matches!(
            connector.build_ws_url(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_open_requires_api_key() {
        let connector = GeminiLiveConnector::new("");
        let result = connector
            .open("model", &LiveSessionConfig::default(), "")
            .await;
        match result {
            Err(RealtimeError::AuthenticationFailed(msg)) => {
                assert!(msg.contains("API key is required"));
            }
            other => panic!("Expected AuthenticationFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_open_requires_modalities() {
        let connector = GeminiLiveConnector::new("k");
        let config = LiveSessionConfig {
            response_modalities: Default::default(),
            ..Default::default()
        };
        let result = connector.open("model", &config, "").await;
        assert!(matches!(result, Err(RealtimeError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_open_unreachable_endpoint_is_connect_error() {
        let connector = GeminiLiveConnector::new("k")
            .with_endpoint("ws://127.0.0.1:1/live")
            .with_setup_timeout(Duration::from_millis(500));
        let err = connector
            .open("model", &LiveSessionConfig::default(), "")
            .await
            .expect_err("nothing listens on port 1");
        assert!(err.is_connect_error());
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(GeminiLiveConnector::new("k").provider_name(), "gemini");
    }
}
