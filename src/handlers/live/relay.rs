//! Duplex relay between one client connection and one upstream session.
//!
//! A [`BridgeSession`] moves through `Connecting -> Active -> Draining -> Closed`.
//! While active, two spawned pumps run concurrently:
//!
//! - **inbound**: client message -> [`decode_client_frame`] -> upstream `send`
//! - **outbound**: upstream event -> [`encode_outbound_frame`] -> client write
//!
//! Each pump owns the halves it touches and hands them back when it stops, even
//! when its body panics, so steady-state traffic needs no locks. The first pump to stop decides the close
//! reason; the other is cancelled through a shared [`CancellationToken`] and
//! awaited before either transport is closed, and each transport is closed at
//! most once.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::core::context::{ShopContextProvider, resolve_context};
use crate::core::realtime::{
    LiveSessionConfig, RealtimeError, UpstreamConnector, UpstreamEvents, UpstreamSession,
};

use super::codec::{decode_client_frame, encode_error_frame, encode_outbound_frame};

/// WebSocket close codes used when ending a session.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const INTERNAL_ERROR: u16 = 1011;
    pub const TRY_AGAIN_LATER: u16 = 1013;
}

// =============================================================================
// Client Transport
// =============================================================================

/// Error on the client connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("client connection closed")]
    Closed,

    #[error("client transport error: {0}")]
    Io(String),
}

/// One message read from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    Binary(Bytes),
    /// The client sent a close frame.
    Close,
}

/// Read half of the client connection.
#[async_trait]
pub trait ClientSource: Send + 'static {
    /// Next message; `None` once the connection is gone.
    async fn next_message(&mut self) -> Option<Result<InboundMessage, TransportError>>;
}

/// Write half of the client connection.
#[async_trait]
pub trait ClientSink: Send + 'static {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a close frame and release the connection.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

// =============================================================================
// Session Types
// =============================================================================

/// Lifecycle of a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Client accepted, upstream not yet open
    Connecting,
    /// Both pumps running
    Active,
    /// First terminal condition seen; cancelling and closing
    Draining,
    /// All resources released
    Closed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// The first terminal condition observed by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame or the connection ended.
    ClientDisconnected,
    /// Reading from the client failed.
    ClientReadFailed(String),
    /// Writing to the client failed.
    ClientWriteFailed(String),
    /// The upstream event sequence ended normally.
    UpstreamEnded,
    /// The upstream session could not be opened.
    ConnectFailed(String),
    /// Forwarding a frame upstream failed.
    SendFailed(String),
    /// The upstream event sequence failed.
    ReceiveFailed(String),
    /// A pump task panicked.
    Internal(String),
}

impl CloseReason {
    fn from_send_error(e: RealtimeError) -> Self {
        Self::SendFailed(e.to_string())
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::ClientReadFailed(_) => "client_read_failed",
            Self::ClientWriteFailed(_) => "client_write_failed",
            Self::UpstreamEnded => "upstream_ended",
            Self::ConnectFailed(_) => "connect_failed",
            Self::SendFailed(_) => "upstream_send_failed",
            Self::ReceiveFailed(_) => "upstream_receive_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the client side caused the session to end.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::ClientDisconnected | Self::ClientReadFailed(_) | Self::ClientWriteFailed(_)
        )
    }

    /// Error notification to send the client before closing, if any.
    fn client_error(&self) -> Option<&str> {
        match self {
            Self::ConnectFailed(msg)
            | Self::SendFailed(msg)
            | Self::ReceiveFailed(msg)
            | Self::Internal(msg) => Some(msg),
            _ => None,
        }
    }

    fn close_frame(&self) -> (u16, &'static str) {
        match self {
            Self::ConnectFailed(_) => (close_code::TRY_AGAIN_LATER, "upstream unavailable"),
            Self::SendFailed(_) | Self::ReceiveFailed(_) | Self::Internal(_) => {
                (close_code::INTERNAL_ERROR, "upstream failure")
            }
            _ => (close_code::NORMAL, "session ended"),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientDisconnected | Self::UpstreamEnded => f.write_str(self.as_str()),
            Self::ClientReadFailed(msg)
            | Self::ClientWriteFailed(msg)
            | Self::ConnectFailed(msg)
            | Self::SendFailed(msg)
            | Self::ReceiveFailed(msg)
            | Self::Internal(msg) => write!(f, "{}: {}", self.as_str(), msg),
        }
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub close_reason: CloseReason,
    /// Frames forwarded upstream
    pub frames_in: u64,
    /// Frames written to the client
    pub frames_out: u64,
    /// Client messages that could not be decoded
    pub dropped_frames: u64,
}

/// Process-wide settings every session is opened with.
#[derive(Clone)]
pub struct BridgeSettings {
    pub connector: Arc<dyn UpstreamConnector>,
    pub context: Arc<dyn ShopContextProvider>,
    pub model: String,
    pub session_config: Arc<LiveSessionConfig>,
}

impl fmt::Debug for BridgeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSettings")
            .field("provider", &self.connector.provider_name())
            .field("context", &self.context.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Pumps
// =============================================================================

enum PumpEnd {
    Cancelled,
    Stopped(CloseReason),
}

impl PumpEnd {
    /// A panic inside a pump body. The pump still returns its halves so they
    /// are closed like any other ending.
    fn panicked(pump: &str, panic: &(dyn Any + Send)) -> Self {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Stopped(CloseReason::Internal(format!("{pump} pump panicked: {message}")))
    }
}

struct InboundOutcome<S> {
    source: S,
    upstream: UpstreamSession,
    end: PumpEnd,
    frames_in: u64,
    dropped_frames: u64,
}

struct OutboundOutcome<K> {
    sink: K,
    end: PumpEnd,
    frames_out: u64,
}

async fn inbound_pump<S: ClientSource>(
    mut source: S,
    mut upstream: UpstreamSession,
    cancel: CancellationToken,
    session_id: String,
) -> InboundOutcome<S> {
    let mut frames_in = 0u64;
    let mut dropped_frames = 0u64;

    let pump = async {
        'pump: loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break PumpEnd::Cancelled,
                message = source.next_message() => message,
            };

            let text = match message {
                None | Some(Ok(InboundMessage::Close)) => {
                    break PumpEnd::Stopped(CloseReason::ClientDisconnected);
                }
                Some(Err(TransportError::Closed)) => {
                    break PumpEnd::Stopped(CloseReason::ClientDisconnected);
                }
                Some(Err(e)) => break PumpEnd::Stopped(CloseReason::ClientReadFailed(e.to_string())),
                Some(Ok(InboundMessage::Binary(data))) => {
                    dropped_frames += 1;
                    warn!(
                        session_id = %session_id,
                        bytes = data.len(),
                        "Dropping binary client message"
                    );
                    continue;
                }
                Some(Ok(InboundMessage::Text(text))) => text,
            };

            let frames = match decode_client_frame(&text) {
                Ok(frames) => frames,
                Err(e) => {
                    dropped_frames += 1;
                    warn!(session_id = %session_id, error = %e, "Dropping undecodable client message");
                    continue;
                }
            };

            for frame in frames {
                trace!(session_id = %session_id, kind = frame.kind(), "Forwarding client frame");
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'pump PumpEnd::Cancelled,
                    sent = upstream.send(frame) => sent,
                };
                if let Err(e) = sent {
                    break 'pump PumpEnd::Stopped(CloseReason::from_send_error(e));
                }
                frames_in += 1;
            }
        }
    };
    let end = AssertUnwindSafe(pump)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| PumpEnd::panicked("inbound", panic.as_ref()));

    InboundOutcome {
        source,
        upstream,
        end,
        frames_in,
        dropped_frames,
    }
}

async fn outbound_pump<K: ClientSink>(
    mut events: UpstreamEvents,
    mut sink: K,
    cancel: CancellationToken,
    session_id: String,
) -> OutboundOutcome<K> {
    let mut frames_out = 0u64;

    let pump = async {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break PumpEnd::Cancelled,
                next = events.next() => next,
            };

            let event = match next {
                None => break PumpEnd::Stopped(CloseReason::UpstreamEnded),
                Some(Err(e)) => break PumpEnd::Stopped(CloseReason::ReceiveFailed(e.to_string())),
                Some(Ok(event)) => event,
            };

            trace!(session_id = %session_id, kind = event.kind(), "Relaying upstream event");
            let frame = encode_outbound_frame(&event);
            let written = tokio::select! {
                biased;
                _ = cancel.cancelled() => break PumpEnd::Cancelled,
                written = sink.send_text(frame) => written,
            };
            if let Err(e) = written {
                break PumpEnd::Stopped(CloseReason::ClientWriteFailed(e.to_string()));
            }
            frames_out += 1;
        }
    };
    let end = AssertUnwindSafe(pump)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| PumpEnd::panicked("outbound", panic.as_ref()));

    OutboundOutcome {
        sink,
        end,
        frames_out,
    }
}

// =============================================================================
// Bridge Session
// =============================================================================

/// One client connection's relay lifecycle.
pub struct BridgeSession<S: ClientSource, K: ClientSink> {
    session_id: String,
    state: BridgeState,
    settings: BridgeSettings,
    source: Option<S>,
    sink: Option<K>,
    upstream: Option<UpstreamSession>,
    close_reason: Option<CloseReason>,
    frames_in: u64,
    frames_out: u64,
    dropped_frames: u64,
}

impl<S: ClientSource, K: ClientSink> BridgeSession<S, K> {
    pub fn new(source: S, sink: K, settings: BridgeSettings) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            state: BridgeState::Connecting,
            settings,
            source: Some(source),
            sink: Some(sink),
            upstream: None,
            close_reason: None,
            frames_in: 0,
            frames_out: 0,
            dropped_frames: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    fn transition(&mut self, next: BridgeState) {
        if self.state == next {
            return;
        }
        info!(
            session_id = %self.session_id,
            from = %self.state,
            to = %next,
            "Bridge session state change"
        );
        self.state = next;
    }

    /// Record a terminal condition. Only the first one counts.
    fn record_reason(&mut self, reason: CloseReason) {
        match &self.close_reason {
            None => self.close_reason = Some(reason),
            Some(first) => debug!(
                session_id = %self.session_id,
                first = %first,
                absorbed = %reason,
                "Absorbed terminal condition during drain"
            ),
        }
    }

    /// Drive the session to completion.
    pub async fn run(mut self) -> SessionSummary {
        info!(
            session_id = %self.session_id,
            provider = self.settings.connector.provider_name(),
            model = %self.settings.model,
            "Bridge session started"
        );

        match self.connect().await {
            Ok(events) => {
                self.transition(BridgeState::Active);
                self.relay(events).await;
            }
            Err(e) if e.is_connect_error() => {
                warn!(session_id = %self.session_id, error = %e, "Upstream connect failed");
                self.record_reason(CloseReason::ConnectFailed(e.to_string()));
            }
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "Upstream session unusable after open");
                self.record_reason(CloseReason::ConnectFailed(e.to_string()));
            }
        }

        self.close_transports().await;
        self.summary()
    }

    /// `Connecting`: consult the context provider once and open the upstream.
    async fn connect(&mut self) -> Result<UpstreamEvents, RealtimeError> {
        let context = resolve_context(self.settings.context.as_ref()).await;
        if context.is_empty() {
            debug!(session_id = %self.session_id, "No shop context, skipping priming");
        }

        let mut upstream = self
            .settings
            .connector
            .open(&self.settings.model, &self.settings.session_config, &context)
            .await?;

        match upstream.receive() {
            Ok(events) => {
                self.upstream = Some(upstream);
                Ok(events)
            }
            Err(e) => {
                let _ = upstream.close().await;
                Err(e)
            }
        }
    }

    /// `Active` until the first pump stops, then `Draining` until both unwind.
    async fn relay(&mut self, events: UpstreamEvents) {
        let (Some(source), Some(sink), Some(upstream)) =
            (self.source.take(), self.sink.take(), self.upstream.take())
        else {
            self.record_reason(CloseReason::Internal(
                "session transports missing".to_string(),
            ));
            return;
        };

        let cancel = CancellationToken::new();
        let mut inbound: JoinHandle<InboundOutcome<S>> = tokio::spawn(inbound_pump(
            source,
            upstream,
            cancel.clone(),
            self.session_id.clone(),
        ));
        let mut outbound: JoinHandle<OutboundOutcome<K>> = tokio::spawn(outbound_pump(
            events,
            sink,
            cancel.clone(),
            self.session_id.clone(),
        ));

        let mut inbound_done = None;
        let mut outbound_done = None;
        tokio::select! {
            res = &mut inbound => inbound_done = Some(res),
            res = &mut outbound => outbound_done = Some(res),
        }

        self.transition(BridgeState::Draining);
        cancel.cancel();

        let first_is_inbound = inbound_done.is_some();
        let inbound_res = match inbound_done {
            Some(res) => res,
            None => inbound.await,
        };
        let outbound_res = match outbound_done {
            Some(res) => res,
            None => outbound.await,
        };

        let inbound_end = match inbound_res {
            Ok(outcome) => {
                self.source = Some(outcome.source);
                self.upstream = Some(outcome.upstream);
                self.frames_in = outcome.frames_in;
                self.dropped_frames = outcome.dropped_frames;
                outcome.end
            }
            Err(e) => PumpEnd::Stopped(CloseReason::Internal(format!("inbound pump: {e}"))),
        };
        let outbound_end = match outbound_res {
            Ok(outcome) => {
                self.sink = Some(outcome.sink);
                self.frames_out = outcome.frames_out;
                outcome.end
            }
            Err(e) => PumpEnd::Stopped(CloseReason::Internal(format!("outbound pump: {e}"))),
        };

        let (first, second) = if first_is_inbound {
            (inbound_end, outbound_end)
        } else {
            (outbound_end, inbound_end)
        };
        for end in [first, second] {
            if let PumpEnd::Stopped(reason) = end {
                self.record_reason(reason);
            }
        }
    }

    /// Close both transports at most once each. Safe to call repeatedly.
    async fn close_transports(&mut self) {
        if self.state == BridgeState::Closed {
            return;
        }
        self.transition(BridgeState::Draining);

        if let Some(mut upstream) = self.upstream.take()
            && let Err(e) = upstream.close().await
        {
            debug!(session_id = %self.session_id, error = %e, "Error closing upstream session");
        }

        let reason = self
            .close_reason
            .clone()
            .unwrap_or(CloseReason::ClientDisconnected);

        if let Some(mut sink) = self.sink.take() {
            if let Some(message) = reason.client_error() {
                let frame = encode_error_frame(Some(reason.as_str()), message);
                if let Err(e) = sink.send_text(frame).await {
                    debug!(session_id = %self.session_id, error = %e, "Could not notify client");
                }
            }
            let (code, text) = reason.close_frame();
            if let Err(e) = sink.close(code, text).await {
                debug!(session_id = %self.session_id, error = %e, "Error closing client connection");
            }
        }
        self.source = None;

        self.transition(BridgeState::Closed);
    }

    fn summary(&self) -> SessionSummary {
        let close_reason = self
            .close_reason
            .clone()
            .unwrap_or(CloseReason::ClientDisconnected);
        info!(
            session_id = %self.session_id,
            reason = %close_reason,
            frames_in = self.frames_in,
            frames_out = self.frames_out,
            dropped_frames = self.dropped_frames,
            "Bridge session closed"
        );
        SessionSummary {
            session_id: self.session_id.clone(),
            close_reason,
            frames_in: self.frames_in,
            frames_out: self.frames_out,
            dropped_frames: self.dropped_frames,
        }
    }
}
