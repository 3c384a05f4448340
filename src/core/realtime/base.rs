//! Base traits and types for upstream realtime sessions.
//!
//! This module defines the foundational abstractions the duplex relay uses to talk
//! to a remote conversational AI endpoint over a streaming session:
//!
//! - [`ClientFrame`]: a decoded inbound message, ready to forward upstream
//! - [`ServerEvent`]: a tagged event emitted by the upstream session
//! - [`UpstreamConnector`]: opens sessions (`open`)
//! - [`UpstreamSession`]: one open session (`send` / `receive` / `close`)
//!
//! Provider wire shapes never leak past this boundary: adapters convert their
//! response objects into [`ServerEvent`] exactly once, so the rest of the crate
//! matches on variants instead of probing optional fields.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during upstream session operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed (includes setup handshake failures)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Writing a frame to the upstream transport failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Reading from the upstream transport failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The session was already closed, or its event stream already taken
    #[error("Session closed: {0}")]
    SessionClosed(String),
}

impl RealtimeError {
    /// Whether this error happened while opening the session.
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::AuthenticationFailed(_)
                | Self::InvalidConfiguration(_)
                | Self::Timeout(_)
        )
    }
}

/// Result type for upstream operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Frames and Events
// =============================================================================

/// Control signals a client can send alongside media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The user finished their turn; the model should respond.
    EndOfTurn,
    /// The microphone stream was paused or stopped.
    AudioStreamEnd,
}

impl ControlSignal {
    /// Parse a wire name (`end_of_turn`, `audio_stream_end`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "end_of_turn" | "endofturn" | "turn_complete" => Some(Self::EndOfTurn),
            "audio_stream_end" | "audiostreamend" => Some(Self::AudioStreamEnd),
            _ => None,
        }
    }
}

/// A decoded inbound client message.
///
/// Audio payloads are decoded from base64 once at the codec boundary and carried
/// as raw bytes until the upstream adapter writes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// One media chunk (e.g. `audio/pcm;rate=16000`)
    AudioChunk { mime_type: String, payload: Bytes },
    /// A typed user utterance
    Text { text: String, end_of_turn: bool },
    /// A control signal
    Control(ControlSignal),
}

impl ClientFrame {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AudioChunk { .. } => "audio_chunk",
            Self::Text { .. } => "text",
            Self::Control(_) => "control",
        }
    }
}

/// An event emitted by the upstream session.
///
/// Several events may belong to one logical model turn; the relay forwards each
/// one independently, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Synthesised audio from the model
    AudioChunk { mime_type: String, payload: Bytes },
    /// Incremental text from the model
    TextDelta { text: String },
    /// The model finished its turn
    TurnComplete,
    /// The model's output was cut off by user speech
    Interrupted,
    /// A provider-reported error or warning
    Error {
        code: Option<String>,
        message: String,
    },
}

impl ServerEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AudioChunk { .. } => "audio_chunk",
            Self::TextDelta { .. } => "text_delta",
            Self::TurnComplete => "turn_complete",
            Self::Interrupted => "interrupted",
            Self::Error { .. } => "error",
        }
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Audio,
    Text,
}

impl ResponseModality {
    /// Wire value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Text => "TEXT",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUDIO" => Some(Self::Audio),
            "TEXT" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options recognised when opening an upstream session.
///
/// This is built once from the process configuration and shared read-only by
/// every session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSessionConfig {
    /// Requested output modalities (never empty once validated)
    pub response_modalities: BTreeSet<ResponseModality>,
    /// Prebuilt voice name for audio output
    pub voice: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Standing system instruction sent in the setup message
    pub system_instruction: Option<String>,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            response_modalities: BTreeSet::from([ResponseModality::Audio]),
            voice: None,
            temperature: None,
            system_instruction: None,
        }
    }
}

// =============================================================================
// Session Traits
// =============================================================================

/// Lazy, non-restartable sequence of upstream events.
///
/// Ends when the session closes normally; yields one `Err` for a transport
/// failure and then ends.
pub type UpstreamEvents = BoxStream<'static, RealtimeResult<ServerEvent>>;

/// Write half of an upstream session.
#[async_trait]
pub trait UpstreamSender: Send + 'static {
    /// Forward one frame. Waits for the transport write; never queues.
    async fn send(&mut self, frame: ClientFrame) -> RealtimeResult<()>;

    /// Release the transport. Must be idempotent.
    async fn close(&mut self) -> RealtimeResult<()>;
}

/// Opens upstream sessions.
///
/// Implementations hold the process-wide credentials and endpoint; nothing is
/// mutated per session.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open a session for `model`.
    ///
    /// When `system_context` is non-empty it is sent as a turn-terminating
    /// priming message before this returns.
    async fn open(
        &self,
        model: &str,
        config: &LiveSessionConfig,
        system_context: &str,
    ) -> RealtimeResult<UpstreamSession>;

    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

/// One open upstream session.
pub struct UpstreamSession {
    sender: Box<dyn UpstreamSender>,
    events: Option<UpstreamEvents>,
}

impl UpstreamSession {
    pub fn new(sender: Box<dyn UpstreamSender>, events: UpstreamEvents) -> Self {
        Self {
            sender,
            events: Some(events),
        }
    }

    /// Forward one frame upstream.
    pub async fn send(&mut self, frame: ClientFrame) -> RealtimeResult<()> {
        self.sender.send(frame).await
    }

    /// Take the event sequence. Only the first call succeeds.
    pub fn receive(&mut self) -> RealtimeResult<UpstreamEvents> {
        self.events
            .take()
            .ok_or_else(|| RealtimeError::SessionClosed("event stream already taken".to_string()))
    }

    /// Close the upstream transport. Safe to call repeatedly and after errors.
    pub async fn close(&mut self) -> RealtimeResult<()> {
        self.sender.close().await
    }
}

impl fmt::Debug for UpstreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSession")
            .field("events_taken", &self.events.is_none())
            .finish()
    }
}
