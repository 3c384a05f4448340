//! Live WebSocket message types
//!
//! Client messages are JSON text frames keyed by kind (`realtime_input`,
//! `client_content`, `control`). Snake_case keys are canonical; the camelCase
//! spellings Gemini-native clients send are accepted as aliases.
//!
//! Outbound frames mirror the Gemini `serverContent` envelope so browser clients
//! written against the Live API can consume them unchanged.

use serde::Deserialize;

/// Maximum allowed size for a typed user utterance (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Top-level wire keys, in detection order.
pub const KEY_REALTIME_INPUT: [&str; 2] = ["realtime_input", "realtimeInput"];
pub const KEY_CLIENT_CONTENT: [&str; 2] = ["client_content", "clientContent"];
pub const KEY_CONTROL: [&str; 1] = ["control"];

/// Body of a `realtime_input` message.
#[derive(Debug, Default, Deserialize)]
pub struct RealtimeInputMessage {
    #[serde(default, alias = "mediaChunks")]
    pub media_chunks: Option<Vec<MediaChunk>>,
    #[serde(default, alias = "audioStreamEnd")]
    pub audio_stream_end: Option<bool>,
}

/// One media chunk. Fields are optional here so a missing field can be reported
/// with the chunk's position instead of failing the whole parse.
#[derive(Debug, Default, Deserialize)]
pub struct MediaChunk {
    #[serde(default, alias = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Body of a `client_content` message.
#[derive(Debug, Default, Deserialize)]
pub struct ClientContentMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "turnComplete")]
    pub turn_complete: Option<bool>,
}

/// Body of a `control` message.
#[derive(Debug, Deserialize)]
pub struct ControlMessage {
    pub signal: String,
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Wire-level frame sent to the client, one per upstream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// `serverContent.modelTurn.parts[0].inlineData`
    InlineAudio {
        mime_type: String,
        /// Base64 payload
        data: String,
    },
    /// `serverContent.modelTurn.parts[0].text`
    Text { text: String },
    /// `serverContent.turnComplete`
    TurnComplete,
    /// `serverContent.interrupted`
    Interrupted,
    /// `error`
    Error {
        code: Option<String>,
        message: String,
    },
}
