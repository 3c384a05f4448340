//! Frame codec between the client wire format and [`ClientFrame`] / [`ServerEvent`].
//!
//! Decoding is pure: base64 payloads are decoded exactly once here and carried as
//! bytes from then on. Encoding re-encodes payloads exactly once and never emits
//! `null` or an empty string for absent optional fields.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::core::realtime::{ClientFrame, ControlSignal, ServerEvent};

use super::messages::{
    ClientContentMessage, ControlMessage, KEY_CLIENT_CONTENT, KEY_CONTROL, KEY_REALTIME_INPUT,
    MAX_TEXT_SIZE, OutboundFrame, RealtimeInputMessage,
};

/// Why a client message could not be decoded. Never fatal to the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("unknown message shape: {0}")]
    UnknownShape(String),

    #[error("invalid base64 in media chunk {index}: {reason}")]
    BadBase64 { index: usize, reason: String },

    #[error("text too large: {size} bytes (max: {max} bytes)")]
    TextTooLarge { size: usize, max: usize },
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one client text frame into zero or more frames, in wire order.
///
/// A batch is all-or-nothing: if any chunk fails, no frame from the message is
/// returned.
pub fn decode_client_frame(raw: &str) -> Result<Vec<ClientFrame>, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::MalformedJson(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::UnknownShape(
            "expected a JSON object".to_string(),
        ));
    };

    if let Some(body) = take_first(&mut object, &KEY_REALTIME_INPUT) {
        decode_realtime_input(parse_body(body, "realtime_input")?)
    } else if let Some(body) = take_first(&mut object, &KEY_CLIENT_CONTENT) {
        decode_client_content(parse_body(body, "client_content")?)
    } else if let Some(body) = take_first(&mut object, &KEY_CONTROL) {
        decode_control(parse_body(body, "control")?)
    } else {
        Err(DecodeError::UnknownShape(
            "no realtime_input, client_content or control key".to_string(),
        ))
    }
}

fn take_first(object: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| object.remove(*key))
}

fn parse_body<T: DeserializeOwned>(body: Value, kind: &str) -> Result<T, DecodeError> {
    serde_json::from_value(body).map_err(|e| DecodeError::UnknownShape(format!("{kind}: {e}")))
}

fn decode_realtime_input(input: RealtimeInputMessage) -> Result<Vec<ClientFrame>, DecodeError> {
    let stream_end = input.audio_stream_end.unwrap_or(false);
    let Some(chunks) = input.media_chunks else {
        return if stream_end {
            Ok(vec![ClientFrame::Control(ControlSignal::AudioStreamEnd)])
        } else {
            Err(DecodeError::UnknownShape(
                "realtime_input needs media_chunks or audio_stream_end".to_string(),
            ))
        };
    };

    let mut frames = Vec::with_capacity(chunks.len() + usize::from(stream_end));
    for (index, chunk) in chunks.into_iter().enumerate() {
        let mime_type = chunk.mime_type.ok_or_else(|| {
            DecodeError::UnknownShape(format!("media chunk {index} has no mime_type"))
        })?;
        let data = chunk.data.ok_or_else(|| {
            DecodeError::UnknownShape(format!("media chunk {index} has no data"))
        })?;
        let payload = BASE64_STANDARD
            .decode(data.as_bytes())
            .map_err(|e| DecodeError::BadBase64 {
                index,
                reason: e.to_string(),
            })?;
        frames.push(ClientFrame::AudioChunk {
            mime_type,
            payload: Bytes::from(payload),
        });
    }
    if stream_end {
        frames.push(ClientFrame::Control(ControlSignal::AudioStreamEnd));
    }
    Ok(frames)
}

fn decode_client_content(content: ClientContentMessage) -> Result<Vec<ClientFrame>, DecodeError> {
    let end_of_turn = content.turn_complete.unwrap_or(true);
    match content.text {
        Some(text) => {
            if text.len() > MAX_TEXT_SIZE {
                return Err(DecodeError::TextTooLarge {
                    size: text.len(),
                    max: MAX_TEXT_SIZE,
                });
            }
            Ok(vec![ClientFrame::Text { text, end_of_turn }])
        }
        // A bare turn marker with no text.
        None if content.turn_complete == Some(true) => {
            Ok(vec![ClientFrame::Control(ControlSignal::EndOfTurn)])
        }
        None => Err(DecodeError::UnknownShape(
            "client_content has no text".to_string(),
        )),
    }
}

fn decode_control(control: ControlMessage) -> Result<Vec<ClientFrame>, DecodeError> {
    ControlSignal::parse(&control.signal)
        .map(|signal| vec![ClientFrame::Control(signal)])
        .ok_or_else(|| DecodeError::UnknownShape(format!("unknown signal: {}", control.signal)))
}

// =============================================================================
// Encoding
// =============================================================================

impl OutboundFrame {
    /// Build the wire frame for one upstream event.
    pub fn from_event(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::AudioChunk { mime_type, payload } => Self::InlineAudio {
                mime_type: mime_type.clone(),
                data: BASE64_STANDARD.encode(payload),
            },
            ServerEvent::TextDelta { text } => Self::Text { text: text.clone() },
            ServerEvent::TurnComplete => Self::TurnComplete,
            ServerEvent::Interrupted => Self::Interrupted,
            ServerEvent::Error { code, message } => Self::Error {
                code: code.clone(),
                message: message.clone(),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::InlineAudio { mime_type, data } => {
                let mut inline = Map::new();
                if !mime_type.is_empty() {
                    inline.insert("mimeType".to_string(), Value::String(mime_type.clone()));
                }
                inline.insert("data".to_string(), Value::String(data.clone()));
                json!({
                    "serverContent": { "modelTurn": { "parts": [{ "inlineData": inline }] } }
                })
            }
            Self::Text { text } => json!({
                "serverContent": { "modelTurn": { "parts": [{ "text": text }] } }
            }),
            Self::TurnComplete => json!({ "serverContent": { "turnComplete": true } }),
            Self::Interrupted => json!({ "serverContent": { "interrupted": true } }),
            Self::Error { code, message } => {
                let mut error = Map::new();
                if let Some(code) = code {
                    error.insert("code".to_string(), Value::String(code.clone()));
                }
                error.insert("message".to_string(), Value::String(message.clone()));
                json!({ "error": error })
            }
        }
    }
}

/// Encode one upstream event as a client text frame. Infallible.
pub fn encode_outbound_frame(event: &ServerEvent) -> String {
    OutboundFrame::from_event(event).to_json().to_string()
}

/// Encode a relay-originated error notification.
pub fn encode_error_frame(code: Option<&str>, message: &str) -> String {
    OutboundFrame::Error {
        code: code.map(str::to_string),
        message: message.to_string(),
    }
    .to_json()
    .to_string()
}
