//! Gemini Live API WebSocket message types.
//!
//! All messages are JSON objects with camelCase keys. Each client message carries
//! exactly one top-level key; server messages carry one or more optional keys.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - setup - First message; model, generation config, system instruction
//! - clientContent - Conversation turns (text), optionally ending the turn
//! - realtimeInput - Streaming media chunks and audio stream markers
//!
//! Server messages (received from server):
//! - setupComplete - Setup accepted, session ready
//! - serverContent - Model output parts, turnComplete, interrupted
//! - goAway - Server will disconnect soon
//! - toolCall / toolCallCancellation - Ignored by the bridge

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::realtime::base::{
    ClientFrame, ControlSignal, LiveSessionConfig, ServerEvent,
};

use super::config::{GeminiVoice, qualified_model_name};

// =============================================================================
// Shared Content Types
// =============================================================================

/// Inline binary payload, base64 encoded on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// One part of a content turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// A conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-part user turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent to Gemini Live.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
}

/// Session setup, sent once as the first message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// Generation parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Turn-based content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

/// Streaming media input.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_chunks: Vec<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

impl ClientMessage {
    /// Build the setup message for a session.
    pub fn setup(model: &str, config: &LiveSessionConfig) -> Self {
        let speech_config = config.voice.as_deref().map(|voice| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: GeminiVoice::from_str_or_default(voice).as_str().to_string(),
                },
            },
        });

        let system_instruction = config
            .system_instruction
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Content {
                role: None,
                parts: vec![Part::text(s)],
            });

        Self::Setup(Setup {
            model: qualified_model_name(model),
            generation_config: Some(GenerationConfig {
                response_modalities: config
                    .response_modalities
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
                speech_config,
                temperature: config.temperature,
            }),
            system_instruction,
        })
    }

    /// Priming context: a complete user turn, so the model treats it as context
    /// rather than waiting for more input.
    pub fn priming(context: &str) -> Self {
        Self::ClientContent(ClientContent {
            turns: vec![Content::user_text(context)],
            turn_complete: true,
        })
    }

    /// Map one decoded client frame onto the Live wire.
    ///
    /// Audio is base64 encoded here, at the transport boundary, because the Live
    /// protocol carries media inside JSON.
    pub fn from_frame(frame: ClientFrame) -> Self {
        match frame {
            ClientFrame::AudioChunk { mime_type, payload } => Self::RealtimeInput(RealtimeInput {
                media_chunks: vec![Blob {
                    mime_type,
                    data: BASE64_STANDARD.encode(&payload),
                }],
                audio_stream_end: None,
            }),
            ClientFrame::Text { text, end_of_turn } => Self::ClientContent(ClientContent {
                turns: vec![Content::user_text(text)],
                turn_complete: end_of_turn,
            }),
            ClientFrame::Control(ControlSignal::EndOfTurn) => {
                Self::ClientContent(ClientContent {
                    turns: Vec::new(),
                    turn_complete: true,
                })
            }
            ClientFrame::Control(ControlSignal::AudioStreamEnd) => {
                Self::RealtimeInput(RealtimeInput {
                    media_chunks: Vec::new(),
                    audio_stream_end: Some(true),
                })
            }
        }
    }
}

// =============================================================================
// Server Messages
// =============================================================================

/// A message received from Gemini Live.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
    #[serde(default)]
    pub tool_call: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ServerError>,
}

/// Model output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub interrupted: Option<bool>,
}

/// Advance notice of disconnection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

/// Error body some endpoints send before closing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Convert into relay events, preserving part order.
    ///
    /// Parts come first, then `Interrupted`, then `TurnComplete`. Inline data that
    /// is not valid base64 is logged and skipped.
    pub fn into_events(self) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(blob) = part.inline_data {
                        match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                            Ok(bytes) => events.push(ServerEvent::AudioChunk {
                                mime_type: blob.mime_type,
                                payload: Bytes::from(bytes),
                            }),
                            Err(e) => {
                                tracing::warn!("Failed to decode inline data from Gemini: {}", e);
                            }
                        }
                    }
                    if let Some(text) = part.text
                        && !text.is_empty()
                    {
                        events.push(ServerEvent::TextDelta { text });
                    }
                }
            }
            if content.interrupted.unwrap_or(false) {
                events.push(ServerEvent::Interrupted);
            }
            if content.turn_complete.unwrap_or(false) {
                events.push(ServerEvent::TurnComplete);
            }
        }

        if let Some(go_away) = self.go_away {
            let message = match go_away.time_left {
                Some(left) => format!("Upstream session ending soon (time left: {left})"),
                None => "Upstream session ending soon".to_string(),
            };
            events.push(ServerEvent::Error {
                code: Some("go_away".to_string()),
                message,
            });
        }

        if let Some(error) = self.error {
            events.push(ServerEvent::Error {
                code: error
                    .status
                    .or_else(|| error.code.map(|c| c.to_string())),
                message: error
                    .message
                    .unwrap_or_else(|| "Upstream reported an error".to_string()),
            });
        }

        if self.tool_call.is_some() {
            tracing::debug!("Ignoring Gemini tool call");
        }

        events
    }
}
