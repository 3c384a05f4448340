//! Gemini Live API configuration types.
//!
//! This module contains configuration types for the Gemini Live API:
//! - Endpoint and audio constants
//! - Voice selection
//! - Model name normalisation

use serde::{Deserialize, Serialize};

/// Gemini Live `BidiGenerateContent` WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio model.
pub const GEMINI_LIVE_DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Sample rate Gemini expects for PCM input audio.
pub const GEMINI_INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of PCM audio produced by Gemini.
pub const GEMINI_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Qualify a model id with the `models/` prefix the setup message requires.
pub fn qualified_model_name(model: &str) -> String {
    let model = model.trim();
    let model = if model.is_empty() {
        GEMINI_LIVE_DEFAULT_MODEL
    } else {
        model
    };
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Prebuilt voices available to Gemini Live native audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiVoice {
    Puck,
    Charon,
    /// Kore voice (default)
    #[default]
    Kore,
    Fenrir,
    Aoede,
    Leda,
    Orus,
    Zephyr,
}

impl GeminiVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
            Self::Leda => "Leda",
            Self::Orus => "Orus",
            Self::Zephyr => "Zephyr",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "puck" => Self::Puck,
            "charon" => Self::Charon,
            "kore" => Self::Kore,
            "fenrir" => Self::Fenrir,
            "aoede" => Self::Aoede,
            "leda" => Self::Leda,
            "orus" => Self::Orus,
            "zephyr" => Self::Zephyr,
            _ => Self::default(),
        }
    }

    /// Get all available voices.
    pub fn all() -> &'static [GeminiVoice] {
        &[
            Self::Puck,
            Self::Charon,
            Self::Kore,
            Self::Fenrir,
            Self::Aoede,
            Self::Leda,
            Self::Orus,
            Self::Zephyr,
        ]
    }
}

impl std::fmt::Display for GeminiVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parsing() {
        assert_eq!(GeminiVoice::from_str_or_default("kore"), GeminiVoice::Kore);
        assert_eq!(GeminiVoice::from_str_or_default("ZEPHYR"), GeminiVoice::Zephyr);
        assert_eq!(GeminiVoice::from_str_or_default("alloy"), GeminiVoice::Kore);
        assert_eq!(GeminiVoice::all().len(), 8);
    }

    #[test]
    fn test_qualified_model_name() {
        assert_eq!(
            qualified_model_name("gemini-2.0-flash-live-001"),
            "models/gemini-2.0-flash-live-001"
        );
        assert_eq!(
            qualified_model_name("models/gemini-2.0-flash-live-001"),
            "models/gemini-2.0-flash-live-001"
        );
        assert_eq!(
            qualified_model_name("  "),
            format!("models/{GEMINI_LIVE_DEFAULT_MODEL}")
        );
    }
}
