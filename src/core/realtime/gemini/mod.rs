//! Gemini Live API module.
//!
//! Bidirectional audio and text streaming against Google's Gemini Live
//! `BidiGenerateContent` WebSocket.
//!
//! # Session Lifecycle
//!
//! 1. Connect with the API key as a query parameter
//! 2. Send `setup` (model, modalities, voice, system instruction)
//! 3. Wait for `setupComplete`
//! 4. Optionally send a priming `clientContent` turn with shop context
//! 5. Stream `realtimeInput` upstream and `serverContent` downstream
//!
//! # Supported Voices
//!
//! Puck, Charon, Kore, Fenrir, Aoede, Leda, Orus, Zephyr
//!
//! # Audio Format
//!
//! Input is PCM 16-bit little-endian at 16kHz; output is PCM 16-bit at 24kHz.
//!
//! # Example
//!
//! ```rust,ignore
//! use kirana_gateway::core::realtime::{GeminiLiveConnector, LiveSessionConfig, UpstreamConnector};
//!
//! let connector = GeminiLiveConnector::new(api_key);
//! let mut session = connector
//!     .open("gemini-2.0-flash-live-001", &LiveSessionConfig::default(), "")
//!     .await?;
//! let mut events = session.receive()?;
//! ```

mod client;
mod config;
mod messages;

pub use client::{GeminiLiveConnector, GeminiSender};
pub use config::{
    GEMINI_INPUT_SAMPLE_RATE, GEMINI_LIVE_DEFAULT_MODEL, GEMINI_LIVE_URL,
    GEMINI_OUTPUT_SAMPLE_RATE, GeminiVoice, qualified_model_name,
};
pub use messages::{ClientMessage, ServerMessage};
