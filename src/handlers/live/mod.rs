//! Live voice bridge WebSocket handlers
//!
//! One WebSocket connection on `/live` is one bridge session against the
//! upstream conversational model.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **realtime_input**: `{"realtime_input":{"media_chunks":[{"mime_type","data"}]}}`,
//!   optionally with `"audio_stream_end": true`
//! - **client_content**: `{"client_content":{"text":"...","turn_complete":true}}`
//! - **control**: `{"control":{"signal":"end_of_turn"|"audio_stream_end"}}`
//!
//! ## Server → Client
//!
//! - **serverContent.modelTurn.parts[].inlineData**: model audio (base64)
//! - **serverContent.modelTurn.parts[].text**: model text
//! - **serverContent.turnComplete** / **serverContent.interrupted**
//! - **error**: sent once before the socket is closed on an upstream failure

pub mod codec;
mod handler;
pub mod messages;
pub mod relay;

pub use codec::{DecodeError, decode_client_frame, encode_error_frame, encode_outbound_frame};
pub use handler::{AxumClientSink, AxumClientSource, live_handler};
pub use messages::OutboundFrame;
pub use relay::{
    BridgeSession, BridgeSettings, BridgeState, ClientSink, ClientSource, CloseReason,
    InboundMessage, SessionSummary, TransportError,
};
