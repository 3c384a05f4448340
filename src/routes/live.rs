//! Live WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live bridge router
///
/// # Endpoint
///
/// `GET /live` - WebSocket upgrade; one connection is one model session
///
/// # Example
///
/// ```json
/// // Client streams microphone audio
/// {"realtime_input": {"media_chunks": [{"mime_type": "audio/pcm;rate=16000", "data": "AAAA"}]}}
///
/// // Server forwards model audio
/// {"serverContent": {"modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "..."}}]}}}
/// ```
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/live", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
