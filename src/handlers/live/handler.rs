//! Live WebSocket handler
//!
//! Upgrades `GET /live` and hands the socket to a [`BridgeSession`]. The axum
//! socket halves are adapted to [`ClientSource`] / [`ClientSink`] here so the
//! relay itself never sees axum types.

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::middleware::ConnectionSlot;
use crate::state::AppState;

use super::relay::{BridgeSession, ClientSink, ClientSource, InboundMessage, TransportError};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Live WebSocket handler
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state containing configuration
/// * `slot` - Connection slot reserved by the connection-limit middleware
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<axum::Extension<ConnectionSlot>>,
) -> Response {
    let slot = slot.map(|axum::Extension(slot)| slot);

    info!(
        ip = ?slot.as_ref().map(ConnectionSlot::ip),
        "Live WebSocket connection upgrade requested"
    );

    // The slot moves into the session; a failed upgrade drops it with the callback.
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state, slot))
}

async fn handle_live_socket(socket: WebSocket, state: Arc<AppState>, _slot: Option<ConnectionSlot>) {
    let (sender, receiver) = socket.split();
    let session = BridgeSession::new(
        AxumClientSource(receiver),
        AxumClientSink(sender),
        state.bridge_settings(),
    );
    let summary = session.run().await;
    if summary.close_reason.is_client_side() {
        debug!(
            session_id = %summary.session_id,
            reason = summary.close_reason.as_str(),
            "Live WebSocket handler finished"
        );
    } else {
        info!(
            session_id = %summary.session_id,
            reason = %summary.close_reason,
            "Live WebSocket session ended from the upstream side"
        );
    }
}

// =============================================================================
// Transport Adapters
// =============================================================================

/// Read half of an axum WebSocket.
pub struct AxumClientSource(pub SplitStream<WebSocket>);

#[async_trait]
impl ClientSource for AxumClientSource {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, TransportError>> {
        loop {
            let message = match self.0.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            };
            return Some(Ok(match message {
                Message::Text(text) => InboundMessage::Text(text.as_str().to_string()),
                Message::Binary(data) => InboundMessage::Binary(data),
                Message::Close(frame) => {
                    debug!(
                        code = frame.as_ref().map(|f| f.code),
                        "Client sent close frame"
                    );
                    InboundMessage::Close
                }
                // Pings are answered by the protocol layer.
                Message::Ping(_) | Message::Pong(_) => continue,
            }));
        }
    }
}

/// Write half of an axum WebSocket.
pub struct AxumClientSink(pub SplitSink<WebSocket, Message>);

#[async_trait]
impl ClientSink for AxumClientSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        self.0
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.0
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
