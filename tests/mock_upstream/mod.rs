//! Mock Gemini Live server
//!
//! Speaks just enough of the Live protocol to exercise the bridge: it answers
//! `setup` with `setupComplete`, records everything it receives, and echoes
//! audio and text back as model output.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Mime type the mock uses for model audio.
pub const MODEL_AUDIO_MIME: &str = "audio/pcm;rate=24000";

/// How the mock behaves after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Echo audio chunks and answer text turns.
    Echo,
    /// Close the socket instead of sending `setupComplete`.
    RejectSetup,
    /// Complete setup, then close with an internal error once the first
    /// client message arrives.
    FailAfterFirstMessage,
}

pub struct MockUpstreamState {
    behavior: MockBehavior,
    received: Mutex<Vec<Value>>,
    message_arrived: Notify,
    pub connections: AtomicUsize,
    pub disconnections: AtomicUsize,
    /// Close frames received from the gateway side.
    pub closes: AtomicUsize,
    disconnected: Notify,
}

impl MockUpstreamState {
    /// Every JSON message received, across all connections, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages have been received.
    pub async fn wait_for_messages(&self, count: usize) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.message_arrived.notified();
                let received = self.received();
                if received.len() >= count {
                    return received;
                }
                notified.await;
            }
        })
        .await
        .expect("mock upstream did not receive the expected messages")
    }

    /// Wait until `count` upstream connections have ended.
    pub async fn wait_for_disconnections(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.disconnected.notified();
                if self.disconnections.load(Ordering::SeqCst) >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("mock upstream connection was not closed")
    }

    fn record(&self, value: Value) {
        self.received.lock().unwrap().push(value);
        self.message_arrived.notify_waiters();
    }
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub state: Arc<MockUpstreamState>,
}

impl MockUpstream {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockUpstreamState {
            behavior,
            received: Mutex::new(Vec::new()),
            message_arrived: Notify::new(),
            connections: AtomicUsize::new(0),
            disconnections: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            disconnected: Notify::new(),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    state.connections.fetch_add(1, Ordering::SeqCst);
                    let _ = handle_connection(stream, state.clone()).await;
                    state.disconnections.fetch_add(1, Ordering::SeqCst);
                    state.disconnected.notify_waiters();
                });
            }
        });

        Self { addr, state }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/live", self.addr)
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn handle_connection(stream: TcpStream, state: Arc<MockUpstreamState>) -> Result<(), BoxError> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    // First message is always setup
    let Some(Ok(Message::Text(setup))) = read.next().await else {
        return Ok(());
    };
    state.record(serde_json::from_str(setup.as_str())?);

    if state.behavior == MockBehavior::RejectSetup {
        write
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "invalid model".into(),
            })))
            .await?;
        return Ok(());
    }

    write
        .send(Message::Text(json!({ "setupComplete": {} }).to_string().into()))
        .await?;

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => {
                state.closes.fetch_add(1, Ordering::SeqCst);
                break;
            }
            _ => continue,
        };
        let value: Value = serde_json::from_str(text.as_str())?;
        state.record(value.clone());

        if state.behavior == MockBehavior::FailAfterFirstMessage {
            write
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Error,
                    reason: "internal error".into(),
                })))
                .await?;
            break;
        }

        for reply in echo_replies(&value) {
            write.send(Message::Text(reply.to_string().into())).await?;
        }
    }

    Ok(())
}

/// Model output for one client message.
fn echo_replies(value: &Value) -> Vec<Value> {
    if let Some(chunks) = value["realtimeInput"]["mediaChunks"].as_array() {
        return chunks
            .iter()
            .map(|chunk| {
                json!({
                    "serverContent": {
                        "modelTurn": {
                            "parts": [{ "inlineData": { "mimeType": MODEL_AUDIO_MIME, "data": chunk["data"] } }]
                        }
                    }
                })
            })
            .collect();
    }

    let content = &value["clientContent"];
    let text = content["turns"][0]["parts"][0]["text"].as_str();
    match text {
        // Priming context carries the shop data block and gets no answer.
        Some(text) if text.contains("<shop_data>") => Vec::new(),
        Some(text) if content["turnComplete"] == json!(true) => vec![
            json!({ "serverContent": { "modelTurn": { "parts": [{ "text": format!("echo: {text}") }] } } }),
            json!({ "serverContent": { "turnComplete": true } }),
        ],
        _ => Vec::new(),
    }
}
