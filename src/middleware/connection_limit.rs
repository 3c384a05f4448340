//! Connection limit middleware for WebSocket connections
//!
//! Enforces the global WebSocket cap and the per-IP cap before a `/live`
//! upgrade is accepted. Plain HTTP requests pass through untouched.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionGuard, ConnectionLimitError};

/// A reserved connection slot, released when the last clone is dropped.
///
/// The middleware inserts it into the request extensions. A handler that
/// upgrades keeps a clone for the life of the session; if the request is
/// rejected before that, dropping the request frees the slot.
#[derive(Clone)]
pub struct ConnectionSlot(Arc<ConnectionGuard>);

impl ConnectionSlot {
    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }
}

/// Reject WebSocket upgrades over capacity.
///
/// Returns 503 when the global limit is reached and 429 when the caller's IP
/// already holds its share.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            let guard = ConnectionGuard::new(state.clone(), client_ip);
            request
                .extensions_mut()
                .insert(ConnectionSlot(Arc::new(guard)));
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(ip = %client_ip, "Rejecting connection: global limit reached");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(ip = %client_ip, "Rejecting connection: per-IP limit reached");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::core::context::StaticContextProvider;
    use crate::core::realtime::GeminiLiveConnector;
    use axum::body::to_bytes;
    use axum::{Router, routing::get};
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    fn limited_state(global: Option<usize>, per_ip: u32) -> Arc<AppState> {
        let config = ServerConfig {
            max_websocket_connections: global,
            max_connections_per_ip: per_ip,
            ..Default::default()
        };
        AppState::with_components(
            config,
            Arc::new(GeminiLiveConnector::new("test")),
            Arc::new(StaticContextProvider::empty()),
        )
    }

    /// The stub reports the live count while it still holds the request.
    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route(
                "/live",
                get(|State(state): State<Arc<AppState>>| async move {
                    state.ws_connection_count().to_string()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state)
    }

    fn request(upgrade: bool) -> Request<Body> {
        let mut builder = Request::builder().uri("/live");
        if upgrade {
            builder = builder.header("upgrade", "websocket");
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(SocketAddr::from((
            Ipv4Addr::new(203, 0, 113, 7),
            40000,
        ))));
        request
    }

    #[tokio::test]
    async fn test_plain_requests_bypass_limits() {
        let state = limited_state(Some(1), 1);
        state
            .try_acquire_connection(Ipv4Addr::new(203, 0, 113, 7).into())
            .unwrap();

        let response = app(state).oneshot(request(false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upgrade_rejected_when_at_capacity() {
        let state = limited_state(Some(1), 5);
        state
            .try_acquire_connection(Ipv4Addr::new(10, 0, 0, 1).into())
            .unwrap();

        let response = app(state).oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upgrade_rejected_over_per_ip_limit() {
        let state = limited_state(None, 1);
        state
            .try_acquire_connection(Ipv4Addr::new(203, 0, 113, 7).into())
            .unwrap();

        let response = app(state.clone()).oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(state.ws_connection_count(), 1);
    }

    #[tokio::test]
    async fn test_slot_held_during_request_and_freed_after() {
        let state = limited_state(Some(4), 4);

        let response = app(state.clone()).oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"1");

        // Nothing kept the slot past the response.
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(
            state.ip_connection_count(&Ipv4Addr::new(203, 0, 113, 7).into()),
            0
        );
    }

    #[tokio::test]
    async fn test_slot_outlives_request_while_cloned() {
        let state = limited_state(None, 4);
        let kept: Arc<std::sync::Mutex<Option<ConnectionSlot>>> = Default::default();

        let keeper = kept.clone();
        let app = Router::new()
            .route(
                "/live",
                get(move |axum::Extension(slot): axum::Extension<ConnectionSlot>| async move {
                    *keeper.lock().unwrap() = Some(slot);
                    "ok"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state.clone());

        app.oneshot(request(true)).await.unwrap();
        assert_eq!(state.ws_connection_count(), 1);
        assert_eq!(
            kept.lock().unwrap().as_ref().map(ConnectionSlot::ip),
            Some(Ipv4Addr::new(203, 0, 113, 7).into())
        );

        kept.lock().unwrap().take();
        assert_eq!(state.ws_connection_count(), 0);
    }
}
