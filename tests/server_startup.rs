//! Server Startup Tests
//!
//! Configuration loading and router assembly as `main` performs them.

use std::fs;
use std::time::Duration;

use axum::{body::Body, http::Request};
use serial_test::serial;
use tempfile::TempDir;
use tower::util::ServiceExt;

use kirana_gateway::config::ConfigError;
use kirana_gateway::{ServerConfig, routes, state::AppState};

/// Test that the server boots without any API key
#[tokio::test]
async fn test_minimal_config_boot() {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    let app_state = AppState::new(config).await;
    let app = routes::create_app(app_state);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

/// A plain GET on the live route is not an upgrade and must not hold a slot
#[tokio::test]
async fn test_live_route_requires_upgrade() {
    let app_state = AppState::new(ServerConfig::default()).await;
    let app = routes::create_app(app_state.clone());

    let mut request = Request::builder().uri("/live").body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(axum::extract::ConnectInfo(std::net::SocketAddr::from((
            [127, 0, 0, 1],
            5000,
        ))));
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(app_state.ws_connection_count(), 0);
}

/// An upgrade the WebSocket extractor rejects must give its slot back
#[tokio::test]
async fn test_rejected_upgrade_releases_slot() {
    let config = ServerConfig {
        max_connections_per_ip: 2,
        ..Default::default()
    };
    let app_state = AppState::new(config).await;
    let app = routes::create_app(app_state.clone());

    // Upgrade header only: no Connection, Sec-WebSocket-Key or version.
    for _ in 0..3 {
        let mut request = Request::builder()
            .uri("/live")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(std::net::SocketAddr::from((
                [127, 0, 0, 1],
                5001,
            ))));
        let response = app.clone().oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
        assert_ne!(response.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(app_state.ws_connection_count(), 0);
    }
    assert_eq!(
        app_state.ip_connection_count(&std::net::Ipv4Addr::LOCALHOST.into()),
        0
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = routes::create_app(AppState::new(ServerConfig::default()).await);

    let request = Request::builder()
        .uri("/realtime")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

/// YAML values win over the environment and defaults fill the rest
#[test]
#[serial]
fn test_config_from_yaml_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    fs::write(
        &path,
        r#"
server:
  host: "127.0.0.1"
  port: 4100
live:
  voice: "Puck"
  response_modalities: ["AUDIO", "TEXT"]
  setup_timeout_seconds: 3
context:
  static_text: "Rice: 12 bags"
security:
  max_websocket_connections: 50
"#,
    )
    .unwrap();

    unsafe {
        std::env::set_var("PORT", "9999");
        std::env::set_var("GEMINI_API_KEY", "from-env");
    }
    let config = ServerConfig::from_file(&path);
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("GEMINI_API_KEY");
    }
    let config = config.unwrap();

    assert_eq!(config.address(), "127.0.0.1:4100");
    assert_eq!(config.live_voice, "Puck");
    assert_eq!(config.response_modalities.len(), 2);
    assert_eq!(config.setup_timeout(), Duration::from_secs(3));
    assert_eq!(config.shop_context.as_deref(), Some("Rice: 12 bags"));
    assert_eq!(config.max_websocket_connections, Some(50));
    assert_eq!(config.gemini_api_key.as_deref(), Some("from-env"));
    assert!(!config.is_tls_enabled());
}

#[test]
#[serial]
fn test_invalid_yaml_values_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "live:\n  temperature: 7.5\n").unwrap();

    assert!(matches!(
        ServerConfig::from_file(&path),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
#[serial]
fn test_missing_config_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.yaml");

    assert!(matches!(
        ServerConfig::from_file(&path),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
#[serial]
fn test_example_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.yaml");
    let config = ServerConfig::from_file(&path).unwrap();

    assert_eq!(config.port, 3001);
    assert_eq!(config.live_voice, "Kore");
    assert_eq!(config.shop_api_url.as_deref(), Some("http://localhost:8000"));
    assert_eq!(config.max_websocket_connections, Some(500));
}
