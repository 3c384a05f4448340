//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::core::context::{ShopContextProvider, StaticContextProvider, create_context_provider};
use crate::core::realtime::{
    GeminiLiveConnector, UpstreamConnector, create_upstream_connector,
};
use crate::handlers::live::BridgeSettings;

/// Why a new WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// Process-wide state shared by every request.
pub struct AppState {
    pub config: ServerConfig,
    bridge: BridgeSettings,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// A missing API key does not stop the server: each session then fails at
    /// connect time and the client is told so.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let connector: Arc<dyn UpstreamConnector> =
            match create_upstream_connector("gemini", config.upstream_options()) {
                Ok(connector) => connector,
                Err(e) => {
                    tracing::warn!("Upstream connector unavailable: {}", e);
                    Arc::new(
                        GeminiLiveConnector::new(String::new())
                            .with_endpoint(config.gemini_endpoint.clone()),
                    )
                }
            };

        let context: Arc<dyn ShopContextProvider> = match create_context_provider(
            config.shop_api_url.as_deref(),
            config.shop_context.as_deref(),
            config.context_timeout(),
        ) {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!("Shop context provider unavailable: {}", e);
                Arc::new(StaticContextProvider::empty())
            }
        };

        tracing::info!(
            provider = connector.provider_name(),
            context = context.name(),
            model = %config.live_model,
            "Application state initialised"
        );

        Self::with_components(config, connector, context)
    }

    /// Build state around explicit collaborators.
    pub fn with_components(
        config: ServerConfig,
        connector: Arc<dyn UpstreamConnector>,
        context: Arc<dyn ShopContextProvider>,
    ) -> Arc<Self> {
        let bridge = BridgeSettings {
            connector,
            context,
            model: config.live_model.clone(),
            session_config: Arc::new(config.live_session_config()),
        };
        Arc::new(Self {
            config,
            bridge,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Settings every bridge session is opened with.
    pub fn bridge_settings(&self) -> BridgeSettings {
        self.bridge.clone()
    }

    /// Reserve a connection slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        // Reserve globally first so concurrent upgrades can't overshoot the cap.
        let previous = self.ws_connections.fetch_add(1, Ordering::SeqCst);
        if let Some(max) = self.config.max_websocket_connections
            && previous >= max
        {
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::GlobalLimitReached);
        }

        let mut entry = self.ip_connections.entry(ip).or_insert(0);
        if *entry >= self.config.max_connections_per_ip as usize {
            drop(entry);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *entry += 1;
        Ok(())
    }

    /// Release a slot previously acquired for `ip`.
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        self.ip_connections
            .remove_if_mut(&ip, |_, count| {
                *count = count.saturating_sub(1);
                *count == 0
            });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|c| *c).unwrap_or(0)
    }
}

/// Releases a connection slot when dropped.
pub struct ConnectionGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionGuard {
    /// Take ownership of a slot already acquired for `ip`.
    pub fn new(state: Arc<AppState>, ip: IpAddr) -> Self {
        Self { state, ip }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn state_with_limits(global: Option<usize>, per_ip: u32) -> Arc<AppState> {
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

    #[test]
    fn test_connection_tracking_basic() {
        let state = state_with_limits(Some(10), 3);
        let ip: IpAddr = Ipv4Addr::new(192, 168, 1, 100).into();

        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);

        for n in 1..=3 {
            assert!(state.try_acquire_connection(ip).is_ok());
            assert_eq!(state.ip_connection_count(&ip), n);
        }

        assert_eq!(
            state.try_acquire_connection(ip),
            Err(ConnectionLimitError::PerIpLimitReached)
        );
        assert_eq!(state.ws_connection_count(), 3);

        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 2);
        assert!(state.try_acquire_connection(ip).is_ok());
    }

    #[test]
    fn test_global_connection_limit() {
        let state = state_with_limits(Some(2), 10);
        let a: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        let b: IpAddr = Ipv4Addr::new(10, 0, 0, 2).into();

        assert!(state.try_acquire_connection(a).is_ok());
        assert!(state.try_acquire_connection(b).is_ok());
        assert_eq!(
            state.try_acquire_connection(a),
            Err(ConnectionLimitError::GlobalLimitReached)
        );
        assert_eq!(state.ws_connection_count(), 2);
    }

    #[test]
    fn test_release_removes_idle_ip_entry() {
        let state = state_with_limits(None, 5);
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();

        state.try_acquire_connection(ip).unwrap();
        state.release_connection(ip);
        state.release_connection(ip);

        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let state = state_with_limits(None, 5);
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();

        state.try_acquire_connection(ip).unwrap();
        {
            let _guard = ConnectionGuard::new(state.clone(), ip);
            assert_eq!(state.ws_connection_count(), 1);
        }
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_new_without_api_key_still_builds() {
        let state = AppState::new(ServerConfig::default()).await;
        assert_eq!(state.bridge_settings().connector.provider_name(), "gemini");
        assert_eq!(state.bridge_settings().context.name(), "static");
    }
}
