//! Upstream realtime session module.
//!
//! This module provides the abstraction the voice bridge uses to reach a remote
//! conversational model over a streaming session, and the provider adapters
//! behind it.
//!
//! # Supported Providers
//!
//! - **Gemini Live API** - Full duplex audio and text with native-audio models
//!
//! # Architecture
//!
//! - [`UpstreamConnector`] opens sessions; one connector is shared process-wide
//! - [`UpstreamSession`] owns one open session (send / receive / close)
//! - [`ServerEvent`] is the provider-neutral event every adapter emits
//!
//! # Example
//!
//! ```rust,ignore
//! use kirana_gateway::core::realtime::{create_upstream_connector, LiveSessionConfig};
//!
//! let connector = create_upstream_connector("gemini", UpstreamOptions {
//!     api_key: Some(key),
//!     ..Default::default()
//! })?;
//! let mut session = connector.open("gemini-2.0-flash-live-001", &LiveSessionConfig::default(), "").await?;
//! ```

mod base;
pub mod gemini;

use std::sync::Arc;
use std::time::Duration;

pub use base::{
    ClientFrame, ControlSignal, LiveSessionConfig, RealtimeError, RealtimeResult,
    ResponseModality, ServerEvent, UpstreamConnector, UpstreamEvents, UpstreamSender,
    UpstreamSession,
};
pub use gemini::{GEMINI_LIVE_URL, GeminiLiveConnector, GeminiVoice};

/// Supported upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamProvider {
    /// Google Gemini Live API
    Gemini,
}

impl UpstreamProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "gemini_live" | "gemini-live" | "google" => Some(UpstreamProvider::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for UpstreamProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Connection options shared by every provider.
#[derive(Debug, Clone, Default)]
pub struct UpstreamOptions {
    pub api_key: Option<String>,
    /// Endpoint override; the provider default is used when unset
    pub endpoint: Option<String>,
    pub setup_timeout: Option<Duration>,
}

/// Factory function to create an upstream connector.
///
/// # Supported Providers
///
/// - `"gemini"` - Gemini Live API
pub fn create_upstream_connector(
    provider_type: &str,
    options: UpstreamOptions,
) -> RealtimeResult<Arc<dyn UpstreamConnector>> {
    let provider = UpstreamProvider::parse(provider_type).ok_or_else(|| {
        RealtimeError::InvalidConfiguration(format!(
            "Unsupported upstream provider: {provider_type}. Supported providers: {}",
            get_supported_upstream_providers().join(", ")
        ))
    })?;
    create_upstream_connector_from_enum(provider, options)
}

/// Create an upstream connector from enum.
pub fn create_upstream_connector_from_enum(
    provider: UpstreamProvider,
    options: UpstreamOptions,
) -> RealtimeResult<Arc<dyn UpstreamConnector>> {
    match provider {
        UpstreamProvider::Gemini => {
            let api_key = options
                .api_key
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    RealtimeError::AuthenticationFailed(
                        "Gemini API key is required".to_string(),
                    )
                })?;
            let mut connector = GeminiLiveConnector::new(api_key);
            if let Some(endpoint) = options.endpoint {
                connector = connector.with_endpoint(endpoint);
            }
            if let Some(timeout) = options.setup_timeout {
                connector = connector.with_setup_timeout(timeout);
            }
            Ok(Arc::new(connector))
        }
    }
}

/// Get list of supported upstream providers.
pub fn get_supported_upstream_providers() -> Vec<&'static str> {
    vec!["gemini"]
}
