//! Configuration module for the Kirana gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use kirana_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variables filling the gaps
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::realtime::{LiveSessionConfig, ResponseModality, UpstreamOptions};
use crate::core::realtime::gemini::{GEMINI_LIVE_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiVoice};

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Process-wide and immutable once loaded; it is injected into the upstream
/// connector and the context provider at startup.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    /// Gemini API key; sessions fail to connect without it
    pub gemini_api_key: Option<String>,
    pub gemini_endpoint: String,

    pub live_model: String,
    pub live_voice: String,
    pub response_modalities: BTreeSet<ResponseModality>,
    pub temperature: f32,
    pub system_instruction: Option<String>,
    pub setup_timeout_seconds: u64,

    /// Base URL of the inventory/sales API used for priming context
    pub shop_api_url: Option<String>,
    /// Fixed priming context when no shop API is configured
    pub shop_context: Option<String>,
    pub context_timeout_seconds: u64,

    // Security settings
    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: merge::DEFAULT_HOST.to_string(),
            port: merge::DEFAULT_PORT,
            tls: None,
            gemini_api_key: None,
            gemini_endpoint: GEMINI_LIVE_URL.to_string(),
            live_model: GEMINI_LIVE_DEFAULT_MODEL.to_string(),
            live_voice: GeminiVoice::default().as_str().to_string(),
            response_modalities: BTreeSet::from([ResponseModality::Audio]),
            temperature: merge::DEFAULT_TEMPERATURE,
            system_instruction: None,
            setup_timeout_seconds: merge::DEFAULT_SETUP_TIMEOUT_SECONDS,
            shop_api_url: None,
            shop_context: None,
            context_timeout_seconds: merge::DEFAULT_CONTEXT_TIMEOUT_SECONDS,
            cors_allowed_origins: None,
            max_websocket_connections: None,
            max_connections_per_ip: merge::DEFAULT_MAX_CONNECTIONS_PER_IP,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gemini_endpoint", &self.gemini_endpoint)
            .field("live_model", &self.live_model)
            .field("live_voice", &self.live_voice)
            .field("response_modalities", &self.response_modalities)
            .field("temperature", &self.temperature)
            .field("setup_timeout_seconds", &self.setup_timeout_seconds)
            .field("shop_api_url", &self.shop_api_url)
            .field("context_timeout_seconds", &self.context_timeout_seconds)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("max_websocket_connections", &self.max_websocket_connections)
            .field("max_connections_per_ip", &self.max_connections_per_ip)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and defaults).
    ///
    /// The `.env` file is loaded in `main` before this runs, so its values are
    /// already visible as environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variables filling
    /// anything the file leaves unset.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_seconds)
    }

    pub fn context_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout_seconds)
    }

    /// Session options shared by every bridge session.
    pub fn live_session_config(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            response_modalities: self.response_modalities.clone(),
            voice: Some(self.live_voice.clone()),
            temperature: Some(self.temperature),
            system_instruction: self.system_instruction.clone(),
        }
    }

    /// Connection options for the upstream connector.
    pub fn upstream_options(&self) -> UpstreamOptions {
        UpstreamOptions {
            api_key: self.gemini_api_key.clone(),
            endpoint: Some(self.gemini_endpoint.clone()),
            setup_timeout: Some(self.setup_timeout()),
        }
    }
}
