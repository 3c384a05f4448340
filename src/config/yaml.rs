use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Environment
/// variables fill in anything the file leaves unset.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     cert_path: "/etc/kirana/cert.pem"
///     key_path: "/etc/kirana/key.pem"
///
/// gemini:
///   api_key: "your-gemini-key"
///   endpoint: "wss://generativelanguage.googleapis.com/ws/..."
///
/// live:
///   model: "gemini-2.5-flash-native-audio-preview-09-2025"
///   voice: "Kore"
///   response_modalities: ["AUDIO"]
///   temperature: 0.6
///   system_instruction: "You are KiranaAI."
///   setup_timeout_seconds: 10
///
/// context:
///   shop_api_url: "http://localhost:8000"
///   static_text: "Rice: 25 units"
///   timeout_seconds: 5
///
/// security:
///   cors_allowed_origins: "https://shop.example.com"
///   max_websocket_connections: 500
///   max_connections_per_ip: 20
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub live: Option<LiveYaml>,
    pub context: Option<ContextYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Gemini credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Live session options from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LiveYaml {
    pub model: Option<String>,
    pub voice: Option<String>,
    pub response_modalities: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    pub setup_timeout_seconds: Option<u64>,
}

/// Shop context source from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ContextYaml {
    /// Base URL of the inventory/sales API
    pub shop_api_url: Option<String>,
    /// Fixed context used when no API is configured
    pub static_text: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// `*`, or a comma-separated list of origins
    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
