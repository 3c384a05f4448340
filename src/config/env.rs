use std::env;
use std::str::FromStr;

use super::ConfigError;

/// Values read from process environment variables.
///
/// Every field is optional; defaults are applied in `merge`.
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub gemini_api_key: Option<String>,
    pub gemini_endpoint: Option<String>,

    pub live_model: Option<String>,
    pub live_voice: Option<String>,
    pub response_modalities: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    pub setup_timeout_seconds: Option<u64>,

    pub shop_api_url: Option<String>,
    pub shop_context: Option<String>,
    pub context_timeout_seconds: Option<u64>,

    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var("HOST"),
            port: parse_var("PORT")?,
            tls_cert_path: var("TLS_CERT_PATH"),
            tls_key_path: var("TLS_KEY_PATH"),

            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_endpoint: var("GEMINI_LIVE_URL"),

            live_model: var("LIVE_MODEL"),
            live_voice: var("LIVE_VOICE"),
            response_modalities: var("LIVE_RESPONSE_MODALITIES").map(|v| split_list(&v)),
            temperature: parse_var("LIVE_TEMPERATURE")?,
            system_instruction: var("LIVE_SYSTEM_INSTRUCTION"),
            setup_timeout_seconds: parse_var("LIVE_SETUP_TIMEOUT_SECONDS")?,

            shop_api_url: var("SHOP_API_URL"),
            shop_context: var("SHOP_CONTEXT"),
            context_timeout_seconds: parse_var("SHOP_CONTEXT_TIMEOUT_SECONDS")?,

            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
            max_websocket_connections: parse_var("MAX_WEBSOCKET_CONNECTIONS")?,
            max_connections_per_ip: parse_var("MAX_CONNECTIONS_PER_IP")?,
        })
    }
}

/// Read a variable, treating empty values as unset.
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

pub(super) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
