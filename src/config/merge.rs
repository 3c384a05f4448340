use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::core::realtime::ResponseModality;
use crate::core::realtime::gemini::{GEMINI_LIVE_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiVoice};

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, TlsConfig};

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 3001;
pub(super) const DEFAULT_TEMPERATURE: f32 = 0.6;
pub(super) const DEFAULT_SETUP_TIMEOUT_SECONDS: u64 = 10;
pub(super) const DEFAULT_CONTEXT_TIMEOUT_SECONDS: u64 = 5;
pub(super) const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 100;

/// Merge YAML values over environment values over defaults.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let gemini = yaml.gemini.unwrap_or_default();
    let live = yaml.live.unwrap_or_default();
    let context = yaml.context.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls = match server.tls {
        Some(tls) if tls.enabled == Some(false) => None,
        Some(tls) => merge_tls(
            tls.cert_path.or(env.tls_cert_path),
            tls.key_path.or(env.tls_key_path),
        )?,
        None => merge_tls(env.tls_cert_path, env.tls_key_path)?,
    };

    let modality_names = live
        .response_modalities
        .or(env.response_modalities)
        .unwrap_or_else(|| vec![ResponseModality::Audio.as_str().to_string()]);

    Ok(ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,

        gemini_api_key: gemini.api_key.or(env.gemini_api_key),
        gemini_endpoint: gemini
            .endpoint
            .or(env.gemini_endpoint)
            .unwrap_or_else(|| GEMINI_LIVE_URL.to_string()),

        live_model: live
            .model
            .or(env.live_model)
            .unwrap_or_else(|| GEMINI_LIVE_DEFAULT_MODEL.to_string()),
        live_voice: live
            .voice
            .or(env.live_voice)
            .unwrap_or_else(|| GeminiVoice::default().as_str().to_string()),
        response_modalities: parse_modalities(&modality_names)?,
        temperature: live
            .temperature
            .or(env.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE),
        system_instruction: live.system_instruction.or(env.system_instruction),
        setup_timeout_seconds: live
            .setup_timeout_seconds
            .or(env.setup_timeout_seconds)
            .unwrap_or(DEFAULT_SETUP_TIMEOUT_SECONDS),

        shop_api_url: context.shop_api_url.or(env.shop_api_url),
        shop_context: context.static_text.or(env.shop_context),
        context_timeout_seconds: context
            .timeout_seconds
            .or(env.context_timeout_seconds)
            .unwrap_or(DEFAULT_CONTEXT_TIMEOUT_SECONDS),

        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
        max_websocket_connections: security
            .max_websocket_connections
            .or(env.max_websocket_connections),
        max_connections_per_ip: security
            .max_connections_per_ip
            .or(env.max_connections_per_ip)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    })
}

fn merge_tls(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, ConfigError> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Validation(
            "TLS certificate path is set but the key path is missing".to_string(),
        )),
        (None, Some(_)) => Err(ConfigError::Validation(
            "TLS key path is set but the certificate path is missing".to_string(),
        )),
    }
}

fn parse_modalities(names: &[String]) -> Result<BTreeSet<ResponseModality>, ConfigError> {
    names
        .iter()
        .map(|name| {
            ResponseModality::parse(name).ok_or_else(|| ConfigError::InvalidValue {
                name: "response_modalities".to_string(),
                reason: format!("unknown modality '{name}' (expected AUDIO or TEXT)"),
            })
        })
        .collect()
}
