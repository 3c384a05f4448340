use url::Url;

use super::{ConfigError, ServerConfig};

/// Validate a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_port(config.port)?;
    validate_temperature(config.temperature)?;
    validate_modalities(config)?;
    validate_timeouts(config)?;
    validate_endpoint(&config.gemini_endpoint)?;
    validate_connection_limits(config)?;
    if let Some(url) = &config.shop_api_url {
        validate_shop_api_url(url)?;
    }
    Ok(())
}

fn validate_port(port: u16) -> Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::Validation("port must be non-zero".to_string()));
    }
    Ok(())
}

fn validate_temperature(temperature: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(format!(
            "temperature must be between 0.0 and 2.0, got {temperature}"
        )));
    }
    Ok(())
}

fn validate_modalities(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.response_modalities.is_empty() {
        return Err(ConfigError::Validation(
            "at least one response modality is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_timeouts(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.setup_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "setup_timeout_seconds must be non-zero".to_string(),
        ));
    }
    if config.context_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "context timeout_seconds must be non-zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::Validation(format!("invalid Gemini endpoint '{endpoint}': {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "Gemini endpoint must use ws or wss, got '{other}'"
        ))),
    }
}

fn validate_shop_api_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::Validation(format!("invalid shop API URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "shop API URL must use http or https, got '{other}'"
        ))),
    }
}

fn validate_connection_limits(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.max_connections_per_ip == 0 {
        return Err(ConfigError::Validation(
            "max_connections_per_ip must be non-zero".to_string(),
        ));
    }
    if config.max_websocket_connections == Some(0) {
        return Err(ConfigError::Validation(
            "max_websocket_connections must be non-zero when set".to_string(),
        ));
    }
    Ok(())
}
