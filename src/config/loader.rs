//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AccessConfig, AppConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: TOML file (if given), then environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    finalize_config(read_config(path)?)
}

/// Read the TOML file only; defaults when no path is given.
pub fn read_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => parse_config(&fs::read_to_string(path).map_err(ConfigError::Io)?),
        None => Ok(AppConfig::default()),
    }
}

/// Apply process environment overrides, then validate.
pub fn finalize_config(mut config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_access_env(&mut config.access, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML document; absent sections take their defaults.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Overlay the request-gate environment variables onto `access`.
///
/// A malformed `IP_WHITELIST` empties the whitelist rather than failing.
pub fn apply_access_env<F>(access: &mut AccessConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env) = var("NODE_ENV") {
        access.development_mode = env.trim() == "development";
    }
    if let Some(allow) = var("ALLOW_IP_LOCALHOST") {
        access.allow_localhost = allow.trim() == "true";
    }
    if let Some(raw) = var("IP_WHITELIST") {
        access.ip_whitelist = match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "IP_WHITELIST is not a JSON array of strings; using an empty whitelist");
                Vec::new()
            }
        };
    }
    if let Some(domain) = var("FRONTEND_DOMAIN") {
        access.frontend_domain = domain.trim().to_string();
    }
    if let Some(domain) = var("API_DOMAIN") {
        access.api_domain = domain.trim().to_string();
    }
}
