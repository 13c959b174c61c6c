//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits >= 1, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Whitelist entries are not validated here: unparsable entries never
//!   match, they do not stop the process

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("pagination.max_limit ({max}) is below pagination.default_limit ({default})")]
    LimitBelowDefault { max: u64, default: u64 },

    #[error("access.audit_log_path must not be empty")]
    EmptyAuditPath,

    #[error("invalid collection name: {0:?}")]
    CollectionName(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let non_zero = [
        ("timeouts.request_secs", config.timeouts.request_secs == 0),
        ("listener.max_body_size", config.listener.max_body_size == 0),
        ("pagination.default_limit", config.pagination.default_limit == 0),
        ("notifications.channel_capacity", config.notifications.channel_capacity == 0),
    ];
    for (field, zero) in non_zero {
        if zero {
            errors.push(ValidationError::Zero { field });
        }
    }

    if let Some(max) = config.pagination.max_limit {
        if max < config.pagination.default_limit {
            errors.push(ValidationError::LimitBelowDefault {
                max,
                default: config.pagination.default_limit,
            });
        }
    }

    if config.access.audit_log_path.trim().is_empty() {
        errors.push(ValidationError::EmptyAuditPath);
    }

    for name in config.collections.keys() {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            errors.push(ValidationError::CollectionName(name.clone()));
        }
    }

    if !config.access.development_mode && config.access.frontend_domain.is_empty() {
        tracing::warn!("access.frontend_domain is empty; only whitelisted IPs will be admitted");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CollectionConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.pagination.default_limit = 20;
        config.pagination.max_limit = Some(5);
        config.access.audit_log_path = " ".into();
        config
            .collections
            .insert("bad/name".into(), CollectionConfig::default());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::Zero { field: "timeouts.request_secs" }));
        assert!(errors.contains(&ValidationError::LimitBelowDefault { max: 5, default: 20 }));
        assert!(errors.contains(&ValidationError::CollectionName("bad/name".into())));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::Zero { field: "timeouts.request_secs" };
        assert_eq!(err.to_string(), "timeouts.request_secs must be greater than zero");
    }
}
