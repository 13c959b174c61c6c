//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request gate settings.
    pub access: AccessConfig,

    /// List endpoint paging defaults.
    pub pagination: PaginationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// WebSocket notification relay.
    pub notifications: NotificationConfig,

    /// Record store settings.
    pub store: StoreConfig,

    /// Collections exposed under `/api/{name}`.
    pub collections: BTreeMap<String, CollectionConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request gate configuration.
///
/// Loaded from the config file, then overridden by `NODE_ENV`,
/// `ALLOW_IP_LOCALHOST`, `IP_WHITELIST`, `FRONTEND_DOMAIN` and `API_DOMAIN`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Bypass every check. Only ever set from configuration.
    pub development_mode: bool,

    /// Let loopback clients through.
    pub allow_localhost: bool,

    /// Literal IPs and IPv4 CIDR ranges (e.g., "10.0.0.0/8").
    pub ip_whitelist: Vec<String>,

    /// Frontend domain matched against Origin/Referer (e.g., "example.com").
    pub frontend_domain: String,

    /// Public domain of this API; allowed as a CORS origin.
    pub api_domain: String,

    /// Append-only audit log for denied requests.
    pub audit_log_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            development_mode: false,
            allow_localhost: false,
            ip_whitelist: Vec::new(),
            frontend_domain: String::new(),
            api_domain: String::new(),
            audit_log_path: "logs/access-denied.log".to_string(),
        }
    }
}

/// Paging defaults for list endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the client sends no usable `limit`.
    pub default_limit: u64,

    /// Upper bound on `limit` (none by default).
    pub max_limit: Option<u64>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Notification relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Broadcast buffer per subscriber; slower clients skip older events.
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Optional JSON seed file loaded at startup.
    pub seed_path: Option<String>,
}

/// Per-collection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CollectionConfig {
    /// Relations loaded when the client sends `includePopulate=true`.
    /// Entries use the `path` or `path:field|field` form.
    pub default_populate: Vec<String>,
}

fn default_collections() -> BTreeMap<String, CollectionConfig> {
    let populate = |entries: &[&str]| CollectionConfig {
        default_populate: entries.iter().map(|e| e.to_string()).collect(),
    };
    BTreeMap::from([
        ("users".to_string(), populate(&[])),
        ("medications".to_string(), populate(&[])),
        ("prescriptions".to_string(), populate(&["doctor:name|email", "patient:name|email", "medication"])),
        ("appointments".to_string(), populate(&["doctor:name|email", "patient:name|email"])),
        ("schedules".to_string(), populate(&["doctor:name"])),
        ("adherence-logs".to_string(), populate(&["prescription", "patient:name"])),
        ("reports".to_string(), populate(&["patient:name"])),
    ])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            access: AccessConfig::default(),
            pagination: PaginationConfig::default(),
            observability: ObservabilityConfig::default(),
            notifications: NotificationConfig::default(),
            store: StoreConfig::default(),
            collections: default_collections(),
        }
    }
}
