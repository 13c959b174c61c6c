//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (NODE_ENV, ALLOW_IP_LOCALHOST, IP_WHITELIST, ... overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the whitelist lives for the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{finalize_config, load_config, read_config, ConfigError};
pub use schema::AccessConfig;
pub use schema::AppConfig;
pub use schema::CollectionConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::PaginationConfig;
