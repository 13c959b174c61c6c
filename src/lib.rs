//! MediSync API library: query resolution, access guard, record store and
//! the HTTP surface built on them.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod notifications;
pub mod observability;
pub mod query;
pub mod security;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use query::{QueryDescriptor, QueryResolver};
pub use security::AccessGuard;
