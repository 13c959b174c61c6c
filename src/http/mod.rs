//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS, limits)
//!     → security::access_guard (for /api and /ws routes)
//!     → handlers.rs (resolve query → merge scope → store)
//!     → response.rs (ApiResponse envelope or ApiError body)
//!     → Send to client
//!
//! Notifications:
//!     handlers.rs → NotificationHub → websocket.rs → client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ApiError, ApiResponse};
pub use server::{AppState, HttpServer};
