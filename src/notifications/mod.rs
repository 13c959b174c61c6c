//! Real-time notification relay.
//!
//! # Data Flow
//! ```text
//! handler (e.g. adherence log update)
//!     → hub.rs (broadcast channel)
//!     → http/websocket.rs (one task per socket, filtered by userId)
//!     → client
//! ```
//!
//! # Design Decisions
//! - No ordering, retry or backpressure guarantees beyond the channel's
//! - Lagging sockets skip dropped events and keep going

pub mod hub;

pub use hub::{Notification, NotificationHub, ADHERENCE_UPDATED};
