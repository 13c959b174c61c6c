//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /api or /ws request:
//!     → access_guard.rs (development bypass, Origin/Referer, client IP)
//!     → whitelist.rs (literal and IPv4 CIDR entries)
//!     → allowed: pass to handlers
//!     → denied: audit.rs (redacted record, one append) → 403
//! ```
//!
//! # Design Decisions
//! - Fail closed: a request is denied unless some rule admits it
//! - No trust in client input; the denial reason never reaches the client

pub mod access_guard;
pub mod audit;
pub mod whitelist;

pub use access_guard::{access_guard_middleware, AccessGuard, AllowReason, DenialReason, GuardState};
pub use audit::{AuditLog, AuditRecord};
pub use whitelist::{Whitelist, WhitelistEntry};
