//! Access guard middleware.
//! Admits requests from the frontend domain, loopback (when enabled) or
//! whitelisted addresses; everything else is denied and audited.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;

use crate::config::AccessConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::audit::{AuditLog, AuditRecord, AUDIT_BODY_LIMIT};
use crate::security::whitelist::Whitelist;

const LOOPBACK: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Why a request was admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    DevelopmentMode,
    TrustedOrigin,
    Localhost,
    Whitelisted(String),
}

/// Why a request was rejected. Recorded server-side only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenialReason {
    #[error("loopback client {0} rejected: localhost access is disabled")]
    LocalhostDisabled(String),

    #[error("client {0} is not whitelisted and origin is not trusted")]
    NotWhitelisted(String),

    #[error("client address unknown and origin is not trusted")]
    UnknownClient,
}

impl DenialReason {
    /// Low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DenialReason::LocalhostDisabled(_) => "localhost_disabled",
            DenialReason::NotWhitelisted(_) => "not_whitelisted",
            DenialReason::UnknownClient => "unknown_client",
        }
    }
}

/// Immutable request gate built once from configuration.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    development_mode: bool,
    allow_localhost: bool,
    whitelist: Whitelist,
    frontend_domain: String,
}

impl AccessGuard {
    pub fn new(config: &AccessConfig) -> Self {
        let guard = Self {
            development_mode: config.development_mode,
            allow_localhost: config.allow_localhost,
            whitelist: Whitelist::from_entries(&config.ip_whitelist),
            frontend_domain: config.frontend_domain.trim().to_lowercase(),
        };
        if guard.development_mode {
            tracing::warn!("Development mode: access guard admits every request");
        } else if guard.whitelist.is_empty() {
            tracing::warn!("IP whitelist is empty");
        }
        tracing::info!(
            development_mode = guard.development_mode,
            allow_localhost = guard.allow_localhost,
            whitelist_entries = guard.whitelist.len(),
            frontend_domain = %guard.frontend_domain,
            "Access guard configured"
        );
        guard
    }

    /// Decide whether a request may proceed.
    pub fn check(
        &self,
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> Result<AllowReason, DenialReason> {
        if self.development_mode {
            return Ok(AllowReason::DevelopmentMode);
        }

        let origin = header_value(headers, "origin").or_else(|| header_value(headers, "referer"));
        if let Some(origin) = origin {
            if matches_domain(origin, &self.frontend_domain) {
                return Ok(AllowReason::TrustedOrigin);
            }
        }

        let ip = normalize_ip(&client_ip(headers, remote_addr));
        if ip.is_empty() {
            return Err(DenialReason::UnknownClient);
        }

        let loopback = LOOPBACK.contains(&ip.as_str());
        if loopback && self.allow_localhost {
            return Ok(AllowReason::Localhost);
        }

        if let Some(entry) = self.whitelist.find(&ip) {
            return Ok(AllowReason::Whitelisted(entry.to_string()));
        }

        if loopback {
            Err(DenialReason::LocalhostDisabled(ip))
        } else {
            Err(DenialReason::NotWhitelisted(ip))
        }
    }
}

/// First non-empty value of a header.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Client address: `X-Real-IP`, then the first `X-Forwarded-For` hop, then
/// the socket peer, else empty.
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    let first_entry = |name: &str| {
        header_value(headers, name)
            .and_then(|v| v.split(',').map(str::trim).find(|s| !s.is_empty()))
            .map(str::to_string)
    };

    first_entry("x-real-ip")
        .or_else(|| first_entry("x-forwarded-for"))
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

/// Trim, lower-case and strip the IPv4-mapped `::ffff:` prefix.
pub fn normalize_ip(ip: &str) -> String {
    let ip = ip.trim().to_lowercase();
    match ip.strip_prefix("::ffff:") {
        Some(v4) => v4.to_string(),
        None => ip,
    }
}

/// Whether an Origin/Referer value belongs to `domain` or one of its
/// subdomains. An empty domain matches nothing.
pub fn matches_domain(candidate: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    let candidate = candidate.trim().to_lowercase();
    let rest = candidate
        .strip_prefix("https://")
        .or_else(|| candidate.strip_prefix("http://"))
        .unwrap_or(&candidate);

    rest == domain
        || rest.starts_with(&format!("{domain}/"))
        || rest.ends_with(&format!(".{domain}"))
        || rest.contains(&format!(".{domain}/"))
}

/// State required by [`access_guard_middleware`].
#[derive(Clone)]
pub struct GuardState {
    pub guard: Arc<AccessGuard>,
    pub audit: Arc<AuditLog>,
}

pub async fn access_guard_middleware(
    State(state): State<GuardState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let reason = match state.guard.check(req.headers(), remote_addr) {
        Ok(allowed) => {
            tracing::trace!(reason = ?allowed, "Request admitted");
            return next.run(req).await;
        }
        Err(reason) => reason,
    };

    metrics::record_access_denied(reason.label());

    let ip = normalize_ip(&client_ip(req.headers(), remote_addr));
    let (parts, body) = req.into_parts();
    let body: Option<Value> = axum::body::to_bytes(body, AUDIT_BODY_LIMIT)
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    let record = AuditRecord::from_parts(&parts, ip, body.as_ref(), &reason);
    tracing::warn!(
        client_ip = %record.client_ip,
        method = %record.method,
        url = %record.url,
        reason = %reason,
        "Access denied"
    );

    if let Err(e) = state.audit.append(&record).await {
        tracing::error!(error = %e, path = %state.audit.path().display(), "Failed to write audit entry");
    }

    ApiError::AccessDenied.into_response()
}
