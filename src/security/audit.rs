//! Audit trail for denied requests.
//!
//! # Responsibilities
//! - Capture a redacted snapshot of a rejected request
//! - Append it to the audit file as one complete write
//!
//! # Design Decisions
//! - Headers and body fields are allow-listed; anything else is dropped
//! - Nested body values are replaced with a marker, never written
//! - The elapsed-time counter is owned by the log, not process-global

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::request::Parts;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::security::access_guard::DenialReason;
use crate::store::memory::now_timestamp;

/// Largest request body read for the audit snapshot.
pub const AUDIT_BODY_LIMIT: usize = 64 * 1024;

/// Marker written in place of object or array body values.
pub const REDACTED: &str = "[REDACTED]";

const AUDIT_HEADERS: [&str; 10] = [
    "host",
    "origin",
    "referer",
    "user-agent",
    "content-type",
    "accept",
    "accept-language",
    "x-forwarded-for",
    "x-real-ip",
    "x-request-id",
];

const AUDIT_BODY_FIELDS: [&str; 7] = ["email", "username", "role", "action", "type", "status", "deviceId"];

/// Snapshot of one rejected request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: String,
    pub method: String,
    pub url: String,
    pub host: Option<String>,
    pub client_ip: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Map<String, Value>>,
    pub reason: String,
}

impl AuditRecord {
    pub fn from_parts(
        parts: &Parts,
        client_ip: String,
        body: Option<&Value>,
        reason: &DenialReason,
    ) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let headers = AUDIT_HEADERS
            .iter()
            .filter_map(|name| header(*name).map(|value| (name.to_string(), value)))
            .collect();

        let query_params = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            timestamp: now_timestamp(),
            method: parts.method.to_string(),
            url: parts.uri.to_string(),
            host: header("host"),
            client_ip,
            origin: header("origin"),
            referer: header("referer"),
            headers,
            query_params,
            body: body.and_then(sanitize_body),
            reason: reason.to_string(),
        }
    }
}

/// Keep allow-listed top-level fields; nested values become [`REDACTED`].
pub fn sanitize_body(body: &Value) -> Option<Map<String, Value>> {
    let Value::Object(fields) = body else {
        return None;
    };
    let kept: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| AUDIT_BODY_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = match value {
                Value::Object(_) | Value::Array(_) => Value::String(REDACTED.into()),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    (!kept.is_empty()).then_some(kept)
}

/// Time elapsed since the previous audit entry.
#[derive(Debug, Default)]
pub struct DeltaClock {
    last: Option<Instant>,
}

impl DeltaClock {
    /// Zero on the first tick.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last = Some(now);
        delta
    }
}

/// Append-only audit file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    clock: Mutex<DeltaClock>,
    write_lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: Mutex::new(DeltaClock::default()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry. The entry reaches the file in a single `write_all`.
    pub async fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let delta = self
            .clock
            .lock()
            .map(|mut clock| clock.tick(Instant::now()))
            .unwrap_or_default();
        let entry = format_entry(record, delta)?;

        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);
        tokio::task::spawn_blocking(move || {
            let _guard = write_lock.lock().map_err(|_| io::Error::other("audit lock poisoned"))?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(entry.as_bytes())
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// `[timestamp] ACCESS DENIED +Nms` header, pretty JSON, blank line.
pub fn format_entry(record: &AuditRecord, delta: Duration) -> io::Result<String> {
    let json = serde_json::to_string_pretty(record).map_err(io::Error::other)?;
    Ok(format!(
        "[{}] ACCESS DENIED +{}ms\n{}\n\n",
        record.timestamp,
        delta.as_millis(),
        json
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn parts(uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri(uri)
            .header("host", "api.example.com")
            .header("origin", "https://evil.test")
            .header("authorization", "Bearer secret")
            .header("cookie", "session=abc")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    fn record() -> AuditRecord {
        AuditRecord::from_parts(
            &parts("/api/users?page=2&role=ADMIN"),
            "203.0.114.5".into(),
            Some(&json!({
                "email": "a@b.test",
                "password": "hunter2",
                "role": {"name": "ADMIN"},
                "status": ["x"],
            })),
            &DenialReason::NotWhitelisted("203.0.114.5".into()),
        )
    }

    #[test]
    fn test_record_keeps_only_allowed_headers() {
        let record = record();
        assert_eq!(record.method, "POST");
        assert_eq!(record.url, "/api/users?page=2&role=ADMIN");
        assert_eq!(record.host.as_deref(), Some("api.example.com"));
        assert_eq!(record.origin.as_deref(), Some("https://evil.test"));
        assert!(record.referer.is_none());
        assert!(record.headers.contains_key("user-agent"));
        assert!(!record.headers.contains_key("authorization"));
        assert!(!record.headers.contains_key("cookie"));
        assert_eq!(record.query_params["page"], "2");
        assert_eq!(record.query_params["role"], "ADMIN");
    }

    #[test]
    fn test_body_is_redacted() {
        let body = record().body.unwrap();
        assert_eq!(body["email"], "a@b.test");
        assert_eq!(body["role"], REDACTED);
        assert_eq!(body["status"], REDACTED);
        assert!(!body.contains_key("password"));

        assert!(sanitize_body(&json!({"password": "x"})).is_none());
        assert!(sanitize_body(&json!(["email"])).is_none());
    }

    #[test]
    fn test_delta_clock() {
        let mut clock = DeltaClock::default();
        let start = Instant::now();
        assert_eq!(clock.tick(start), Duration::ZERO);
        assert_eq!(clock.tick(start + Duration::from_millis(250)), Duration::from_millis(250));
        assert_eq!(clock.tick(start), Duration::ZERO);
    }

    #[test]
    fn test_entry_format() {
        let entry = format_entry(&record(), Duration::from_millis(42)).unwrap();
        assert!(entry.starts_with('['));
        assert!(entry.contains("] ACCESS DENIED +42ms\n{"));
        assert!(entry.contains("\"clientIp\": \"203.0.114.5\""));
        assert!(entry.ends_with("}\n\n"));
    }

    #[tokio::test]
    async fn test_append_creates_file_and_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("access-denied.log");
        let log = AuditLog::new(&path);

        log.append(&record()).await.unwrap();
        log.append(&record()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("ACCESS DENIED").count(), 2);
        assert!(content.contains("+0ms"));
        assert!(!content.contains("hunter2"));
    }
}
