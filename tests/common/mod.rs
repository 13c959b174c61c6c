//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response};
use medisync_api::config::AppConfig;
use medisync_api::http::HttpServer;
use medisync_api::lifecycle::Shutdown;
use medisync_api::store::MemoryStore;
use serde_json::{json, Value};

pub const FRONTEND_DOMAIN: &str = "example.com";
pub const WHITELISTED_IP: &str = "203.0.113.7";
pub const OUTSIDE_IP: &str = "198.51.100.23";

/// Production-like gate: frontend domain plus one whitelisted range, audit
/// log inside `dir`.
pub fn guarded_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.access.frontend_domain = FRONTEND_DOMAIN.into();
    config.access.ip_whitelist = vec!["203.0.113.0/24".into()];
    config.access.audit_log_path = dir.join("access-denied.log").display().to_string();
    config
}

/// Twelve medications (8 ACTIVE, 2 INACTIVE, 2 DISCONTINUED, one of them
/// soft-deleted) and two prescriptions with embedded relations.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::with_collections(["medications", "prescriptions", "adherence-logs"]);

    let medications = store.collection("medications").unwrap();
    for i in 0..12 {
        let status = match i {
            0..=7 => "ACTIVE",
            8 | 9 => "INACTIVE",
            _ => "DISCONTINUED",
        };
        let mut record = json!({
            "id": format!("med-{i:02}"),
            "name": format!("Medication {i:02}"),
            "status": status,
            "stock": i * 10,
            "createdAt": format!("2024-01-{:02}T08:00:00.000Z", i + 1),
        });
        if i == 11 {
            record["deletedAt"] = json!("2024-02-01T00:00:00.000Z");
        }
        medications.insert(record).unwrap();
    }

    let prescriptions = store.collection("prescriptions").unwrap();
    prescriptions
        .insert(json!({
            "id": "rx-1",
            "status": "ACTIVE",
            "patientId": "p-1",
            "doctor": {"name": "Dr. Adams", "email": "adams@example.com", "phone": "555-0100"},
            "patient": {"name": "Pat One", "email": "pat@example.com"},
            "createdAt": "2024-03-01T09:00:00.000Z",
        }))
        .unwrap();
    prescriptions
        .insert(json!({
            "id": "rx-2",
            "status": "COMPLETED",
            "patientId": "p-2",
            "doctor": {"name": "Dr. Baker", "email": "baker@example.com", "phone": "555-0101"},
            "patient": {"name": "Pat Two", "email": "two@example.com"},
            "createdAt": "2024-03-02T09:00:00.000Z",
        }))
        .unwrap();

    store
        .collection("adherence-logs")
        .unwrap()
        .insert(json!({
            "id": "log-1",
            "patientId": "p-1",
            "status": "PENDING",
            "createdAt": "2024-03-03T08:00:00.000Z",
        }))
        .unwrap();

    Arc::new(store)
}

pub fn server(config: AppConfig) -> HttpServer {
    HttpServer::with_store(config, seeded_store())
}

/// Build a request as if it arrived over a socket from `peer`.
pub fn request_from(
    method: Method,
    uri: &str,
    peer: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let mut request = builder.body(body).unwrap();
    let addr = SocketAddr::new(peer.parse().unwrap(), 51000);
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn get_from(uri: &str, peer: &str) -> Request<Body> {
    request_from(Method::GET, uri, peer, &[], None)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve `server` on an ephemeral port. Drop the returned [`Shutdown`]
/// after triggering it to stop the server.
pub async fn spawn_server(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}
