//! Network tests: a bound server, reqwest clients and WebSocket subscribers.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;

mod common;

use common::{guarded_config, server, spawn_server};

async fn next_json<S>(socket: &mut S) -> Value
where
    S: StreamExt<Item = Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("notification timed out")
        .expect("socket closed")
        .expect("socket error");
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_adherence_update_reaches_patient_socket() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = guarded_config(dir.path());
    config.access.allow_localhost = true;
    let (addr, shutdown) = spawn_server(server(config)).await;

    let (mut patient, _) = connect_async(format!("ws://{addr}/ws/notifications?userId=p-1"))
        .await
        .unwrap();
    let (mut other, _) = connect_async(format!("ws://{addr}/ws/notifications?userId=p-2"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .put(format!("http://{addr}/api/adherence-logs/log-1"))
        .json(&json!({"status": "TAKEN"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let notification = next_json(&mut patient).await;
    assert_eq!(notification["event"], "adherence.updated");
    assert_eq!(notification["userId"], "p-1");
    assert_eq!(notification["payload"]["status"], "TAKEN");

    let nothing = tokio::time::timeout(Duration::from_millis(200), other.next()).await;
    assert!(nothing.is_err(), "other patient must not be notified");

    shutdown.trigger();
}

#[tokio::test]
async fn test_other_collections_do_not_notify() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = guarded_config(dir.path());
    config.access.allow_localhost = true;
    let (addr, shutdown) = spawn_server(server(config)).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/notifications")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .put(format!("http://{addr}/api/medications/med-01"))
        .json(&json!({"stock": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let nothing = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(nothing.is_err());

    shutdown.trigger();
}

#[tokio::test]
async fn test_socket_peer_address_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let config = guarded_config(dir.path());
    let audit_path = config.access.audit_log_path.clone();
    let (addr, shutdown) = spawn_server(server(config)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let res = client
        .get(format!("http://{addr}/api/medications"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Access denied");

    let audit = std::fs::read_to_string(&audit_path).unwrap();
    assert!(audit.contains("\"clientIp\": \"127.0.0.1\""));

    // WebSocket upgrades go through the same gate.
    assert!(connect_async(format!("ws://{addr}/ws/notifications")).await.is_err());

    let res = client
        .get(format!("http://{addr}/api/medications"))
        .header("origin", "https://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}
