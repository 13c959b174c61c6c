//! Broadcast hub for real-time notifications.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::store::memory::now_timestamp;

/// Event name for adherence log updates.
pub const ADHERENCE_UPDATED: &str = "adherence.updated";

/// One event pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub event: String,
    /// Recipient; `None` reaches every subscriber.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub payload: Value,
    pub emitted_at: String,
}

impl Notification {
    pub fn new(event: impl Into<String>, user_id: Option<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            user_id,
            payload,
            emitted_at: now_timestamp(),
        }
    }

    /// Whether a subscriber filtering on `user_id` should receive this.
    pub fn is_for(&self, user_id: Option<&str>) -> bool {
        match (self.user_id.as_deref(), user_id) {
            (None, _) | (_, None) => true,
            (Some(target), Some(user)) => target == user,
        }
    }
}

/// Fan-out of notifications to every open socket.
///
/// Publishing never blocks; a slow subscriber misses the oldest events.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers reached.
    pub fn publish(&self, notification: Notification) -> usize {
        metrics::record_notification(&notification.event);
        let event = notification.event.clone();
        match self.tx.send(notification) {
            Ok(receivers) => {
                tracing::debug!(event = %event, receivers, "Notification published");
                receivers
            }
            Err(_) => {
                tracing::trace!(event = %event, "Notification dropped: no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = NotificationHub::new(8);
        assert_eq!(hub.publish(Notification::new("x", None, json!({}))), 0);

        let mut rx = hub.subscribe();
        let sent = Notification::new(ADHERENCE_UPDATED, Some("u-1".into()), json!({"id": "a-1"}));
        assert_eq!(hub.publish(sent.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips() {
        let hub = NotificationHub::new(1);
        let mut rx = hub.subscribe();
        hub.publish(Notification::new("first", None, json!(1)));
        hub.publish(Notification::new("second", None, json!(2)));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().event, "second");
    }

    #[test]
    fn test_recipient_filter() {
        let targeted = Notification::new("e", Some("u-1".into()), json!(null));
        assert!(targeted.is_for(Some("u-1")));
        assert!(!targeted.is_for(Some("u-2")));
        assert!(targeted.is_for(None));

        let everyone = Notification::new("e", None, json!(null));
        assert!(everyone.is_for(Some("u-2")));
    }

    #[test]
    fn test_serialization() {
        let n = Notification::new(ADHERENCE_UPDATED, None, json!({"status": "TAKEN"}));
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["event"], "adherence.updated");
        assert!(value.get("userId").is_none());
        assert!(value["emittedAt"].is_string());
    }
}
