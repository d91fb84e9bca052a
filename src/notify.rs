//! Push notifications, fire-and-forget.
//!
//! The core only promises to hand a `(recipient, title, body)` triple to
//! a relay; whether it arrives on a phone is somebody else's problem. No
//! delivery tracking, no retries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::Order;
use crate::errors::{Error, Result};
use crate::http::{call, Request};

/// The message shape the push relay accepts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Opaque recipient token; we pass through whatever the auth side
    /// registered.
    pub to: String,
    pub title: String,
    pub body: String,
    pub sound: String,
}

impl PushMessage {
    pub fn new(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> PushMessage {
        PushMessage {
            to: to.into(),
            title: title.into(),
            body: body.into(),
            sound: "default".to_string(),
        }
    }

    /// Tell the admin a hotel just placed an order.
    pub fn order_placed(order: &Order) -> PushMessage {
        PushMessage::new(
            "admin",
            "New order",
            format!(
                "Hotel {} ordered {} items for ₹{:.2}",
                order.hotel_id,
                order.items.len(),
                order.total
            ),
        )
    }

    /// Tell the hotel its groceries are packed.
    pub fn order_ready(order: &Order) -> PushMessage {
        PushMessage::new(
            order.hotel_id.clone(),
            "Order ready",
            format!("Your order for ₹{:.2} is packed and awaiting delivery", order.total),
        )
    }
}

#[async_trait]
pub trait Notify: Send + Sync {
    async fn push(&self, message: &PushMessage) -> Result<()>;
}

/// Sink for headless runs: notifications land in the log and nowhere
/// else.
pub struct LogNotifier;

#[async_trait]
impl Notify for LogNotifier {
    async fn push(&self, message: &PushMessage) -> Result<()> {
        info!(to = %message.to, title = %message.title, "push notification (log only)");
        Ok(())
    }
}

/// POSTs messages as JSON to a push relay.
pub struct HttpPushSender {
    server: String,
    path: String,
}

impl HttpPushSender {
    /// `server` is a `host:port` pair, `path` the relay's submit
    /// endpoint.
    pub fn new(server: impl Into<String>, path: impl Into<String>) -> HttpPushSender {
        HttpPushSender {
            server: server.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Notify for HttpPushSender {
    async fn push(&self, message: &PushMessage) -> Result<()> {
        let body = serde_json::to_string(message)
            .map_err(|err| Error::Internal(format!("push serialization: {err}")))?;
        let response = call(&self.server, Request::post(&self.path, body)).await?;
        if (200..300).contains(&response.status) {
            Ok(())
        } else {
            Err(Error::Persistence(format!(
                "push relay returned status {}",
                response.status
            )))
        }
    }
}

/// Send without waiting. Failures are logged and dropped, matching the
/// no-delivery-guarantee contract.
pub fn fire_and_forget(notifier: Arc<dyn Notify>, message: PushMessage) {
    tokio::spawn(async move {
        if let Err(err) = notifier.push(&message).await {
            warn!(%err, to = %message.to, "push notification dropped");
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::http::{HttpServer, Response};

    #[test]
    fn test_wire_shape() {
        let message = PushMessage::new("KIR001", "Order ready", "On its way");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "to": "KIR001",
                "title": "Order ready",
                "body": "On its way",
                "sound": "default",
            })
        );
    }

    #[tokio::test]
    async fn test_http_sender_delivers() {
        let server = HttpServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let serving = tokio::spawn(async move {
            server
                .serve_once(|request| async move {
                    let message: PushMessage = serde_json::from_str(&request.body).unwrap();
                    assert_eq!(message.to, "admin");
                    Response::ok()
                })
                .await;
        });

        let sender = HttpPushSender::new(addr, "/push/send");
        sender
            .push(&PushMessage::new("admin", "New order", "details"))
            .await
            .unwrap();

        serving.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_sender_reports_relay_refusal() {
        let server = HttpServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            server
                .serve_once(|_| async move { Response::error(500) })
                .await;
        });

        let sender = HttpPushSender::new(addr, "/push/send");
        let err = sender
            .push(&PushMessage::new("admin", "New order", "details"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_fire_and_forget_swallows_failures() {
        struct AlwaysFails;

        #[async_trait]
        impl Notify for AlwaysFails {
            async fn push(&self, _: &PushMessage) -> Result<()> {
                Err(Error::Persistence("relay is down".to_string()))
            }
        }

        // must not panic or propagate
        fire_and_forget(
            Arc::new(AlwaysFails),
            PushMessage::new("admin", "t", "b"),
        );
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
