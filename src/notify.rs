//! Outbound notifications.
//!
//! Events are handed to a [`Notifier`] from a detached task; delivery
//! failures are logged and never reach the request that raised them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::domain::events::MarketplaceEvent;
use crate::{MarketplaceError, Result};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &MarketplaceEvent) -> Result<()>;
}

/// Publishes JSON events to `<prefix>.<topic>` for the mailer to pick up.
pub struct NatsNotifier {
    client: async_nats::Client,
    prefix: String,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, event: &MarketplaceEvent) -> Result<()> {
        let subject = format!("{}.{}", self.prefix, event.topic());
        let payload = serde_json::to_vec(event).map_err(|e| MarketplaceError::Notification(e.to_string()))?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| MarketplaceError::Notification(e.to_string()))
    }
}

/// Used when no message bus is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &MarketplaceEvent) -> Result<()> {
        info!(topic = event.topic(), order_number = event.order_number(), "notification");
        Ok(())
    }
}

/// Fire-and-forget delivery of `events`, in order.
pub fn dispatch(notifier: Arc<dyn Notifier>, events: Vec<MarketplaceEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for event in events {
            if let Err(e) = notifier.notify(&event).await {
                error!(topic = event.topic(), order_number = event.order_number(), error = %e, "notification failed");
            }
        }
    })
}

#[cfg(test)]
pub(crate) use channel::ChannelNotifier;

#[cfg(test)]
mod channel {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::Notifier;
    use crate::domain::events::MarketplaceEvent;
    use crate::{MarketplaceError, Result};

    /// Forwards events into an in-process channel.
    pub(crate) struct ChannelNotifier {
        tx: mpsc::UnboundedSender<MarketplaceEvent>,
    }

    impl ChannelNotifier {
        pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<MarketplaceEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify(&self, event: &MarketplaceEvent) -> Result<()> {
            self.tx.send(event.clone()).map_err(|e| MarketplaceError::Notification(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderStatus;
    use uuid::Uuid;

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _event: &MarketplaceEvent) -> Result<()> {
            Err(MarketplaceError::Notification("smtp down".into()))
        }
    }

    fn event() -> MarketplaceEvent {
        MarketplaceEvent::OrderStatusChanged {
            order_id: Uuid::now_v7(),
            order_number: "ELE123456".into(),
            buyer_id: Uuid::now_v7(),
            from: OrderStatus::Pending,
            to: OrderStatus::Processing,
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        let first = event();
        let second = event();
        dispatch(Arc::new(notifier), vec![first.clone(), second.clone()]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let handle = dispatch(Arc::new(Failing), vec![event()]);
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["type"], "order_status_changed");
        assert_eq!(json["to"], "processing");
    }
}
