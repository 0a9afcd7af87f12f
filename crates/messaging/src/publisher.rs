//! Publishing side of the event channel.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Publishes raw message bodies to an exchange.
///
/// Kept object-safe so services can hold an `Arc<dyn EventPublisher>`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_bytes(&self, exchange: &str, routing_key: &str, body: Vec<u8>) -> Result<()>;
}

/// Typed publishing on top of [`EventPublisher`].
#[async_trait]
pub trait EventPublisherExt: EventPublisher {
    /// Serializes `message` as JSON and publishes it.
    async fn publish<T>(&self, exchange: &str, routing_key: &str, message: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let body = serde_json::to_vec(message)?;
        self.publish_bytes(exchange, routing_key, body).await
    }
}

impl<P: EventPublisher + ?Sized> EventPublisherExt for P {}
