use thiserror::Error;

/// Errors raised by the event channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// An ack or nack named a delivery this consumer does not hold.
    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    #[error("Publish to '{exchange}' with key '{routing_key}' failed: {reason}")]
    PublishFailed {
        exchange: String,
        routing_key: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
