//! Kafka integration
//!
//! - `client`: shared producer handle with lazy connect and a supervised context
//! - `supervisor`: connection state tracking and one-shot reconnects
//! - `publisher`: `MessagePublisher` seam used by the task producer and worker,
//!   implemented by `KafkaClient`
//! - `consumer`: manual-commit consumer loop driving a `MessageHandler`, with
//!   the commit/rewind decision behind `OffsetControl`

pub mod client;
pub mod consumer;
pub mod publisher;
pub mod supervisor;

pub use client::KafkaClient;
pub use consumer::{
    ConsumerLoop, Delivery, DeliveryPolicy, MessageHandler, MessagePosition, OffsetControl,
};
pub use publisher::MessagePublisher;
pub use supervisor::{supervise, ConnectionState, Reconnect};

use rdkafka::error::KafkaError;

/// Broker-side failures
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// No usable connection to the cluster
    #[error("broker not connected")]
    NotConnected,

    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// Delivery was not acknowledged before the message timeout
    #[error("delivery to {topic} failed: {message}")]
    Delivery { topic: String, message: String },

    /// The blocking metadata probe could not be joined
    #[error("connection probe failed: {0}")]
    Probe(String),
}
