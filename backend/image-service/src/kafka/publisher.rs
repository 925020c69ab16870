//! Publisher seam between the pipeline services and the broker
use super::client::KafkaClient;
use super::BrokerError;
use async_trait::async_trait;

/// Keyed message publishing with an explicit connection step
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Connect if needed; a no-op on a live connection
    async fn ensure_connected(&self) -> Result<(), BrokerError>;

    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

#[async_trait]
impl MessagePublisher for KafkaClient {
    async fn ensure_connected(&self) -> Result<(), BrokerError> {
        self.connect().await
    }

    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.send(topic, key, payload).await
    }
}
