//! Manual-commit consumer loop
//!
//! Offsets are committed only after the handler returns `Ok`. A transient
//! `Err` waits out a doubling backoff and rewinds the partition to the failed
//! message so it is delivered again. A permanent `Err` is logged and committed
//! so one bad message cannot stall its partition.

use super::client::SupervisedConsumer;
use super::BrokerError;
use crate::error::Result;
use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use resilience::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-message work driven by `ConsumerLoop`
///
/// Returning a transient `Err` requests redelivery of the same message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, key: Option<&str>, payload: &[u8]) -> Result<()>;
}

/// Location of a consumed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl MessagePosition {
    pub fn of<M: Message>(msg: &M) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
        }
    }
}

/// Offset operations the consumer loop performs after each message
pub trait OffsetControl: Send + Sync {
    /// Mark everything up to and including `position` as consumed
    fn commit_position(&self, position: &MessagePosition) -> std::result::Result<(), BrokerError>;

    /// Move the partition back so `position` is fetched again
    fn rewind_to(&self, position: &MessagePosition) -> std::result::Result<(), BrokerError>;
}

impl OffsetControl for SupervisedConsumer {
    fn commit_position(&self, position: &MessagePosition) -> std::result::Result<(), BrokerError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset + 1),
        )?;
        Consumer::commit(self, &offsets, CommitMode::Async)?;
        Ok(())
    }

    fn rewind_to(&self, position: &MessagePosition) -> std::result::Result<(), BrokerError> {
        self.seek(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset),
            SEEK_TIMEOUT,
        )?;
        Ok(())
    }
}

/// What the loop did with one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Committed,
    /// Permanent failure; committed and not retried
    Skipped,
    /// Transient failure; rewound after `delay`
    Redelivered { delay: Duration },
}

/// Commit or rewind decision for each handled message
pub struct DeliveryPolicy {
    handler: Arc<dyn MessageHandler>,
    backoff: RetryConfig,
    consecutive_failures: u32,
}

impl DeliveryPolicy {
    pub fn new(handler: Arc<dyn MessageHandler>, backoff: RetryConfig) -> Self {
        Self {
            handler,
            backoff,
            consecutive_failures: 0,
        }
    }

    /// Run the handler and settle the message's offset
    pub async fn deliver(
        &mut self,
        offsets: &dyn OffsetControl,
        position: &MessagePosition,
        key: Option<&str>,
        payload: &[u8],
    ) -> Delivery {
        match self.handler.handle(key, payload).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                commit(offsets, position);
                Delivery::Committed
            }
            Err(e) if !e.is_transient() => {
                self.consecutive_failures = 0;
                error!(
                    topic = %position.topic,
                    partition = position.partition,
                    offset = position.offset,
                    error = %e,
                    "Message handling failed permanently, skipping"
                );
                commit(offsets, position);
                Delivery::Skipped
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let delay = self.backoff.delay_for_attempt(self.consecutive_failures);
                error!(
                    topic = %position.topic,
                    partition = position.partition,
                    offset = position.offset,
                    attempt = self.consecutive_failures,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Message handling failed, will redeliver"
                );
                tokio::time::sleep(delay).await;

                match offsets.rewind_to(position) {
                    Ok(()) => debug!(offset = position.offset, "Rewound partition for redelivery"),
                    Err(e) => warn!(error = %e, "Failed to seek back to failed message"),
                }
                Delivery::Redelivered { delay }
            }
        }
    }
}

fn commit(offsets: &dyn OffsetControl, position: &MessagePosition) {
    if let Err(e) = offsets.commit_position(position) {
        warn!(offset = position.offset, error = %e, "Failed to commit offset");
    }
}

pub struct ConsumerLoop {
    consumer: SupervisedConsumer,
    policy: DeliveryPolicy,
    retry_delay: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConsumerLoop {
    pub fn new(
        consumer: SupervisedConsumer,
        handler: Arc<dyn MessageHandler>,
        redelivery_backoff: RetryConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            consumer,
            retry_delay: redelivery_backoff.base_delay,
            policy: DeliveryPolicy::new(handler, redelivery_backoff),
            shutdown_rx,
        }
    }

    /// Consume until shutdown; one message in flight at a time
    pub async fn run(&mut self) -> Result<()> {
        use futures::StreamExt;

        info!("Starting consumer loop");

        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            let key = msg.key().and_then(|k| std::str::from_utf8(k).ok());
                            let payload = msg.payload().unwrap_or_default();
                            let position = MessagePosition::of(&msg);

                            self.policy
                                .deliver(&self.consumer, &position, key, payload)
                                .await;
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka consumer error");
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        None => {
                            warn!("Message stream ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!("Consumer loop stopped");
        Ok(())
    }
}
