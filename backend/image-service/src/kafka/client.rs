//! Shared Kafka client
//!
//! One `KafkaClient` is built per process and shared by `Arc`. The producer is
//! created lazily on the first `connect()`; every producer and consumer built
//! from this client reports cluster failures to the same supervisor.

use super::supervisor::{set_state, ConnectionState, Reconnect};
use super::BrokerError;
use crate::config::KafkaConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientContext;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Client context that forwards cluster-wide failures as disconnect events
#[derive(Clone)]
pub struct SupervisedContext {
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::Sender<()>,
}

impl ClientContext for SupervisedContext {
    fn error(&self, error: KafkaError, reason: &str) {
        match error {
            KafkaError::Global(
                RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure,
            ) => {
                warn!(error = %error, reason = %reason, "Broker connection lost");
                set_state(&self.state, ConnectionState::Disconnected);
                // A full channel already holds a pending event
                let _ = self.events.try_send(());
            }
            _ => error!(error = %error, reason = %reason, "librdkafka error"),
        }
    }
}

impl ConsumerContext for SupervisedContext {}

pub type SupervisedProducer = FutureProducer<SupervisedContext>;
pub type SupervisedConsumer = StreamConsumer<SupervisedContext>;

/// Process-wide broker client
pub struct KafkaClient {
    config: KafkaConfig,
    context: SupervisedContext,
    producer: Mutex<Option<SupervisedProducer>>,
    events_rx: Mutex<Option<mpsc::Receiver<()>>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl KafkaClient {
    pub fn new(config: KafkaConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::channel(1);

        Self {
            config,
            context: SupervisedContext {
                state: Arc::new(state_tx),
                events: events_tx,
            },
            producer: Mutex::new(None),
            events_rx: Mutex::new(Some(events_rx)),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.context.state.subscribe()
    }

    /// Disconnect event stream for `supervise`; available once
    pub fn take_disconnect_events(&self) -> Option<mpsc::Receiver<()>> {
        self.events_rx.lock().take()
    }

    /// Ensure a live connection; a no-op while connected
    pub async fn connect(&self) -> Result<(), BrokerError> {
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        let _guard = self.connect_lock.lock().await;
        match self.state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Disconnected => {
                set_state(&self.context.state, ConnectionState::Connecting)
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
        }

        self.probe().await
    }

    /// Publish one keyed record and wait for the delivery report
    pub async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let producer = self.producer()?;
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match producer.send(record, self.config.message_timeout()).await {
            Ok((partition, offset)) => {
                debug!(
                    topic = %topic,
                    key = %key,
                    partition = partition,
                    offset = offset,
                    "Message delivered"
                );
                Ok(())
            }
            Err((err, _)) => Err(BrokerError::Delivery {
                topic: topic.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Build a manual-commit consumer subscribed to `topic`
    pub fn consumer(&self, group_id: &str, topic: &str) -> Result<SupervisedConsumer, BrokerError> {
        let consumer: SupervisedConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("client.id", &self.config.client_id)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", self.config.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create_with_context(self.context.clone())?;

        consumer.subscribe(&[topic])?;

        info!(
            brokers = %self.config.brokers,
            topic = %topic,
            group_id = %group_id,
            "Kafka consumer initialized"
        );

        Ok(consumer)
    }

    fn producer(&self) -> Result<SupervisedProducer, BrokerError> {
        let mut slot = self.producer.lock();
        if let Some(producer) = slot.as_ref() {
            return Ok(producer.clone());
        }

        let producer: SupervisedProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("client.id", &self.config.client_id)
            .set("acks", "all")
            // Retries are driven by the caller's RetryConfig
            .set("retries", "0")
            .set("linger.ms", "10")
            .set("message.timeout.ms", self.config.message_timeout_ms.to_string())
            .create_with_context(self.context.clone())?;

        info!(brokers = %self.config.brokers, "Kafka producer initialized");
        *slot = Some(producer.clone());
        Ok(producer)
    }

    /// Fetch cluster metadata to confirm at least one broker answers
    async fn probe(&self) -> Result<(), BrokerError> {
        let producer = self.producer()?;
        let timeout = self.config.message_timeout();

        let result = tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(None, timeout).map(|_| ())
        })
        .await
        .map_err(|e| BrokerError::Probe(e.to_string()))?;

        match result {
            Ok(()) => {
                set_state(&self.context.state, ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                set_state(&self.context.state, ConnectionState::Disconnected);
                Err(BrokerError::Kafka(e))
            }
        }
    }
}

#[async_trait]
impl Reconnect for KafkaClient {
    fn state(&self) -> ConnectionState {
        *self.context.state.borrow()
    }

    async fn reconnect(&self) -> Result<(), BrokerError> {
        let _guard = self.connect_lock.lock().await;
        set_state(&self.context.state, ConnectionState::Reconnecting);
        self.probe().await
    }
}
