//! Shared fakes for pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use image_service::db::InMemoryImageRepository;
use image_service::kafka::{BrokerError, MessageHandler, MessagePublisher};
use image_service::services::{
    CompletionHandler, ImageTransformer, TaskProducer, TaskWorker, TransformConfig,
};
use parking_lot::Mutex;
use resilience::RetryConfig;
use s3_utils::MemoryObjectStore;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TASK_TOPIC: &str = "image.tasks";
pub const COMPLETION_TOPIC: &str = "image.completed";

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap()
    }
}

/// In-memory broker that records published messages
#[derive(Default)]
pub struct MemoryBroker {
    messages: Mutex<Vec<PublishedMessage>>,
    down: AtomicBool,
    fail_next: AtomicU32,
    connect_calls: AtomicU32,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Fail the next `n` publishes with a delivery error
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Remove and return everything published to `topic`
    pub fn drain(&self, topic: &str) -> Vec<PublishedMessage> {
        let mut messages = self.messages.lock();
        let (taken, kept): (Vec<_>, Vec<_>) = messages.drain(..).partition(|m| m.topic == topic);
        *messages = kept;
        taken
    }
}

#[async_trait]
impl MessagePublisher for MemoryBroker {
    async fn ensure_connected(&self) -> Result<(), BrokerError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }

        let pending_failures = self.fail_next.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.fail_next.store(pending_failures - 1, Ordering::SeqCst);
            return Err(BrokerError::Delivery {
                topic: topic.to_string(),
                message: "Local: Message timed out".to_string(),
            });
        }

        self.messages.lock().push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Millisecond-scale backoff so retry tests stay fast
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        jitter: false,
    }
}

pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    Bytes::from(buf.into_inner())
}

/// All pipeline stages wired to in-memory collaborators
pub struct Pipeline {
    pub broker: Arc<MemoryBroker>,
    pub store: Arc<MemoryObjectStore>,
    pub repo: Arc<InMemoryImageRepository>,
    pub producer: Arc<TaskProducer>,
    pub worker: TaskWorker,
    pub completions: CompletionHandler,
}

impl Pipeline {
    pub fn new() -> Self {
        let broker = MemoryBroker::new();
        let store = Arc::new(MemoryObjectStore::new());
        let repo = Arc::new(InMemoryImageRepository::new());

        let producer = Arc::new(TaskProducer::new(broker.clone(), TASK_TOPIC, fast_retry(5)));
        let worker = TaskWorker::new(
            store.clone(),
            Arc::new(ImageTransformer::new(TransformConfig::default())),
            broker.clone(),
            COMPLETION_TOPIC,
            fast_retry(3),
        );
        let completions = CompletionHandler::new(repo.clone(), store.clone());

        Self {
            broker,
            store,
            repo,
            producer,
            worker,
            completions,
        }
    }

    /// Feed queued task messages to the worker; returns how many were handled
    pub async fn run_worker(&self) -> usize {
        let tasks = self.broker.drain(TASK_TOPIC);
        for task in &tasks {
            self.worker
                .handle(Some(&task.key), &task.payload)
                .await
                .unwrap();
        }
        tasks.len()
    }

    /// Feed queued completion messages to the completion handler
    pub async fn run_completions(&self) -> usize {
        let completions = self.broker.drain(COMPLETION_TOPIC);
        for completion in &completions {
            self.completions
                .handle(Some(&completion.key), &completion.payload)
                .await
                .unwrap();
        }
        completions.len()
    }
}
