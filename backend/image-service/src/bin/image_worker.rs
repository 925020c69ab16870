//! Image Worker - Kafka consumer for image transformation
//!
//! Joins the worker consumer group on the task topic. For every task it
//! fetches the staged bytes, writes the transformed image to the results
//! bucket and publishes a completion message.
//!
//! Environment variables:
//! - KAFKA_BROKERS: Kafka broker addresses (alias KAFKA_BROKER)
//! - KAFKA_IMAGE_TASK_TOPIC: Topic to consume (default: "image.tasks")
//! - KAFKA_IMAGE_COMPLETED_TOPIC: Topic for completions (default: "image.completed")
//! - KAFKA_WORKER_GROUP_ID: Consumer group ID (default: "image-processor-group")
//! - S3_STAGING_BUCKET / S3_RESULTS_BUCKET: Object store buckets
//! - S3_ENDPOINT: Optional MinIO/S3-compatible endpoint
//! - THUMB_WIDTH / THUMB_HEIGHT / THUMB_QUALITY: Transform parameters

use anyhow::Context;
use image_service::kafka::{supervise, ConsumerLoop, KafkaClient, MessagePublisher};
use image_service::services::{ImageTransformer, TaskWorker};
use image_service::{logging, metrics, Config};
use s3_utils::{ObjectStore, S3Client};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    info!("Starting Image Worker");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        kafka_brokers = %config.kafka.brokers,
        task_topic = %config.kafka.task_topic,
        completion_topic = %config.kafka.completion_topic,
        group_id = %config.kafka.worker_group_id,
        "Configuration loaded"
    );

    let s3 = S3Client::with_config(config.s3.clone()).await;
    if let Err(e) = s3.health_check().await {
        warn!(error = %e, "Object store health check failed, continuing");
    }
    let store: Arc<dyn ObjectStore> = Arc::new(s3);

    let kafka = Arc::new(KafkaClient::new(config.kafka.clone()));
    if let Err(e) = kafka.connect().await {
        warn!(error = %e, "Initial broker connection failed, will retry on publish");
    }

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        let _ = signal_tx.send(true);
    });

    let supervisor = kafka
        .take_disconnect_events()
        .map(|events| tokio::spawn(supervise(kafka.clone(), events, shutdown_rx.clone())));

    let publisher: Arc<dyn MessagePublisher> = kafka.clone();
    let worker = Arc::new(TaskWorker::new(
        store,
        Arc::new(ImageTransformer::new(config.transform.clone())),
        publisher,
        config.kafka.completion_topic.clone(),
        resilience::completion_publish_config(),
    ));

    let consumer = kafka
        .consumer(&config.kafka.worker_group_id, &config.kafka.task_topic)
        .context("Failed to create task consumer")?;

    let mut consumer_loop = ConsumerLoop::new(
        consumer,
        worker,
        resilience::completion_publish_config(),
        shutdown_rx,
    );

    if let Err(e) = consumer_loop.run().await {
        error!(error = %e, "Consumer error");
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = supervisor {
        match handle.await {
            Ok(attempts) => info!(reconnect_attempts = attempts, "Connection supervisor stopped"),
            Err(e) => warn!(error = %e, "Connection supervisor task failed"),
        }
    }

    debug!(metrics = %metrics::gather_text(), "Final metrics");
    info!("Image Worker stopped");
    Ok(())
}
