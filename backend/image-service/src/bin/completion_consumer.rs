//! Completion Consumer - settles image records from completion messages
//!
//! Consumes the completion topic, moves each record to its terminal status,
//! removes the staged upload and periodically reports pending records that
//! have waited too long for a completion.
//!
//! Environment variables:
//! - DATABASE_URL: PostgreSQL URL for the images table
//! - KAFKA_BROKERS: Kafka broker addresses (alias KAFKA_BROKER)
//! - KAFKA_IMAGE_COMPLETED_TOPIC: Topic to consume (default: "image.completed")
//! - KAFKA_COMPLETION_GROUP_ID: Consumer group ID (default: "image-completed-group")
//! - S3_STAGING_BUCKET: Bucket holding staged uploads
//! - PENDING_AUDIT_INTERVAL_SECS: Audit interval (default: 300)
//! - PENDING_STALE_AFTER_SECS: Age before a pending record is reported (default: 900)

use anyhow::Context;
use image_service::db::{self, ImageRepository, PgImageRepository};
use image_service::kafka::{supervise, ConsumerLoop, KafkaClient};
use image_service::services::{CompletionHandler, PendingAudit};
use image_service::{logging, metrics, Config};
use s3_utils::{ObjectStore, S3Client};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    info!("Starting Completion Consumer");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        kafka_brokers = %config.kafka.brokers,
        completion_topic = %config.kafka.completion_topic,
        group_id = %config.kafka.completion_group_id,
        "Configuration loaded"
    );

    let pool = db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let repo: Arc<dyn ImageRepository> = Arc::new(PgImageRepository::new(pool));
    info!("Database pool initialized");

    let store: Arc<dyn ObjectStore> = Arc::new(S3Client::with_config(config.s3.clone()).await);
    let kafka = Arc::new(KafkaClient::new(config.kafka.clone()));

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

    let audit = Arc::new(PendingAudit::new(repo.clone(), config.audit.stale_after));
    let audit_handle = tokio::spawn(audit.run(config.audit.interval, shutdown_rx.clone()));

    let handler = Arc::new(CompletionHandler::new(repo, store));
    let consumer = kafka
        .consumer(&config.kafka.completion_group_id, &config.kafka.completion_topic)
        .context("Failed to create completion consumer")?;

    let mut consumer_loop = ConsumerLoop::new(
        consumer,
        handler,
        resilience::completion_publish_config(),
        shutdown_rx,
    );

    if let Err(e) = consumer_loop.run().await {
        error!(error = %e, "Consumer error");
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for pending audit to finish");
    if let Err(e) = audit_handle.await {
        warn!(error = %e, "Pending audit task failed");
    }

    if let Some(handle) = supervisor {
        match handle.await {
            Ok(attempts) => info!(reconnect_attempts = attempts, "Connection supervisor stopped"),
            Err(e) => warn!(error = %e, "Connection supervisor task failed"),
        }
    }

    debug!(metrics = %metrics::gather_text(), "Final metrics");
    info!("Completion Consumer stopped");
    Ok(())
}
