/// Prometheus metrics for the image pipeline
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

pub static TASKS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "image_tasks_published_total",
        "Total number of task messages published"
    )
    .expect("Failed to register tasks published metric")
});

pub static TASK_PUBLISH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "image_task_publish_failures_total",
        "Task submissions that exhausted their retry budget"
    )
    .expect("Failed to register task publish failures metric")
});

pub static TASKS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "image_tasks_processed_total",
        "Task messages handled by the worker",
        &["outcome"]
    )
    .expect("Failed to register tasks processed metric")
});

pub static PROCESSING_TIME_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "image_processing_time_ms",
        "Milliseconds from task enqueue to completion publish",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .expect("Failed to register processing time metric")
});

pub static COMPLETIONS_APPLIED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "image_completions_applied_total",
        "Completion messages applied to the record store",
        &["status", "result"]
    )
    .expect("Failed to register completions applied metric")
});

pub static CLEANUP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "image_cleanup_failures_total",
        "Object deletes that failed and were ignored",
        &["bucket"]
    )
    .expect("Failed to register cleanup failures metric")
});

pub static STALE_PENDING_RECORDS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "image_stale_pending_records",
        "Pending records older than the audit threshold"
    )
    .expect("Failed to register stale pending records metric")
});

/// 0 disconnected, 1 connecting, 2 connected, 3 reconnecting
pub static BROKER_CONNECTION_STATE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "image_broker_connection_state",
        "Current broker connection state"
    )
    .expect("Failed to register broker connection state metric")
});

/// Render the default registry in text exposition format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
