//! Image pipeline
//!
//! Uploads are staged in object storage and recorded as `pending`. A task is
//! published to Kafka, a worker transforms the staged bytes into the results
//! bucket and publishes a completion, and the completion consumer settles the
//! record and removes the staged bytes.

pub mod config;
pub mod db;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
