/// Record store access layer
///
/// This module provides:
/// - Database connection pooling
/// - The `ImageRepository` contract with PostgreSQL and in-memory implementations

pub mod image_repo;
pub mod memory;

pub use image_repo::{ImageRepository, PgImageRepository};
pub use memory::InMemoryImageRepository;

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Open the connection pool for the record store
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}
