//! # Database Operations
//!
//! PostgreSQL implementations of the notifier's external contracts over the
//! item schema in `migrations/`.
//!
//! ## Key Components
//!
//! - [`connect`] - Pool construction from [`DatabaseConfig`]
//! - [`PgItemSource`] - The grouped availability query, pinned per run
//! - [`PgEntityStore`] - Field-level load/save of item custom fields
//! - [`PgNotificationOutbox`] - Alert hand-off to the mail delivery pipeline
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use assembly_notifier::config::DatabaseConfig;
//! use assembly_notifier::database::{connect, PgItemSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect(&DatabaseConfig::default()).await?;
//! let source = PgItemSource::new(pool);
//! # Ok(())
//! # }
//! ```

pub mod entity_store;
pub mod item_source;
pub mod notification_outbox;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{NotifierError, Result};

pub use entity_store::PgEntityStore;
pub use item_source::PgItemSource;
pub use notification_outbox::PgNotificationOutbox;

/// Open a connection pool for the item database
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let url = config.database_url().ok_or_else(|| {
        NotifierError::Configuration(
            "database.url is not set and DATABASE_URL is not defined".to_string(),
        )
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect(&url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        acquire_timeout_seconds = config.acquire_timeout_seconds,
        "Database pool connected"
    );

    Ok(pool)
}

/// Round-trip check used before a run starts
pub async fn health_check(pool: &PgPool) -> Result<bool> {
    let health: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    Ok(health == 1)
}
