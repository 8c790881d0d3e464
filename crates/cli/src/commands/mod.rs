//! CLI subcommands.

pub mod migrate;
pub mod orders;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by commands that talk to the storefront database.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] openme_storefront::db::RepositoryError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {order_number} cannot move from {from} to {to}")]
    InvalidTransition {
        order_number: String,
        from: openme_core::OrderStatus,
        to: openme_core::OrderStatus,
    },

    #[error("Order {0} changed while updating, retry")]
    Concurrent(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the storefront database using `STOREFRONT_DATABASE_URL`,
/// falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    Ok(openme_storefront::db::create_pool(&database_url).await?)
}
