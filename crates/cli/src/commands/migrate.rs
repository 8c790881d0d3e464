//! Database migration commands.
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in
//! the storefront crate at build time.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use super::CommandError;

/// Run storefront database migrations.
pub async fn storefront() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    openme_storefront::db::run_migrations(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
