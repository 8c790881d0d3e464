//! Database operations for the storefront.
//!
//! # Tables
//!
//! - `orders` - Order header, shipping address (JSONB) and payment state
//! - `order_items` - Line-item snapshots, ordered by `position`
//! - `categories`, `products`, `product_variants`, `product_images` - Catalog,
//!   read-only from here
//!
//! Handlers talk to the [`OrderStore`] and [`Catalog`] traits. Production
//! wires the `PostgreSQL` implementations; tests and local demos use the
//! in-memory ones from [`memory`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p openme-cli -- migrate
//! ```

pub mod catalog;
pub mod memory;
pub mod orders;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use openme_core::{Email, Order, OrderId, OrderStatus, ProductId, UserId, VariantId};

use crate::models::catalog::{
    CatalogProduct, CatalogVariant, Category, ProductFilter, ProductListing,
};

pub use catalog::PgCatalog;
pub use memory::{InMemoryCatalog, InMemoryOrderStore};
pub use orders::PgOrderStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Result of a conditional state change on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The change was written; carries the updated order.
    Applied(Box<Order>),
    /// The order exists but was not in a state the change applies to.
    AlreadyApplied,
    /// No order with that id.
    NotFound,
}

impl Transition {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Persistence for orders.
///
/// Every state change is a single conditional write so that duplicated or
/// reordered webhook deliveries cannot race each other into a bad state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order and all of its items atomically.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError>;

    /// Orders placed with this email (case-insensitive), newest first.
    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError>;

    /// Orders placed by this account, newest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Record the payment unless it is already recorded. `status` moves to
    /// `paid` only from `pending`.
    async fn mark_paid(
        &self,
        id: OrderId,
        payment_intent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError>;

    /// Mark the payment failed while it is still pending.
    async fn mark_payment_failed(
        &self,
        id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError>;

    /// Move `status` from `from` to `to` if it is still `from`.
    ///
    /// Callers check [`OrderStatus::can_transition_to`] first.
    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Read access to the catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Product by id, active or not. Price and stock checks decide what an
    /// inactive product means.
    async fn product(&self, id: &ProductId) -> Result<Option<CatalogProduct>, RepositoryError>;

    async fn variant(&self, id: &VariantId) -> Result<Option<CatalogVariant>, RepositoryError>;

    /// Active products passing `filter`, ordered by `sort_order` then id.
    async fn products(&self, filter: &ProductFilter) -> Result<Vec<ProductListing>, RepositoryError>;

    /// Active product by slug, with its category, images and variants.
    async fn product_by_slug(&self, slug: &str) -> Result<Option<ProductListing>, RepositoryError>;

    /// Active categories ordered by `sort_order`.
    async fn categories(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations from `crates/storefront/migrations`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is inconsistent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
