//! Order intake and lookup.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;
use tracing::{info, instrument, warn};

use openme_core::{Email, NewOrder, Order, OrderId, OrderLine, UserId, ValidationError};

use crate::db::{Catalog, OrderStore, RepositoryError};

/// Attempts at finding an unused order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Order intake errors.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to persist order: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Generate a customer-facing order number such as
/// `ORD-20250101120000-K3F9QZ`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{suffix}", now.format("%Y%m%d%H%M%S"))
}

/// Order intake and read-only lookups.
pub struct OrderService<'a> {
    store: &'a dyn OrderStore,
    catalog: Option<&'a dyn Catalog>,
}

impl<'a> OrderService<'a> {
    /// `catalog` enables price verification when present.
    #[must_use]
    pub const fn new(store: &'a dyn OrderStore, catalog: Option<&'a dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    /// Validate and persist a new order as `pending`/`pending`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` when the order is rejected and
    /// `OrderError::Persistence` when nothing could be written.
    #[instrument(skip(self, new), fields(items = new.items.len()))]
    pub async fn place_order(&self, new: NewOrder) -> Result<Order, OrderError> {
        let email = new.validate()?;
        if let Some(catalog) = self.catalog {
            verify_prices(catalog, &new.items).await?;
        }

        let now = Utc::now();
        let mut order = Order::place(
            new,
            email,
            OrderId::generate(),
            generate_order_number(now),
            now,
        );

        let mut attempt = 1;
        loop {
            match self.store.insert(&order).await {
                Ok(()) => break,
                Err(RepositoryError::Conflict(reason)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    warn!(order_number = %order.order_number, %reason, "Order number taken, retrying");
                    order.order_number = generate_order_number(now);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }

    /// Order by its customer-facing number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        self.store.get_by_number(order_number).await
    }

    /// Guest order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn history_for_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        self.store.list_by_email(email).await
    }

    /// Account order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn history_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        self.store.list_by_user(user_id).await
    }
}

/// Reject items whose product is gone or whose price differs from the catalog.
async fn verify_prices(catalog: &dyn Catalog, items: &[OrderLine]) -> Result<(), OrderError> {
    for item in items {
        let product = catalog
            .product(&item.product_id)
            .await?
            .filter(|product| product.is_active)
            .ok_or_else(|| ValidationError::ProductUnavailable(item.product_id.clone()))?;

        let variant = match &item.variant_id {
            Some(variant_id) => Some(
                catalog
                    .variant(variant_id)
                    .await?
                    .filter(|variant| variant.product_id == product.id)
                    .ok_or_else(|| ValidationError::ProductUnavailable(item.product_id.clone()))?,
            ),
            None => None,
        };

        let expected = product.price_for(variant.as_ref());
        if expected != item.unit_price {
            return Err(ValidationError::PriceMismatch {
                product_id: item.product_id.clone(),
                expected,
                actual: item.unit_price,
            }
            .into());
        }
    }
    Ok(())
}
