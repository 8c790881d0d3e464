//! Cart preflight handler.
//!
//! The cart itself lives client-side. Before sending the shopper to
//! checkout, the client posts its lines here to be checked against
//! current catalog stock.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use openme_core::{Cart, CartLine};

use crate::db::{Catalog, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::catalog::CatalogSnapshot;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateCartRequest {
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateCartResponse {
    pub ok: bool,
    pub item_count: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal: Decimal,
}

/// `POST /api/cart/validate`
#[instrument(skip(state, request), fields(lines = request.items.len()))]
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateCartRequest>,
) -> Result<Json<ValidateCartResponse>> {
    let cart: Cart = request.items.into_iter().collect();
    let snapshot = load_snapshot(state.catalog(), &cart).await?;

    cart.ensure_checkout_ready(&snapshot)
        .map_err(AppError::CartNotReady)?;

    let subtotal = cart
        .subtotal()
        .ok_or_else(|| AppError::BadRequest("cart subtotal is out of range".to_owned()))?;

    Ok(Json(ValidateCartResponse {
        ok: true,
        item_count: cart.total_quantity(),
        subtotal,
    }))
}

/// Fetch every product and variant the cart references.
async fn load_snapshot(
    catalog: &dyn Catalog,
    cart: &Cart,
) -> std::result::Result<CatalogSnapshot, RepositoryError> {
    let mut snapshot = CatalogSnapshot::default();

    for line in cart.lines() {
        if !snapshot.products.contains_key(&line.product_id)
            && let Some(product) = catalog.product(&line.product_id).await?
        {
            snapshot.products.insert(product.id.clone(), product);
        }
        for variant_id in line.stock_units().into_iter().flatten() {
            if snapshot.variants.contains_key(variant_id) {
                continue;
            }
            if let Some(variant) = catalog.variant(variant_id).await? {
                snapshot.variants.insert(variant.id.clone(), variant);
            }
        }
    }

    Ok(snapshot)
}
