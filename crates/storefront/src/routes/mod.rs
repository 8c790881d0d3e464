//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Liveness
//! GET  /health/ready              - Readiness (order store reachable)
//!
//! # Orders
//! POST /api/orders                - Order intake
//! GET  /api/orders/{order_number} - Order by number (checkout success page)
//! GET  /api/orders?email=         - Guest order history
//! GET  /api/orders?user_id=       - Account order history
//!
//! # Catalog
//! GET  /api/products              - Active products (category, featured, search,
//!                                   min_price, max_price, limit, offset)
//! GET  /api/products/featured     - Featured strip
//! GET  /api/products/{slug}       - Product with category, images, variants
//! GET  /api/categories            - Active categories
//! GET  /api/categories/{slug}     - One category
//!
//! # Cart
//! POST /api/cart/validate         - Pre-checkout stock and availability check
//!
//! # Payments
//! POST /api/checkout              - Create a hosted checkout session
//! POST /api/webhook               - Stripe webhook
//! ```

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the `/api` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create).get(orders::history))
        .route("/orders/{order_number}", get(orders::show))
        .route("/products", get(products::index))
        .route("/products/featured", get(products::featured))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(products::categories))
        .route("/categories/{slug}", get(products::category))
        .route("/cart/validate", post(cart::validate))
        .route("/checkout", post(checkout::create_session))
        .route("/webhook", post(webhook::receive))
}

/// Create all application routes.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/api", api_routes())
}
