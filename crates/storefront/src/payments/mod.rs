//! Hosted payment provider integration.
//!
//! - [`PaymentGateway`] creates hosted checkout sessions. [`StripeClient`]
//!   is the production implementation.
//! - [`webhook`] authenticates and parses provider notifications.

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use openme_core::{CurrencyCode, OrderId, ProductId, VariantId};

pub use stripe::StripeClient;

/// Countries the hosted checkout accepts a shipping address for.
pub const ALLOWED_SHIPPING_COUNTRIES: &[&str] = &["US", "CA", "GB", "AU", "DE", "FR", "CN", "JP"];

/// Errors talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The provider answered with an error. `message` is the provider's own.
    #[error("payment provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The request never got an answer.
    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered 2xx with a body we could not use.
    #[error("unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

/// One line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    pub image: Option<String>,
    /// Price per unit in minor currency units.
    pub unit_amount: i64,
    pub quantity: u32,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

/// Everything needed to open a hosted checkout session for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_email: String,
    pub currency: CurrencyCode,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub allowed_countries: Vec<String>,
}

/// A created session: its provider id and the page to send the shopper to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Creates hosted checkout sessions.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}
