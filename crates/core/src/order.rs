//! Orders, line-item snapshots and intake validation.
//!
//! An [`Order`] is written once by order intake and afterwards only changes
//! through the payment transitions below or operator fulfillment updates.
//! Line items are snapshots: later catalog edits never reach them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    Email, EmailError, OrderId, OrderStatus, PaymentStatus, ProductId, ShippingAddress, UserId,
    VariantId,
};

/// Payment method recorded when the client does not send one.
pub const DEFAULT_PAYMENT_METHOD: &str = "card";

fn default_payment_method() -> String {
    DEFAULT_PAYMENT_METHOD.to_owned()
}

/// Reasons order intake refuses an order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("order must contain at least one item")]
    EmptyItems,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("missing required shipping fields: {}", .0.join(", "))]
    MissingShippingFields(Vec<&'static str>),

    #[error("item {index} has a quantity of zero")]
    ZeroQuantity { index: usize },

    #[error("item {index} has a negative unit price")]
    NegativeUnitPrice { index: usize },

    #[error("{field} cannot be negative")]
    NegativeAmount { field: &'static str },

    #[error("subtotal {actual} does not match item total {expected}")]
    SubtotalMismatch { expected: Decimal, actual: Decimal },

    #[error("total {actual} does not equal subtotal + shipping + tax ({expected})")]
    TotalMismatch { expected: Decimal, actual: Decimal },

    #[error("order amounts are out of range")]
    AmountOutOfRange,

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("price for {product_id} changed: expected {expected}, got {actual}")]
    PriceMismatch {
        product_id: ProductId,
        expected: Decimal,
        actual: Decimal,
    },
}

/// Immutable snapshot of one purchased product or variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderLine {
    /// `unit_price * quantity`, or `None` when it does not fit a `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Order intake input: a validated cart plus the shipping form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub email: String,
    pub items: Vec<OrderLine>,
    pub shipping: ShippingAddress,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

impl NewOrder {
    /// Check everything that can be checked without the catalog.
    ///
    /// Returns the parsed email so callers do not parse it twice.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in this order: items,
    /// email, shipping address, per-item values, amounts.
    pub fn validate(&self) -> Result<Email, ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }

        let email = Email::parse(&self.email)?;

        let missing = self.shipping.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingShippingFields(missing));
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(ValidationError::ZeroQuantity { index });
            }
            if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
                return Err(ValidationError::NegativeUnitPrice { index });
            }
        }

        for (field, amount) in [
            ("subtotal", self.subtotal),
            ("shipping_cost", self.shipping_cost),
            ("tax", self.tax),
        ] {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(ValidationError::NegativeAmount { field });
            }
        }

        let items_total = self
            .items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
            .ok_or(ValidationError::AmountOutOfRange)?;
        if items_total != self.subtotal {
            return Err(ValidationError::SubtotalMismatch {
                expected: items_total,
                actual: self.subtotal,
            });
        }

        let expected = self
            .subtotal
            .checked_add(self.shipping_cost)
            .and_then(|sum| sum.checked_add(self.tax))
            .ok_or(ValidationError::AmountOutOfRange)?;
        if expected != self.total {
            return Err(ValidationError::TotalMismatch {
                expected,
                actual: self.total,
            });
        }

        Ok(email)
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub email: Email,
    pub shipping: ShippingAddress,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the initial `pending`/`pending` record for a validated order.
    #[must_use]
    pub fn place(
        new: NewOrder,
        email: Email,
        id: OrderId,
        order_number: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number,
            user_id: new.user_id,
            email,
            shipping: new.shipping.with_default_country(),
            items: new.items,
            subtotal: new.subtotal,
            shipping_cost: new.shipping_cost,
            tax: new.tax,
            total: new.total,
            payment_method: new.payment_method,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a completed checkout session.
    ///
    /// Returns `false` when the order was already paid, in which case nothing
    /// changes. A previously expired session does not block a later one.
    /// Only a `pending` order advances to `paid`; an order an operator has
    /// already moved on (for example cancelled) keeps its status and only
    /// records the money.
    pub fn record_payment(&mut self, payment_intent_id: Option<&str>, now: DateTime<Utc>) -> bool {
        if self.payment_status == PaymentStatus::Paid {
            return false;
        }
        self.payment_status = PaymentStatus::Paid;
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Paid;
        }
        if let Some(intent) = payment_intent_id {
            self.payment_intent_id = Some(intent.to_owned());
        }
        self.updated_at = now;
        true
    }

    /// Apply an expired checkout session.
    ///
    /// Only a pending payment becomes `failed`; `status` is never touched.
    pub fn record_payment_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.payment_status != PaymentStatus::Pending {
            return false;
        }
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = now;
        true
    }

    /// Sum of item quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count, item| count.saturating_add(item.quantity))
    }
}
