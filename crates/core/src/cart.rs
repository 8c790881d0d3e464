//! Shopping cart and wishlist.
//!
//! Carts live on the client. The server only sees them when the client
//! asks for a pre-checkout validation, and when it turns one into
//! [`OrderLine`]s for intake.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderLine;
use crate::types::{ProductId, VariantId};

/// Problems that block a cart from proceeding to checkout.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartError {
    #[error("cart is empty")]
    Empty,

    #[error("{key} is no longer available")]
    Unavailable { key: CartLineKey },

    #[error("{key}: choose both a top and a bottom")]
    IncompleteSet { key: CartLineKey },

    #[error("{key}: only {available} left, {requested} requested")]
    InsufficientStock {
        key: CartLineKey,
        requested: u32,
        available: u32,
    },
}

/// Stock source consulted before checkout.
pub trait StockLookup {
    /// Units on hand for a product or variant, `None` when it is not sold.
    fn available(&self, product_id: &ProductId, variant_id: Option<&VariantId>) -> Option<u32>;
}

/// Identity of a cart line.
///
/// Two lines with the same product and the same variant selections are the
/// same line; adding one increases the quantity of the other. The parts are
/// kept separate so ids containing any character still compare correctly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CartLineKey {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_variant_id: Option<VariantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_variant_id: Option<VariantId>,
}

impl CartLineKey {
    #[must_use]
    pub fn new(
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        top_variant_id: Option<&VariantId>,
        bottom_variant_id: Option<&VariantId>,
    ) -> Self {
        Self {
            product_id: product_id.clone(),
            variant_id: variant_id.cloned(),
            top_variant_id: top_variant_id.cloned(),
            bottom_variant_id: bottom_variant_id.cloned(),
        }
    }
}

impl fmt::Display for CartLineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product_id.as_str())?;
        if let Some(variant) = &self.variant_id {
            write!(f, " ({variant})")?;
        }
        if self.top_variant_id.is_some() || self.bottom_variant_id.is_some() {
            fn piece(id: Option<&VariantId>) -> &str {
                id.map_or("?", VariantId::as_str)
            }
            write!(
                f,
                " (top {}, bottom {})",
                piece(self.top_variant_id.as_ref()),
                piece(self.bottom_variant_id.as_ref())
            )?;
        }
        Ok(())
    }
}

/// One line in the cart, carrying the product snapshot the client showed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    /// Separate top piece selection for two-piece sets.
    #[serde(default)]
    pub top_variant_id: Option<VariantId>,
    #[serde(default)]
    pub bottom_variant_id: Option<VariantId>,
    pub product_name: String,
    #[serde(default)]
    pub product_sku: Option<String>,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn key(&self) -> CartLineKey {
        CartLineKey::new(
            &self.product_id,
            self.variant_id.as_ref(),
            self.top_variant_id.as_ref(),
            self.bottom_variant_id.as_ref(),
        )
    }

    /// `unit_price * quantity`, or `None` when it does not fit a `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Whether this line is a two-piece set with separate top and bottom picks.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.top_variant_id.is_some() || self.bottom_variant_id.is_some()
    }

    /// A set line with only one of its pieces chosen.
    #[must_use]
    pub const fn is_incomplete_set(&self) -> bool {
        self.top_variant_id.is_some() != self.bottom_variant_id.is_some()
    }

    /// Stock units this line draws from: both pieces of a set, otherwise the
    /// selected variant (or the bare product when none is selected).
    #[must_use]
    pub fn stock_units(&self) -> Vec<Option<&VariantId>> {
        if self.is_set() {
            [self.top_variant_id.as_ref(), self.bottom_variant_id.as_ref()]
                .into_iter()
                .flatten()
                .map(Some)
                .collect()
        } else {
            vec![self.variant_id.as_ref()]
        }
    }

    /// Snapshot this line for order intake.
    #[must_use]
    pub fn to_order_line(&self) -> OrderLine {
        OrderLine {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            product_name: self.product_name.clone(),
            product_sku: self.product_sku.clone(),
            product_image: self.product_image.clone(),
            variant_name: self.variant_name.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

/// An ordered collection of cart lines, unique by [`CartLineKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a line, merging quantities with an existing line of the same key.
    /// Zero-quantity lines are ignored.
    pub fn add(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        let key = line.key();
        match self.lines.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => self.lines.push(line),
        }
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, key: &CartLineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.key() != key);
        self.lines.len() != before
    }

    /// Set a line's quantity. Values below one are ignored; use
    /// [`Cart::remove`] to drop a line.
    pub fn update_quantity(&mut self, key: &CartLineKey, quantity: u32) -> bool {
        if quantity < 1 {
            return false;
        }
        match self.lines.iter_mut().find(|line| &line.key() == key) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |count, line| count.saturating_add(line.quantity))
    }

    /// Sum of line totals, `None` on overflow.
    #[must_use]
    pub fn subtotal(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.line_total()?))
    }

    /// Check every line against current stock.
    ///
    /// All problems are collected so the client can show them together.
    ///
    /// # Errors
    ///
    /// Returns the list of [`CartError`]s when any line cannot be bought.
    pub fn ensure_checkout_ready(&self, stock: &impl StockLookup) -> Result<(), Vec<CartError>> {
        if self.lines.is_empty() {
            return Err(vec![CartError::Empty]);
        }

        let problems: Vec<CartError> = self
            .lines
            .iter()
            .flat_map(|line| {
                if line.is_incomplete_set() {
                    return vec![CartError::IncompleteSet { key: line.key() }];
                }
                line.stock_units()
                    .into_iter()
                    .filter_map(|variant_id| {
                        match stock.available(&line.product_id, variant_id) {
                            None => Some(CartError::Unavailable { key: line.key() }),
                            Some(available) if available < line.quantity => {
                                Some(CartError::InsufficientStock {
                                    key: line.key(),
                                    requested: line.quantity,
                                    available,
                                })
                            }
                            Some(_) => None,
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Snapshot all lines for order intake.
    #[must_use]
    pub fn to_order_lines(&self) -> Vec<OrderLine> {
        self.lines.iter().map(CartLine::to_order_line).collect()
    }
}

impl FromIterator<CartLine> for Cart {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        let mut cart = Self::new();
        for line in iter {
            cart.add(line);
        }
        cart
    }
}

/// Saved products, unique by product id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist(BTreeSet<ProductId>);

impl Wishlist {
    /// Add the product if absent, remove it if present. Returns whether it is
    /// now on the list.
    pub fn toggle(&mut self, product_id: ProductId) -> bool {
        if self.0.remove(&product_id) {
            false
        } else {
            self.0.insert(product_id);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.0.contains(product_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductId> {
        self.0.iter()
    }
}

/// The part of client state that survives a reload.
///
/// Checkout form fields and UI flags are deliberately not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCart {
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub wishlist: Wishlist,
}
