//! Read-only catalog records: storefront listings plus the price and
//! stock checks used by order intake and cart preflight.

use std::collections::HashMap;

use openme_core::{ProductId, StockLookup, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product as stored by the catalog admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
}

impl CatalogProduct {
    /// Sale price when it undercuts the list price, otherwise the list price.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    /// Price for the product or, when the variant carries its own price,
    /// for that variant.
    #[must_use]
    pub fn price_for(&self, variant: Option<&CatalogVariant>) -> Decimal {
        variant
            .and_then(|variant| variant.price)
            .unwrap_or_else(|| self.effective_price())
    }
}

/// A purchasable variant (size, colour, or one piece of a set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub title: String,
    pub price: Option<Decimal>,
    pub inventory_quantity: i32,
    pub sort_order: i32,
}

/// A product photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub product_id: ProductId,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
}

/// A storefront category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// A product as shown on listing and detail pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: CatalogProduct,
    pub category: Option<Category>,
    pub images: Vec<ProductImage>,
    pub variants: Vec<CatalogVariant>,
}

/// Listing filters. Only active products are ever listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Category slug. An unknown slug matches nothing.
    pub category: Option<String>,
    pub featured: Option<bool>,
    /// Case-insensitive substring of the name or description.
    pub search: Option<String>,
    /// Bounds on the effective price, inclusive.
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub limit: u32,
    pub offset: u32,
}

impl ProductFilter {
    /// Whether `product`, filed under `category`, passes every filter
    /// except paging.
    #[must_use]
    pub fn matches(&self, product: &CatalogProduct, category: Option<&Category>) -> bool {
        if !product.is_active {
            return false;
        }
        if let Some(slug) = &self.category
            && category.is_none_or(|category| &category.slug != slug)
        {
            return false;
        }
        if self.featured.is_some_and(|featured| featured != product.is_featured) {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&term);
            let in_description = product
                .description
                .as_ref()
                .is_some_and(|description| description.to_lowercase().contains(&term));
            if !in_name && !in_description {
                return false;
            }
        }
        let price = product.effective_price();
        self.min_price.is_none_or(|min| price >= min) && self.max_price.is_none_or(|max| price <= max)
    }
}

/// Products and variants fetched for one cart, answering stock questions
/// without further I/O.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub products: HashMap<ProductId, CatalogProduct>,
    pub variants: HashMap<VariantId, CatalogVariant>,
}

impl StockLookup for CatalogSnapshot {
    fn available(&self, product_id: &ProductId, variant_id: Option<&VariantId>) -> Option<u32> {
        let product = self.products.get(product_id).filter(|p| p.is_active)?;
        let quantity = match variant_id {
            Some(id) => {
                self.variants
                    .get(id)
                    .filter(|variant| &variant.product_id == product_id)?
                    .inventory_quantity
            }
            None => product.stock_quantity,
        };
        Some(u32::try_from(quantity).unwrap_or(0))
    }
}
