//! Storefront catalog browsing.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::db::{Catalog, RepositoryError};
use crate::models::catalog::{Category, ProductFilter, ProductListing};

/// Page size when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Products shown in the featured strip.
pub const FEATURED_LIMIT: u32 = 8;

/// Listing query as the client sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Blank strings are treated as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl ProductQuery {
    /// Normalize into a [`ProductFilter`]: trimmed text, page size clamped to
    /// `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn into_filter(self) -> ProductFilter {
        ProductFilter {
            category: non_blank(self.category),
            featured: self.featured,
            search: non_blank(self.search),
            min_price: self.min_price,
            max_price: self.max_price,
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// Read-only product and category lookups.
pub struct CatalogService<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    #[instrument(skip(self))]
    pub async fn products(&self, query: ProductQuery) -> Result<Vec<ProductListing>, RepositoryError> {
        self.catalog.products(&query.into_filter()).await
    }

    /// Featured products for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn featured(&self) -> Result<Vec<ProductListing>, RepositoryError> {
        let filter = ProductFilter {
            featured: Some(true),
            limit: FEATURED_LIMIT,
            ..ProductFilter::default()
        };
        self.catalog.products(&filter).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn product(&self, slug: &str) -> Result<Option<ProductListing>, RepositoryError> {
        self.catalog.product_by_slug(slug).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        self.catalog.categories().await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn category(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        self.catalog.category_by_slug(slug).await
    }
}
