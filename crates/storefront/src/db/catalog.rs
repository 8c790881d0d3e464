//! `PostgreSQL` catalog reader.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use openme_core::{ProductId, VariantId};

use super::{Catalog, RepositoryError};
use crate::models::catalog::{
    CatalogProduct, CatalogVariant, Category, ProductFilter, ProductImage, ProductListing,
};

const PRODUCT_COLUMNS: &str = "p.id, p.slug, p.name, p.description, p.sku, p.category_id, \
     p.price, p.sale_price, p.stock_quantity, p.is_active, p.is_featured, p.sort_order";

const VARIANT_COLUMNS: &str = "id, product_id, title, price, inventory_quantity, sort_order";

const CATEGORY_COLUMNS: &str = "id, slug, name, description, image_url, sort_order, is_active";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    slug: String,
    name: String,
    description: Option<String>,
    sku: Option<String>,
    category_id: Option<String>,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock_quantity: i32,
    is_active: bool,
    is_featured: bool,
    sort_order: i32,
}

impl From<ProductRow> for CatalogProduct {
    fn from(r: ProductRow) -> Self {
        Self {
            id: ProductId::new(r.id),
            slug: r.slug,
            name: r.name,
            description: r.description,
            sku: r.sku,
            category_id: r.category_id,
            price: r.price,
            sale_price: r.sale_price,
            stock_quantity: r.stock_quantity,
            is_active: r.is_active,
            is_featured: r.is_featured,
            sort_order: r.sort_order,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    title: String,
    price: Option<Decimal>,
    inventory_quantity: i32,
    sort_order: i32,
}

impl From<VariantRow> for CatalogVariant {
    fn from(r: VariantRow) -> Self {
        Self {
            id: VariantId::new(r.id),
            product_id: ProductId::new(r.product_id),
            title: r.title,
            price: r.price,
            inventory_quantity: r.inventory_quantity,
            sort_order: r.sort_order,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    product_id: String,
    image_url: String,
    alt_text: Option<String>,
    is_primary: bool,
    sort_order: i32,
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: String,
    slug: String,
    name: String,
    description: Option<String>,
    image_url: Option<String>,
    sort_order: i32,
    is_active: bool,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            slug: r.slug,
            name: r.name,
            description: r.description,
            image_url: r.image_url,
            sort_order: r.sort_order,
            is_active: r.is_active,
        }
    }
}

/// `%term%` with `LIKE` wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Catalog backed by the `products`, `product_variants`, `product_images`
/// and `categories` tables.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach categories, images and variants to product rows, preserving
    /// row order.
    async fn hydrate(&self, rows: Vec<ProductRow>) -> Result<Vec<ProductListing>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let category_ids: Vec<String> = rows
            .iter()
            .filter_map(|row| row.category_id.clone())
            .collect();

        let image_rows: Vec<ImageRow> = sqlx::query_as(
            r"
            SELECT product_id, image_url, alt_text, is_primary, sort_order
            FROM product_images
            WHERE product_id = ANY($1)
            ORDER BY product_id, sort_order, id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let variant_rows: Vec<VariantRow> = sqlx::query_as(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = ANY($1) \
             ORDER BY product_id, sort_order, id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let category_rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1)"
        ))
        .bind(&category_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut images: HashMap<String, Vec<ProductImage>> = HashMap::new();
        for row in image_rows {
            images
                .entry(row.product_id.clone())
                .or_default()
                .push(ProductImage {
                    product_id: ProductId::new(row.product_id),
                    image_url: row.image_url,
                    alt_text: row.alt_text,
                    is_primary: row.is_primary,
                    sort_order: row.sort_order,
                });
        }

        let mut variants: HashMap<String, Vec<CatalogVariant>> = HashMap::new();
        for row in variant_rows {
            variants
                .entry(row.product_id.clone())
                .or_default()
                .push(row.into());
        }

        let categories: HashMap<String, Category> = category_rows
            .into_iter()
            .map(|row| (row.id.clone(), Category::from(row)))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let category = row
                    .category_id
                    .as_ref()
                    .and_then(|id| categories.get(id))
                    .cloned();
                ProductListing {
                    images: images.remove(&row.id).unwrap_or_default(),
                    variants: variants.remove(&row.id).unwrap_or_default(),
                    product: row.into(),
                    category,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<CatalogProduct>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CatalogProduct::from))
    }

    async fn variant(&self, id: &VariantId) -> Result<Option<CatalogVariant>, RepositoryError> {
        let row: Option<VariantRow> = sqlx::query_as(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CatalogVariant::from))
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<ProductListing>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.is_active
              AND ($1::text IS NULL OR c.slug = $1)
              AND ($2::bool IS NULL OR p.is_featured = $2)
              AND ($3::text IS NULL OR p.name ILIKE $3 OR p.description ILIKE $3)
              AND ($4::numeric IS NULL OR LEAST(p.price, p.sale_price) >= $4)
              AND ($5::numeric IS NULL OR LEAST(p.price, p.sale_price) <= $5)
            ORDER BY p.sort_order, p.id
            LIMIT $6 OFFSET $7
            "
        ))
        .bind(filter.category.as_deref())
        .bind(filter.featured)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<ProductListing>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY sort_order, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 AND is_active"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Category::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("linen"), "%linen%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
