//! In-memory store and catalog for tests and local demos.
//!
//! Both follow the same conditional-update rules as the `PostgreSQL`
//! implementations, using the transition methods on [`Order`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use openme_core::{Email, Order, OrderId, OrderStatus, ProductId, UserId, VariantId};

use super::{Catalog, OrderStore, RepositoryError, Transition};
use crate::models::catalog::{
    CatalogProduct, CatalogVariant, Category, ProductFilter, ProductImage, ProductListing,
};

/// Order store kept in a `Vec` behind an async lock.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    unavailable: AtomicBool,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: OrderId,
        apply: impl FnOnce(&mut Order) -> bool + Send,
    ) -> Result<Transition, RepositoryError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        let Some(order) = orders.iter_mut().find(|order| order.id == id) else {
            return Ok(Transition::NotFound);
        };

        Ok(if apply(order) {
            Transition::Applied(Box::new(order.clone()))
        } else {
            Transition::AlreadyApplied
        })
    }

    async fn list_where(&self, keep: impl Fn(&Order) -> bool + Send) -> Vec<Order> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .filter(|order| keep(order))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        if orders
            .iter()
            .any(|existing| existing.id == order.id || existing.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict(
                "order number already exists".to_owned(),
            ));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|order| order.id == id)
            .cloned())
    }

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|order| order.order_number == order_number)
            .cloned())
    }

    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self.list_where(|order| order.email.matches(email)).await)
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .list_where(|order| order.user_id.as_ref() == Some(user_id))
            .await)
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        payment_intent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        self.transition(id, |order| order.record_payment(payment_intent_id, now))
            .await
    }

    async fn mark_payment_failed(
        &self,
        id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        self.transition(id, |order| order.record_payment_expired(now))
            .await
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        self.transition(id, |order| {
            if order.status != from {
                return false;
            }
            order.status = to;
            order.updated_at = now;
            true
        })
        .await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

/// Catalog held in maps, seeded by the caller.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
    variants: RwLock<HashMap<VariantId, CatalogVariant>>,
    images: RwLock<Vec<ProductImage>>,
    categories: RwLock<HashMap<String, Category>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_product(&self, product: CatalogProduct) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    pub async fn upsert_variant(&self, variant: CatalogVariant) {
        self.variants
            .write()
            .await
            .insert(variant.id.clone(), variant);
    }

    pub async fn upsert_category(&self, category: Category) {
        self.categories
            .write()
            .await
            .insert(category.id.clone(), category);
    }

    pub async fn add_image(&self, image: ProductImage) {
        self.images.write().await.push(image);
    }

    async fn listing(&self, product: CatalogProduct) -> ProductListing {
        let category = match &product.category_id {
            Some(id) => self.categories.read().await.get(id).cloned(),
            None => None,
        };

        let mut images: Vec<ProductImage> = self
            .images
            .read()
            .await
            .iter()
            .filter(|image| image.product_id == product.id)
            .cloned()
            .collect();
        images.sort_by_key(|image| image.sort_order);

        let mut variants: Vec<CatalogVariant> = self
            .variants
            .read()
            .await
            .values()
            .filter(|variant| variant.product_id == product.id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));

        ProductListing {
            product,
            category,
            images,
            variants,
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<CatalogProduct>, RepositoryError> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn variant(&self, id: &VariantId) -> Result<Option<CatalogVariant>, RepositoryError> {
        Ok(self.variants.read().await.get(id).cloned())
    }

    async fn products(&self, filter: &ProductFilter) -> Result<Vec<ProductListing>, RepositoryError> {
        let mut matched: Vec<CatalogProduct> = {
            let products = self.products.read().await;
            let categories = self.categories.read().await;
            products
                .values()
                .filter(|product| {
                    let category = product.category_id.as_ref().and_then(|id| categories.get(id));
                    filter.matches(product, category)
                })
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));

        let page = matched
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.limit).unwrap_or(usize::MAX));

        let mut listings = Vec::new();
        for product in page {
            listings.push(self.listing(product).await);
        }
        Ok(listings)
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<ProductListing>, RepositoryError> {
        let found = self
            .products
            .read()
            .await
            .values()
            .find(|product| product.is_active && product.slug == slug)
            .cloned();

        Ok(match found {
            Some(product) => Some(self.listing(product).await),
            None => None,
        })
    }

    async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories: Vec<Category> = self
            .categories
            .read()
            .await
            .values()
            .filter(|category| category.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        Ok(self
            .categories
            .read()
            .await
            .values()
            .find(|category| category.is_active && category.slug == slug)
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use openme_core::{NewOrder, OrderLine, PaymentStatus, ShippingAddress};

    use super::*;

    fn order(number: &str, email: &str, placed: DateTime<Utc>) -> Order {
        let new = NewOrder {
            user_id: Some(UserId::new("u1")),
            email: email.into(),
            items: vec![OrderLine {
                product_id: ProductId::new("p1"),
                variant_id: None,
                product_name: "Tee".into(),
                product_sku: None,
                product_image: None,
                variant_name: None,
                unit_price: Decimal::new(1000, 2),
                quantity: 1,
            }],
            shipping: ShippingAddress {
                full_name: "Ada".into(),
                phone: None,
                address_line1: "1 Main St".into(),
                address_line2: None,
                city: "Springfield".into(),
                state: None,
                postal_code: "12345".into(),
                country: "United States".into(),
            },
            subtotal: Decimal::new(1000, 2),
            shipping_cost: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::new(1000, 2),
            payment_method: "card".into(),
        };
        let email = new.validate().unwrap();
        Order::place(new, email, OrderId::generate(), number.into(), placed)
    }

    #[tokio::test]
    async fn test_duplicate_order_number_conflicts() {
        let store = InMemoryOrderStore::new();
        store.insert(&order("ORD-1", "a@b.co", Utc::now())).await.unwrap();
        let err = store
            .insert(&order("ORD-1", "a@b.co", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_mark_paid_applies_once() {
        let store = InMemoryOrderStore::new();
        let placed = order("ORD-1", "a@b.co", Utc::now());
        store.insert(&placed).await.unwrap();

        let first = store.mark_paid(placed.id, Some("pi_1"), Utc::now()).await.unwrap();
        let second = store.mark_paid(placed.id, Some("pi_1"), Utc::now()).await.unwrap();

        assert!(first.is_applied());
        assert_eq!(second, Transition::AlreadyApplied);
        let stored = store.get(placed.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_unknown_order_not_found() {
        let store = InMemoryOrderStore::new();
        let result = store
            .mark_payment_failed(OrderId::generate(), Utc::now())
            .await
            .unwrap();
        assert_eq!(result, Transition::NotFound);
    }

    #[tokio::test]
    async fn test_update_status_is_conditional() {
        let store = InMemoryOrderStore::new();
        let placed = order("ORD-1", "a@b.co", Utc::now());
        store.insert(&placed).await.unwrap();

        let stale = store
            .update_status(placed.id, OrderStatus::Paid, OrderStatus::Processing, Utc::now())
            .await
            .unwrap();
        assert_eq!(stale, Transition::AlreadyApplied);
    }

    #[tokio::test]
    async fn test_list_by_email_newest_first_case_insensitive() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        store
            .insert(&order("ORD-OLD", "Ada@Example.com", now - Duration::days(2)))
            .await
            .unwrap();
        store.insert(&order("ORD-NEW", "ada@example.com", now)).await.unwrap();
        store.insert(&order("ORD-X", "bob@example.com", now)).await.unwrap();

        let email = Email::parse("ADA@example.com").unwrap();
        let found = store.list_by_email(&email).await.unwrap();
        let numbers: Vec<_> = found.iter().map(|o| o.order_number.as_str()).collect();
        assert_eq!(numbers, ["ORD-NEW", "ORD-OLD"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryOrderStore::new();
        store.set_unavailable(true);
        assert!(store.ping().await.is_err());
        assert!(store.insert(&order("ORD-1", "a@b.co", Utc::now())).await.is_err());
    }
}
