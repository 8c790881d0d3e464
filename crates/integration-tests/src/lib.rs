//! Integration tests for openme.
//!
//! Tests drive the full storefront router in-process with in-memory
//! backends and a recording payment gateway, so no database or Stripe
//! account is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p openme-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `orders` - Order intake and lookup
//! - `cart` - Cart preflight against catalog stock
//! - `catalog` - Product and category browsing
//! - `checkout_flow` - Order, session, webhook, and success page end to end
//! - `webhook` - Signature checks and reconciliation edge cases

// Test helpers panic on setup failures.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use openme_core::{CurrencyCode, Order, ProductId, VariantId};
use openme_storefront::config::{StorefrontConfig, StripeConfig};
use openme_storefront::db::{InMemoryCatalog, InMemoryOrderStore};
use openme_storefront::models::catalog::{
    CatalogProduct, CatalogVariant, Category, ProductImage,
};
use openme_storefront::payments::webhook::{SIGNATURE_HEADER, sign_payload};
use openme_storefront::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway,
};
use openme_storefront::services::PaymentHooks;
use openme_storefront::state::{AppState, Backends};

/// Webhook signing secret used by every test context.
pub const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// Public base URL used by every test context.
pub const BASE_URL: &str = "http://shop.test";

/// Gateway that records session requests and answers with a fixed session.
#[derive(Default)]
pub struct RecordingGateway {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{id}"),
            id,
        })
    }
}

/// Hooks that count paid transitions.
#[derive(Default)]
pub struct CountingHooks {
    paid: AtomicUsize,
}

impl CountingHooks {
    #[must_use]
    pub fn paid_count(&self) -> usize {
        self.paid.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentHooks for CountingHooks {
    async fn order_paid(&self, _order: &Order) {
        self.paid.fetch_add(1, Ordering::SeqCst);
    }
}

/// Configuration pointing at nothing real.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused@localhost/openme_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: BASE_URL.to_owned(),
        stripe: StripeConfig {
            secret_key: Some(SecretString::from("sk_test_integration")),
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
            currency: CurrencyCode::USD,
            ..StripeConfig::default()
        },
        catalog_price_check: true,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A storefront wired to in-memory collaborators.
pub struct TestContext {
    pub app: Router,
    pub orders: Arc<InMemoryOrderStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub gateway: Arc<RecordingGateway>,
    pub hooks: Arc<CountingHooks>,
}

impl TestContext {
    /// Default context: Stripe and webhook secrets configured.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Context with a customized configuration. The gateway is only wired
    /// when the configuration carries a Stripe key.
    pub async fn with_config(config: StorefrontConfig) -> Self {
        let orders = Arc::new(InMemoryOrderStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let gateway = Arc::new(RecordingGateway::default());
        let hooks = Arc::new(CountingHooks::default());

        seed_catalog(&catalog).await;

        let backends = Backends {
            orders: orders.clone(),
            catalog: catalog.clone(),
            gateway: config
                .stripe
                .secret_key
                .is_some()
                .then(|| gateway.clone() as Arc<dyn PaymentGateway>),
            hooks: hooks.clone(),
        };
        let app = openme_storefront::app(AppState::new(config, backends));

        Self {
            app,
            orders,
            catalog,
            gateway,
            hooks,
        }
    }

    /// Send a JSON request and decode the JSON response.
    pub async fn send(&self, method: Method, uri: &str, body: Option<&Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.call(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    /// Deliver a webhook payload with an explicit signature header.
    pub async fn deliver_webhook(&self, payload: &str, signature: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        self.call(builder.body(Body::from(payload.to_owned())).unwrap())
            .await
    }

    /// Deliver a webhook payload signed with the test secret.
    pub async fn deliver_signed(&self, payload: &str) -> (StatusCode, Value) {
        let header = sign(payload);
        self.deliver_webhook(payload, Some(&header)).await
    }

    /// Place a valid order for one unit of the seeded product.
    pub async fn place_order(&self, email: &str) -> Value {
        let (status, body) = self.post("/api/orders", &order_body(email, 1)).await;
        assert_eq!(status, StatusCode::CREATED, "order intake failed: {body}");
        body["order"].clone()
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}

/// Seeded catalog:
/// - `linen-set` (Sets, featured) at 25.00 with `linen-set-s` (3 left) and
///   `linen-set-m` (sold out)
/// - `silk-cami` (Tops) at 40.00, on sale for 32.00
/// - `wool-wrap` (Tops), inactive
async fn seed_catalog(catalog: &InMemoryCatalog) {
    catalog.upsert_category(category("cat-sets", "sets", "Sets", 0)).await;
    catalog.upsert_category(category("cat-tops", "tops", "Tops", 1)).await;

    catalog
        .upsert_product(CatalogProduct {
            id: ProductId::new("linen-set"),
            slug: "linen-set".into(),
            name: "Linen Set".into(),
            description: Some("Relaxed two-piece in washed linen".into()),
            sku: Some("LS-01".into()),
            category_id: Some("cat-sets".into()),
            price: Decimal::new(2500, 2),
            sale_price: None,
            stock_quantity: 10,
            is_active: true,
            is_featured: true,
            sort_order: 0,
        })
        .await;
    catalog
        .upsert_product(CatalogProduct {
            id: ProductId::new("silk-cami"),
            slug: "silk-cami".into(),
            name: "Silk Cami".into(),
            description: None,
            sku: Some("SC-01".into()),
            category_id: Some("cat-tops".into()),
            price: Decimal::new(4000, 2),
            sale_price: Some(Decimal::new(3200, 2)),
            stock_quantity: 5,
            is_active: true,
            is_featured: false,
            sort_order: 1,
        })
        .await;
    catalog
        .upsert_product(CatalogProduct {
            id: ProductId::new("wool-wrap"),
            slug: "wool-wrap".into(),
            name: "Wool Wrap".into(),
            description: None,
            sku: None,
            category_id: Some("cat-tops".into()),
            price: Decimal::new(9000, 2),
            sale_price: None,
            stock_quantity: 2,
            is_active: false,
            is_featured: true,
            sort_order: 2,
        })
        .await;

    for (id, title, quantity, sort_order) in [
        ("linen-set-s", "Small", 3, 0),
        ("linen-set-m", "Medium", 0, 1),
    ] {
        catalog
            .upsert_variant(CatalogVariant {
                id: VariantId::new(id),
                product_id: ProductId::new("linen-set"),
                title: title.into(),
                price: None,
                inventory_quantity: quantity,
                sort_order,
            })
            .await;
    }

    catalog
        .add_image(ProductImage {
            product_id: ProductId::new("linen-set"),
            image_url: "https://cdn.shop.test/linen-set.jpg".into(),
            alt_text: Some("Linen Set".into()),
            is_primary: true,
            sort_order: 0,
        })
        .await;
}

fn category(id: &str, slug: &str, name: &str, sort_order: i32) -> Category {
    Category {
        id: id.into(),
        slug: slug.into(),
        name: name.into(),
        description: None,
        image_url: None,
        sort_order,
        is_active: true,
    }
}

/// Sign a payload with the test secret at the current time.
#[must_use]
pub fn sign(payload: &str) -> String {
    sign_at(payload, chrono::Utc::now().timestamp())
}

#[must_use]
pub fn sign_at(payload: &str, timestamp: i64) -> String {
    sign_payload(WEBHOOK_SECRET, payload.as_bytes(), timestamp).unwrap()
}

/// Order intake body for `quantity` units of the seeded product.
#[must_use]
pub fn order_body(email: &str, quantity: u32) -> Value {
    let subtotal = Decimal::new(2500, 2) * Decimal::from(quantity);
    let shipping = Decimal::new(999, 2);
    json!({
        "email": email,
        "items": [{
            "product_id": "linen-set",
            "product_name": "Linen Set",
            "product_image": "https://cdn.shop.test/linen-set.jpg",
            "unit_price": "25.00",
            "quantity": quantity,
        }],
        "shipping": {
            "full_name": "Ada Lovelace",
            "address_line1": "1 Analytical Way",
            "city": "London",
            "postal_code": "N1 9GU",
            "country": "United Kingdom",
        },
        "subtotal": subtotal.to_string(),
        "shipping_cost": shipping.to_string(),
        "tax": "0",
        "total": (subtotal + shipping).to_string(),
    })
}

/// A `checkout.session.completed` event for `order`.
#[must_use]
pub fn session_completed(event_id: &str, order: &Value) -> String {
    session_event(event_id, "checkout.session.completed", order)
}

/// A `checkout.session.expired` event for `order`.
#[must_use]
pub fn session_expired(event_id: &str, order: &Value) -> String {
    session_event(event_id, "checkout.session.expired", order)
}

fn session_event(event_id: &str, event_type: &str, order: &Value) -> String {
    json!({
        "id": event_id,
        "type": event_type,
        "data": {
            "object": {
                "id": "cs_test_1",
                "payment_intent": "pi_test_1",
                "customer_email": order["email"],
                "metadata": {
                    "order_id": order["id"],
                    "order_number": order["order_number"],
                },
            }
        }
    })
    .to_string()
}
