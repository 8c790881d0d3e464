//! Hosted checkout session creation.
//!
//! The session is always built from the order as it was persisted, so a
//! client cannot change what it pays for after intake.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use openme_core::{
    CurrencyCode, Order, OrderId, OrderLine, PaymentStatus, Price, PriceError, ShippingAddress,
};

use crate::db::{OrderStore, RepositoryError};
use crate::payments::{
    ALLOWED_SHIPPING_COUNTRIES, CheckoutSession, CheckoutSessionRequest, PaymentError,
    PaymentGateway, SessionLineItem,
};

/// Request body of `POST /api/checkout`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<OrderLine>,
    pub order_id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

/// Checkout session errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("No items provided")]
    EmptyItems,

    #[error("STRIPE_SECRET_KEY is not configured")]
    NotConfigured,

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is already paid")]
    AlreadyPaid(String),

    #[error("invalid item price: {0}")]
    Price(#[from] PriceError),

    #[error(transparent)]
    Provider(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Builds provider sessions for pending orders.
pub struct CheckoutService<'a> {
    store: &'a dyn OrderStore,
    gateway: Option<&'a dyn PaymentGateway>,
    base_url: &'a str,
    currency: CurrencyCode,
}

impl<'a> CheckoutService<'a> {
    /// `gateway` is `None` when no provider key is configured.
    #[must_use]
    pub const fn new(
        store: &'a dyn OrderStore,
        gateway: Option<&'a dyn PaymentGateway>,
        base_url: &'a str,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            store,
            gateway,
            base_url,
            currency,
        }
    }

    /// Open a hosted checkout session for the order named in `request`.
    ///
    /// The order is left untouched; a failed attempt can simply be retried.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]. Configuration problems are reported before
    /// any network call.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyItems);
        }
        let gateway = self.gateway.ok_or(CheckoutError::NotConfigured)?;

        let order = self
            .store
            .get(request.order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(request.order_id))?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(CheckoutError::AlreadyPaid(order.order_number));
        }
        if request
            .order_number
            .as_deref()
            .is_some_and(|number| number != order.order_number)
        {
            warn!(
                order_number = %order.order_number,
                "Checkout request order number does not match stored order"
            );
        }

        let session_request = self.session_request(&order)?;
        let session = gateway.create_checkout_session(&session_request).await?;

        info!(
            order_number = %order.order_number,
            session_id = %session.id,
            "Checkout session created"
        );
        Ok(session)
    }

    fn session_request(&self, order: &Order) -> Result<CheckoutSessionRequest, PriceError> {
        let line_items = order
            .items
            .iter()
            .map(|item| {
                Ok(SessionLineItem {
                    name: item.product_name.clone(),
                    image: item.product_image.clone(),
                    unit_amount: Price::new(item.unit_price, self.currency).to_minor_units()?,
                    quantity: item.quantity,
                    product_id: item.product_id.clone(),
                    variant_id: item.variant_id.clone(),
                })
            })
            .collect::<Result<Vec<_>, PriceError>>()?;

        Ok(CheckoutSessionRequest {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_email: order.email.to_string(),
            currency: self.currency,
            line_items,
            success_url: format!(
                "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}&order={}",
                self.base_url, order.order_number
            ),
            cancel_url: format!("{}/checkout?cancelled=true", self.base_url),
            allowed_countries: ALLOWED_SHIPPING_COUNTRIES
                .iter()
                .map(|country| (*country).to_owned())
                .collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use openme_core::{NewOrder, ProductId, UserId};

    use super::*;
    use crate::db::InMemoryOrderStore;

    /// Gateway that records requests and returns a fixed session.
    #[derive(Default)]
    pub struct RecordingGateway {
        pub requests: Mutex<Vec<CheckoutSessionRequest>>,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn create_checkout_session(
            &self,
            request: &CheckoutSessionRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(message) = &self.fail_with {
                return Err(PaymentError::Provider {
                    status: 400,
                    message: message.clone(),
                });
            }
            Ok(CheckoutSession {
                id: "cs_test_1".into(),
                url: "https://checkout.stripe.com/c/pay/cs_test_1".into(),
            })
        }
    }

    fn line(price: Decimal, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new("p1"),
            variant_id: None,
            product_name: "Linen Set".into(),
            product_sku: None,
            product_image: Some("https://cdn.example.com/p1.jpg".into()),
            variant_name: None,
            unit_price: price,
            quantity,
        }
    }

    async fn placed(store: &InMemoryOrderStore, price: Decimal, quantity: u32) -> Order {
        let subtotal = price * Decimal::from(quantity);
        let new = NewOrder {
            user_id: Some(UserId::new("u1")),
            email: "ada@example.com".into(),
            items: vec![line(price, quantity)],
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
            subtotal,
            shipping_cost: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: subtotal,
            payment_method: "card".into(),
        };
        let email = new.validate().unwrap();
        let order = Order::place(new, email, OrderId::generate(), "ORD-TEST-1".into(), Utc::now());
        store.insert(&order).await.unwrap();
        order
    }

    fn request_for(order: &Order) -> CheckoutRequest {
        CheckoutRequest {
            items: order.items.clone(),
            order_id: order.id,
            order_number: Some(order.order_number.clone()),
            email: Some(order.email.to_string()),
            shipping_address: Some(order.shipping.clone()),
        }
    }

    #[tokio::test]
    async fn test_session_built_from_persisted_order() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(2500, 2), 2).await;
        let gateway = RecordingGateway::default();
        let service =
            CheckoutService::new(&store, Some(&gateway), "http://localhost:5000", CurrencyCode::USD);

        let mut request = request_for(&order);
        request.items[0].unit_price = Decimal::new(1, 2);
        let session = service.create_session(&request).await.unwrap();
        assert_eq!(session.id, "cs_test_1");

        let sent = gateway.requests.lock().unwrap().pop().unwrap();
        assert_eq!(sent.line_items[0].unit_amount, 2500);
        assert_eq!(sent.line_items[0].quantity, 2);
        assert_eq!(sent.customer_email, "ada@example.com");
        assert_eq!(
            sent.success_url,
            "http://localhost:5000/checkout/success?session_id={CHECKOUT_SESSION_ID}&order=ORD-TEST-1"
        );
        assert_eq!(sent.cancel_url, "http://localhost:5000/checkout?cancelled=true");
        assert_eq!(sent.allowed_countries.len(), 8);
    }

    #[tokio::test]
    async fn test_midpoint_price_rounds_up() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(19_995, 3), 1).await;
        let gateway = RecordingGateway::default();
        let service =
            CheckoutService::new(&store, Some(&gateway), "http://localhost:5000", CurrencyCode::USD);

        service.create_session(&request_for(&order)).await.unwrap();
        let sent = gateway.requests.lock().unwrap().pop().unwrap();
        assert_eq!(sent.line_items[0].unit_amount, 2000);
    }

    #[tokio::test]
    async fn test_empty_items_rejected_before_anything_else() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(2500, 2), 1).await;
        let service = CheckoutService::new(&store, None, "http://localhost:5000", CurrencyCode::USD);

        let mut request = request_for(&order);
        request.items.clear();
        assert!(matches!(
            service.create_session(&request).await,
            Err(CheckoutError::EmptyItems)
        ));
    }

    #[tokio::test]
    async fn test_missing_gateway_is_configuration_error() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(2500, 2), 1).await;
        let service = CheckoutService::new(&store, None, "http://localhost:5000", CurrencyCode::USD);

        assert!(matches!(
            service.create_session(&request_for(&order)).await,
            Err(CheckoutError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_unknown_order_not_found() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(2500, 2), 1).await;
        let gateway = RecordingGateway::default();
        let service =
            CheckoutService::new(&store, Some(&gateway), "http://localhost:5000", CurrencyCode::USD);

        let mut request = request_for(&order);
        request.order_id = OrderId::generate();
        assert!(matches!(
            service.create_session(&request).await,
            Err(CheckoutError::OrderNotFound(_))
        ));
        assert!(gateway.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paid_order_rejected() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(2500, 2), 1).await;
        store.mark_paid(order.id, Some("pi_1"), Utc::now()).await.unwrap();
        let gateway = RecordingGateway::default();
        let service =
            CheckoutService::new(&store, Some(&gateway), "http://localhost:5000", CurrencyCode::USD);

        assert!(matches!(
            service.create_session(&request_for(&order)).await,
            Err(CheckoutError::AlreadyPaid(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_order_pending() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store, Decimal::new(2500, 2), 1).await;
        let gateway = RecordingGateway {
            fail_with: Some("Invalid email address".into()),
            ..RecordingGateway::default()
        };
        let service =
            CheckoutService::new(&store, Some(&gateway), "http://localhost:5000", CurrencyCode::USD);

        let err = service.create_session(&request_for(&order)).await.unwrap_err();
        assert!(err.to_string().contains("Invalid email address"));
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }
}
