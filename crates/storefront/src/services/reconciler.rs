//! Applies verified payment notifications to orders.
//!
//! This is the only place an order's payment state changes. Each event maps
//! to at most one conditional write, so duplicated or reordered deliveries
//! converge on the same final state.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument, warn};

use openme_core::{Order, OrderStatus};

use crate::db::{OrderStore, RepositoryError, Transition};
use crate::payments::webhook::{CheckoutSessionData, Event, EventKind};

/// Side effects that must run exactly once per paid order.
#[async_trait]
pub trait PaymentHooks: Send + Sync {
    /// Called after an order newly transitions to paid. Never called for a
    /// duplicate delivery.
    async fn order_paid(&self, order: &Order);
}

/// Default hooks: record the payment in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPaymentHooks;

#[async_trait]
impl PaymentHooks for LogPaymentHooks {
    async fn order_paid(&self, order: &Order) {
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order paid"
        );
    }
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order changed.
    Applied,
    /// The order was already in (or past) the target state.
    AlreadyApplied,
    /// The event names an order that does not exist.
    OrderNotFound,
    /// The session carries no usable `order_id` metadata.
    MissingOrderReference,
    /// Informational event; nothing to change.
    Ignored,
}

/// Maps events onto order state changes.
pub struct Reconciler<'a> {
    store: &'a dyn OrderStore,
    hooks: &'a dyn PaymentHooks,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn OrderStore, hooks: &'a dyn PaymentHooks) -> Self {
        Self { store, hooks }
    }

    /// Apply one verified event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` when the write fails, so the delivery is
    /// answered with an error and the provider retries it.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.kind.type_name()))]
    pub async fn handle(&self, event: &Event) -> Result<ReconcileOutcome, RepositoryError> {
        match &event.kind {
            EventKind::CheckoutSessionCompleted(session) => self.session_completed(session).await,
            EventKind::CheckoutSessionExpired(session) => self.session_expired(session).await,
            EventKind::PaymentIntentSucceeded(intent) => {
                info!(payment_intent = %intent.id, amount = ?intent.amount, "Payment succeeded");
                Ok(ReconcileOutcome::Ignored)
            }
            EventKind::PaymentIntentFailed(intent) => {
                let reason = intent
                    .last_payment_error
                    .as_ref()
                    .and_then(|error| error.message.as_deref())
                    .unwrap_or("unknown");
                warn!(payment_intent = %intent.id, reason, "Payment failed");
                Ok(ReconcileOutcome::Ignored)
            }
            EventKind::Unhandled(event_type) => {
                info!(event_type = %event_type, "Unhandled event type");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn session_completed(
        &self,
        session: &CheckoutSessionData,
    ) -> Result<ReconcileOutcome, RepositoryError> {
        let Some(order_id) = session.order_id() else {
            warn!(session_id = %session.id, "Completed session has no order_id metadata");
            return Ok(ReconcileOutcome::MissingOrderReference);
        };

        let transition = self
            .store
            .mark_paid(order_id, session.payment_intent.as_deref(), Utc::now())
            .await?;

        Ok(match transition {
            Transition::Applied(order) if order.status != OrderStatus::Paid => {
                warn!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    status = ?order.status,
                    payment_intent = ?order.payment_intent_id,
                    "Payment received for an order that is no longer pending, refund required"
                );
                ReconcileOutcome::Applied
            }
            Transition::Applied(order) => {
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    "Payment recorded"
                );
                self.hooks.order_paid(&order).await;
                ReconcileOutcome::Applied
            }
            Transition::AlreadyApplied => {
                info!(order_id = %order_id, "Order already paid, duplicate delivery ignored");
                ReconcileOutcome::AlreadyApplied
            }
            Transition::NotFound => {
                warn!(order_id = %order_id, "Completed session references unknown order");
                ReconcileOutcome::OrderNotFound
            }
        })
    }

    async fn session_expired(
        &self,
        session: &CheckoutSessionData,
    ) -> Result<ReconcileOutcome, RepositoryError> {
        let Some(order_id) = session.order_id() else {
            warn!(session_id = %session.id, "Expired session has no order_id metadata");
            return Ok(ReconcileOutcome::MissingOrderReference);
        };

        let transition = self.store.mark_payment_failed(order_id, Utc::now()).await?;

        Ok(match transition {
            Transition::Applied(_) => {
                info!(order_id = %order_id, "Checkout session expired, payment marked failed");
                ReconcileOutcome::Applied
            }
            Transition::AlreadyApplied => {
                info!(order_id = %order_id, "Session expired after payment settled, ignored");
                ReconcileOutcome::AlreadyApplied
            }
            Transition::NotFound => {
                warn!(order_id = %order_id, "Expired session references unknown order");
                ReconcileOutcome::OrderNotFound
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use openme_core::{NewOrder, OrderId, OrderLine, PaymentStatus, ProductId, ShippingAddress};

    use super::*;
    use crate::db::InMemoryOrderStore;
    use crate::payments::webhook::PaymentIntentData;

    #[derive(Default)]
    struct CountingHooks(AtomicUsize);

    #[async_trait]
    impl PaymentHooks for CountingHooks {
        async fn order_paid(&self, _order: &Order) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn placed(store: &InMemoryOrderStore) -> Order {
        let new = NewOrder {
            user_id: None,
            email: "ada@example.com".into(),
            items: vec![OrderLine {
                product_id: ProductId::new("p1"),
                variant_id: None,
                product_name: "Tee".into(),
                product_sku: None,
                product_image: None,
                variant_name: None,
                unit_price: Decimal::new(2500, 2),
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
            subtotal: Decimal::new(2500, 2),
            shipping_cost: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::new(2500, 2),
            payment_method: "card".into(),
        };
        let email = new.validate().unwrap();
        let order = Order::place(new, email, OrderId::generate(), "ORD-1".into(), Utc::now());
        store.insert(&order).await.unwrap();
        order
    }

    fn session(order_id: Option<OrderId>) -> CheckoutSessionData {
        let mut metadata = HashMap::new();
        if let Some(id) = order_id {
            metadata.insert("order_id".to_owned(), id.to_string());
        }
        CheckoutSessionData {
            id: "cs_1".into(),
            payment_intent: Some("pi_1".into()),
            metadata,
            customer_email: None,
            amount_total: None,
        }
    }

    fn event(kind: EventKind) -> Event {
        Event {
            id: "evt_1".into(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_completed_marks_paid_once() {
        let store = InMemoryOrderStore::new();
        let hooks = CountingHooks::default();
        let order = placed(&store).await;
        let reconciler = Reconciler::new(&store, &hooks);
        let completed = event(EventKind::CheckoutSessionCompleted(session(Some(order.id))));

        assert_eq!(reconciler.handle(&completed).await.unwrap(), ReconcileOutcome::Applied);
        assert_eq!(
            reconciler.handle(&completed).await.unwrap(),
            ReconcileOutcome::AlreadyApplied
        );

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(hooks.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_marks_failed_keeps_status() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store).await;
        let reconciler = Reconciler::new(&store, &LogPaymentHooks);

        let expired = event(EventKind::CheckoutSessionExpired(session(Some(order.id))));
        assert_eq!(reconciler.handle(&expired).await.unwrap(), ReconcileOutcome::Applied);

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_late_expiry_does_not_downgrade_paid_order() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store).await;
        let reconciler = Reconciler::new(&store, &LogPaymentHooks);

        let completed = event(EventKind::CheckoutSessionCompleted(session(Some(order.id))));
        let expired = event(EventKind::CheckoutSessionExpired(session(Some(order.id))));
        reconciler.handle(&completed).await.unwrap();
        assert_eq!(
            reconciler.handle(&expired).await.unwrap(),
            ReconcileOutcome::AlreadyApplied
        );

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_late_payment_does_not_revive_cancelled_order() {
        let store = InMemoryOrderStore::new();
        let hooks = CountingHooks::default();
        let order = placed(&store).await;
        let reconciler = Reconciler::new(&store, &hooks);

        let expired = event(EventKind::CheckoutSessionExpired(session(Some(order.id))));
        reconciler.handle(&expired).await.unwrap();
        store
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled, Utc::now())
            .await
            .unwrap();

        let completed = event(EventKind::CheckoutSessionCompleted(session(Some(order.id))));
        assert_eq!(reconciler.handle(&completed).await.unwrap(), ReconcileOutcome::Applied);

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(hooks.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_and_unknown_order_are_acknowledged() {
        let store = InMemoryOrderStore::new();
        let reconciler = Reconciler::new(&store, &LogPaymentHooks);

        let no_ref = event(EventKind::CheckoutSessionCompleted(session(None)));
        assert_eq!(
            reconciler.handle(&no_ref).await.unwrap(),
            ReconcileOutcome::MissingOrderReference
        );

        let unknown = event(EventKind::CheckoutSessionCompleted(session(Some(
            OrderId::generate(),
        ))));
        assert_eq!(
            reconciler.handle(&unknown).await.unwrap(),
            ReconcileOutcome::OrderNotFound
        );
    }

    #[tokio::test]
    async fn test_payment_intent_events_only_logged() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store).await;
        let reconciler = Reconciler::new(&store, &LogPaymentHooks);

        let failed = event(EventKind::PaymentIntentFailed(PaymentIntentData {
            id: "pi_1".into(),
            amount: Some(2500),
            last_payment_error: None,
        }));
        assert_eq!(reconciler.handle(&failed).await.unwrap(), ReconcileOutcome::Ignored);

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = InMemoryOrderStore::new();
        let order = placed(&store).await;
        store.set_unavailable(true);
        let reconciler = Reconciler::new(&store, &LogPaymentHooks);

        let completed = event(EventKind::CheckoutSessionCompleted(session(Some(order.id))));
        assert!(reconciler.handle(&completed).await.is_err());
    }
}
