//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{Catalog, OrderStore, PgCatalog, PgOrderStore};
use crate::payments::webhook::WebhookVerifier;
use crate::payments::{PaymentError, PaymentGateway, StripeClient};
use crate::services::{
    CatalogService, CheckoutService, LogPaymentHooks, OrderService, PaymentHooks, Reconciler,
};

/// Collaborators the handlers talk to.
pub struct Backends {
    pub orders: Arc<dyn OrderStore>,
    pub catalog: Arc<dyn Catalog>,
    /// `None` when no Stripe key is configured.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub hooks: Arc<dyn PaymentHooks>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backends: Backends,
    webhook: Option<WebhookVerifier>,
}

impl AppState {
    /// Create application state from explicit collaborators.
    #[must_use]
    pub fn new(config: StorefrontConfig, backends: Backends) -> Self {
        let webhook = config
            .stripe
            .webhook_secret
            .clone()
            .map(|secret| WebhookVerifier::new(secret, config.stripe.webhook_tolerance));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backends,
                webhook,
            }),
        }
    }

    /// Production wiring: `PostgreSQL` store and catalog, Stripe when a key
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the Stripe HTTP client cannot be built.
    pub fn connect(config: StorefrontConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let gateway: Option<Arc<dyn PaymentGateway>> = match &config.stripe.secret_key {
            Some(key) => Some(Arc::new(StripeClient::new(
                key.clone(),
                &config.stripe.api_base,
            )?)),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set, checkout will be unavailable");
                None
            }
        };
        if config.stripe.webhook_secret.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhooks will be refused");
        }

        let backends = Backends {
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            catalog: Arc::new(PgCatalog::new(pool)),
            gateway,
            hooks: Arc::new(LogPaymentHooks),
        };
        Ok(Self::new(config, backends))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.backends.orders.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.inner.backends.catalog.as_ref()
    }

    /// Webhook verifier, `None` when no signing secret is configured.
    #[must_use]
    pub fn webhook_verifier(&self) -> Option<&WebhookVerifier> {
        self.inner.webhook.as_ref()
    }

    /// Order intake, with catalog price checks when enabled.
    #[must_use]
    pub fn order_service(&self) -> OrderService<'_> {
        let catalog = self
            .inner
            .config
            .catalog_price_check
            .then(|| self.catalog());
        OrderService::new(self.orders(), catalog)
    }

    #[must_use]
    pub fn catalog_service(&self) -> CatalogService<'_> {
        CatalogService::new(self.catalog())
    }

    #[must_use]
    pub fn checkout_service(&self) -> CheckoutService<'_> {
        let config = &self.inner.config;
        CheckoutService::new(
            self.orders(),
            self.inner.backends.gateway.as_deref(),
            &config.base_url,
            config.stripe.currency,
        )
    }

    #[must_use]
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.orders(), self.inner.backends.hooks.as_ref())
    }
}
