//! Stripe Checkout client.
//!
//! Talks to the REST API directly with form-encoded requests. Only the
//! session-creation call is needed; everything else arrives by webhook.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// Create a client for `api_base` (normally `https://api.stripe.com`).
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Transport` if the HTTP client cannot be built.
    pub fn new(secret_key: SecretString, api_base: &str) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            secret_key,
        })
    }
}

/// Flatten a session request into Stripe's bracketed form keys.
fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let currency = request.currency.code().to_ascii_lowercase();
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("customer_email".into(), request.customer_email.clone()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("metadata[order_id]".into(), request.order_id.to_string()),
        ("metadata[order_number]".into(), request.order_number.clone()),
    ];

    for (i, country) in request.allowed_countries.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            country.clone(),
        ));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let price = format!("line_items[{i}][price_data]");
        form.push((format!("{price}[currency]"), currency.clone()));
        form.push((format!("{price}[unit_amount]"), item.unit_amount.to_string()));
        form.push((format!("{price}[product_data][name]"), item.name.clone()));
        if let Some(image) = &item.image {
            form.push((format!("{price}[product_data][images][0]"), image.clone()));
        }
        form.push((
            format!("{price}[product_data][metadata][product_id]"),
            item.product_id.to_string(),
        ));
        form.push((
            format!("{price}[product_data][metadata][variant_id]"),
            item.variant_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ));
        form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id, order_number = %request.order_number))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&session_form(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("session has no url".to_owned()))?;

        debug!(session_id = %session.id, "Checkout session created");

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}
