//! Stripe webhook authentication and event parsing.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=ab12...,v1=...`.
//! The signed payload is `"{t}.{raw body}"`, MAC'd with HMAC-SHA256 under
//! the endpoint's signing secret. Any one matching `v1` entry authenticates
//! the request; `v0` entries are ignored.
//!
//! Only verified payloads are ever parsed into an [`Event`].

use std::collections::HashMap;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use openme_core::OrderId;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook delivery was refused.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("No signature provided")]
    MissingSignature,

    #[error("malformed signature header: {0}")]
    MalformedHeader(&'static str),

    #[error("timestamp outside the tolerance window")]
    TimestampOutsideTolerance,

    #[error("no signatures found matching the expected signature for payload")]
    SignatureMismatch,

    #[error("webhook secret cannot be used as an HMAC key")]
    InvalidSecret,

    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A verified provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
}

/// The notifications the reconciler distinguishes. Everything else is
/// [`EventKind::Unhandled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    CheckoutSessionCompleted(CheckoutSessionData),
    CheckoutSessionExpired(CheckoutSessionData),
    PaymentIntentSucceeded(PaymentIntentData),
    PaymentIntentFailed(PaymentIntentData),
    Unhandled(String),
}

impl EventKind {
    /// Provider event type string.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted(_) => "checkout.session.completed",
            Self::CheckoutSessionExpired(_) => "checkout.session.expired",
            Self::PaymentIntentSucceeded(_) => "payment_intent.succeeded",
            Self::PaymentIntentFailed(_) => "payment_intent.payment_failed",
            Self::Unhandled(name) => name,
        }
    }
}

/// The checkout session object embedded in session events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSessionData {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
}

impl CheckoutSessionData {
    /// The order this session was opened for, from session metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata.get("order_id")?.parse().ok()
    }

    #[must_use]
    pub fn order_number(&self) -> Option<&str> {
        self.metadata.get("order_number").map(String::as_str)
    }
}

/// The payment intent object embedded in intent events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentData {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub last_payment_error: Option<PaymentErrorData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentErrorData {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Checks signatures with one endpoint secret.
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Verify `header` against `payload` and parse the event.
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] if the signature does not verify or the
    /// verified payload is not an event.
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<Event, WebhookError> {
        self.verify(payload, header, chrono::Utc::now().timestamp())?;
        parse_event(payload)
    }

    /// Verify a signature header as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] describing the first check that failed.
    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let parsed = SignatureHeader::parse(header)?;

        let age = now.abs_diff(parsed.timestamp);
        if age > self.tolerance.as_secs() {
            return Err(WebhookError::TimestampOutsideTolerance);
        }

        let mac = signed_payload_mac(self.secret.expose_secret(), payload, parsed.timestamp)?;
        if parsed
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok())
        {
            debug!("Webhook signature verified");
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::MalformedHeader("invalid timestamp"))?,
                    );
                }
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader("no v1 signature"));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

fn signed_payload_mac(
    secret: &str,
    payload: &[u8],
    timestamp: i64,
) -> Result<HmacSha256, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Build a valid `Stripe-Signature` header value for `payload`.
///
/// Used to replay stored events and to drive webhook tests.
///
/// # Errors
///
/// Returns [`WebhookError::InvalidSecret`] if the secret cannot key the MAC.
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
    let signature = signed_payload_mac(secret, payload, timestamp)?
        .finalize()
        .into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(signature)))
}

/// Parse a verified payload into an [`Event`].
///
/// # Errors
///
/// Returns [`WebhookError::InvalidPayload`] if the JSON is not a provider
/// event or a known event type carries an unexpected object.
pub fn parse_event(payload: &[u8]) -> Result<Event, WebhookError> {
    let raw: RawEvent = serde_json::from_slice(payload)?;
    let object = raw.data.object;

    let kind = match raw.event_type.as_str() {
        "checkout.session.completed" => {
            EventKind::CheckoutSessionCompleted(serde_json::from_value(object)?)
        }
        "checkout.session.expired" => {
            EventKind::CheckoutSessionExpired(serde_json::from_value(object)?)
        }
        "payment_intent.succeeded" => {
            EventKind::PaymentIntentSucceeded(serde_json::from_value(object)?)
        }
        "payment_intent.payment_failed" => {
            EventKind::PaymentIntentFailed(serde_json::from_value(object)?)
        }
        _ => EventKind::Unhandled(raw.event_type),
    };

    Ok(Event { id: raw.id, kind })
}
