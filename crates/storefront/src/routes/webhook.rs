//! Stripe webhook handler.
//!
//! The body is taken as raw bytes: the signature covers the exact bytes the
//! provider sent, so it must be verified before any JSON parsing.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::payments::webhook::{SIGNATURE_HEADER, WebhookError};
use crate::state::AppState;

/// Acknowledgement body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

/// `POST /api/webhook`
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let verifier = state
        .webhook_verifier()
        .ok_or(AppError::Configuration("Webhook secret not configured"))?;

    let event = verifier.construct_event(&body, signature).map_err(|e| {
        warn!(error = %e, "Webhook signature verification failed");
        e
    })?;

    let outcome = state.reconciler().handle(&event).await?;
    info!(
        event_id = %event.id,
        event_type = %event.kind.type_name(),
        ?outcome,
        "Webhook processed"
    );

    Ok(Json(WebhookAck { received: true }))
}
