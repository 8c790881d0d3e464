//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the response is written; every error body is
//! JSON of the form `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use openme_core::{CartError, ValidationError};

use crate::db::RepositoryError;
use crate::payments::webhook::WebhookError;
use crate::services::{CheckoutError, OrderError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order intake failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Checkout session creation failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Webhook delivery could not be authenticated or parsed.
    #[error("Webhook Error: {0}")]
    Webhook(#[from] WebhookError),

    /// A required secret or setting is missing.
    #[error("{0}")]
    Configuration(&'static str),

    /// The cart cannot proceed to checkout.
    #[error("Cart is not ready for checkout")]
    CartNotReady(Vec<CartError>),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Order(err) => match err {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyItems | CheckoutError::Price(_) => StatusCode::BAD_REQUEST,
                CheckoutError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::AlreadyPaid(_) => StatusCode::CONFLICT,
                CheckoutError::Provider(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::NotConfigured | CheckoutError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Webhook(err) => match err {
                WebhookError::InvalidSecret => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::CartNotReady(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_)
            | Self::Order(OrderError::Persistence(_))
            | Self::Checkout(CheckoutError::Repository(_)) => "Internal server error".to_string(),
            Self::Order(OrderError::Validation(err)) => validation_message(err),
            Self::Webhook(WebhookError::MissingSignature) => {
                WebhookError::MissingSignature.to_string()
            }
            _ => self.to_string(),
        }
    }
}

fn validation_message(err: &ValidationError) -> String {
    format!("Invalid order: {err}")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut body = json!({ "error": self.public_message() });
        if let Self::CartNotReady(problems) = &self {
            body["problems"] = json!(problems);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
