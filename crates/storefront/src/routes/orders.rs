//! Order intake and lookup handlers.
//!
//! Lookups are read-only. The checkout success page polls
//! `GET /api/orders/{order_number}` and never changes order state itself.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use openme_core::{Email, NewOrder, Order, UserId};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Single-order response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
}

/// Order history response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

/// History query: exactly one of `email` or `user_id`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub email: Option<String>,
    pub user_id: Option<String>,
}

/// `POST /api/orders`
#[instrument(skip(state, new))]
pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let order = state.order_service().place_order(new).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse { order })))
}

/// `GET /api/orders/{order_number}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>> {
    let order = state
        .order_service()
        .by_number(&order_number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_number}")))?;
    Ok(Json(OrderResponse { order }))
}

/// `GET /api/orders?email=...` or `GET /api/orders?user_id=...`
#[instrument(skip(state, query))]
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<OrdersResponse>> {
    let service = state.order_service();
    let orders = match (query.user_id, query.email) {
        (Some(user_id), _) if !user_id.trim().is_empty() => {
            service.history_for_user(&UserId::new(user_id.trim())).await?
        }
        (_, Some(email)) => {
            let email = Email::parse(&email)
                .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
            service.history_for_email(&email).await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "email or user_id is required".to_string(),
            ));
        }
    };
    Ok(Json(OrdersResponse { orders }))
}
