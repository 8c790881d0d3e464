//! Webhook authentication and reconciliation through the HTTP surface.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::Utc;
use openme_integration_tests::{
    TestContext, session_completed, session_expired, sign, sign_at, test_config,
};
use openme_storefront::payments::webhook::sign_payload;
use serde_json::json;

async fn order_state(ctx: &TestContext, number: &str) -> (String, String) {
    let (_, body) = ctx.get(&format!("/api/orders/{number}")).await;
    (
        body["order"]["status"].as_str().unwrap().to_owned(),
        body["order"]["payment_status"].as_str().unwrap().to_owned(),
    )
}

fn number(order: &serde_json::Value) -> &str {
    order["order_number"].as_str().unwrap()
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;

    let (status, body) = ctx
        .deliver_webhook(&session_completed("evt_1", &order), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No signature provided");
    assert_eq!(order_state(&ctx, number(&order)).await.1, "pending");
}

#[tokio::test]
async fn test_forged_signature_changes_nothing() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let payload = session_completed("evt_1", &order);
    let forged = sign_payload("whsec_attacker", payload.as_bytes(), Utc::now().timestamp()).unwrap();

    let (status, body) = ctx.deliver_webhook(&payload, Some(&forged)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook Error:"));
    assert_eq!(order_state(&ctx, number(&order)).await.1, "pending");
    assert_eq!(ctx.hooks.paid_count(), 0);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let header = sign(&session_completed("evt_1", &order));
    let tampered = session_completed("evt_2", &order);

    let (status, _) = ctx.deliver_webhook(&tampered, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let payload = session_completed("evt_1", &order);
    let header = sign_at(&payload, Utc::now().timestamp() - 3600);

    let (status, _) = ctx.deliver_webhook(&payload, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(order_state(&ctx, number(&order)).await.1, "pending");
}

#[tokio::test]
async fn test_missing_webhook_secret_is_a_server_error() {
    let mut config = test_config();
    config.stripe.webhook_secret = None;
    let ctx = TestContext::with_config(config).await;
    let order = ctx.place_order("ada@example.com").await;

    let (status, body) = ctx
        .deliver_signed(&session_completed("evt_1", &order))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Webhook secret not configured");
}

#[tokio::test]
async fn test_duplicate_delivery_runs_side_effects_once() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let payload = session_completed("evt_1", &order);

    let (first, _) = ctx.deliver_signed(&payload).await;
    let (second, ack) = ctx.deliver_signed(&payload).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true }));
    assert_eq!(ctx.hooks.paid_count(), 1);
    assert_eq!(
        order_state(&ctx, number(&order)).await,
        ("paid".to_owned(), "paid".to_owned())
    );
}

#[tokio::test]
async fn test_expired_session_marks_payment_failed() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;

    let (status, _) = ctx.deliver_signed(&session_expired("evt_1", &order)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        order_state(&ctx, number(&order)).await,
        ("pending".to_owned(), "failed".to_owned())
    );
}

#[tokio::test]
async fn test_late_expiry_does_not_undo_payment() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;

    ctx.deliver_signed(&session_completed("evt_1", &order)).await;
    let (status, _) = ctx.deliver_signed(&session_expired("evt_2", &order)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order_state(&ctx, number(&order)).await.1, "paid");
}

#[tokio::test]
async fn test_persistence_failure_asks_for_redelivery() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let payload = session_completed("evt_1", &order);

    ctx.orders.set_unavailable(true);
    let (status, body) = ctx.deliver_signed(&payload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(ctx.hooks.paid_count(), 0);

    ctx.orders.set_unavailable(false);
    let (status, _) = ctx.deliver_signed(&payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order_state(&ctx, number(&order)).await.1, "paid");
    assert_eq!(ctx.hooks.paid_count(), 1);
}

#[tokio::test]
async fn test_unknown_order_is_acknowledged() {
    let ctx = TestContext::new().await;
    let ghost = json!({
        "id": "00000000-0000-4000-8000-000000000000",
        "order_number": "ORD-GHOST",
        "email": "ghost@example.com",
    });

    let (status, _) = ctx.deliver_signed(&session_completed("evt_1", &ghost)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.hooks.paid_count(), 0);
}

#[tokio::test]
async fn test_unhandled_event_type_is_acknowledged() {
    let ctx = TestContext::new().await;
    let payload = json!({
        "id": "evt_1",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } },
    })
    .to_string();

    let (status, ack) = ctx.deliver_signed(&payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["received"], true);
}

#[tokio::test]
async fn test_signed_garbage_is_a_bad_request() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx.deliver_signed("not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
