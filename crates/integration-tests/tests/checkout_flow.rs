//! End-to-end purchase: order intake, checkout session, webhook, success page.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use openme_integration_tests::{
    BASE_URL, TestContext, order_body, session_completed, test_config,
};
use serde_json::{Value, json};

fn checkout_body(order: &Value) -> Value {
    json!({
        "items": order["items"],
        "orderId": order["id"],
        "orderNumber": order["order_number"],
        "email": order["email"],
    })
}

#[tokio::test]
async fn test_order_is_paid_only_after_webhook() {
    let ctx = TestContext::new().await;

    // 1. Intake: 2 x 25.00 + 9.99 shipping, pending/pending
    let (status, body) = ctx.post("/api/orders", &order_body("ada@example.com", 2)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = body["order"].clone();
    assert_eq!(order["total"], "59.99");
    let number = order["order_number"].as_str().unwrap().to_owned();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");

    // 2. Checkout session
    let (status, session) = ctx.post("/api/checkout", &checkout_body(&order)).await;
    assert_eq!(status, StatusCode::OK, "{session}");
    assert_eq!(session["sessionId"], "cs_test_1");
    assert!(session["url"].as_str().unwrap().starts_with("https://checkout.stripe.com/"));

    let sent = ctx.gateway.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_number, number);
    assert_eq!(sent[0].line_items[0].unit_amount, 2500);
    assert_eq!(sent[0].line_items[0].quantity, 2);
    assert_eq!(
        sent[0].success_url,
        format!("{BASE_URL}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}&order={number}")
    );

    // 3. Shopper lands on the success page before the webhook arrives
    let (status, body) = ctx.get(&format!("/api/orders/{number}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["payment_status"], "pending");

    // 4. Webhook
    let (status, ack) = ctx.deliver_signed(&session_completed("evt_1", &order)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true }));
    assert_eq!(ctx.hooks.paid_count(), 1);

    // 5. Success page now shows the payment
    let (_, body) = ctx.get(&format!("/api/orders/{number}")).await;
    assert_eq!(body["order"]["status"], "paid");
    assert_eq!(body["order"]["payment_status"], "paid");
    assert_eq!(body["order"]["payment_intent_id"], "pi_test_1");
}

#[tokio::test]
async fn test_checkout_refuses_paid_order() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    ctx.deliver_signed(&session_completed("evt_1", &order)).await;

    let (status, body) = ctx.post("/api/checkout", &checkout_body(&order)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already paid"));
    assert!(ctx.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_checkout_without_items_is_rejected() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let mut body = checkout_body(&order);
    body["items"] = json!([]);

    let (status, body) = ctx.post("/api/checkout", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No items provided");
}

#[tokio::test]
async fn test_checkout_for_unknown_order_is_not_found() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order("ada@example.com").await;
    let mut body = checkout_body(&order);
    body["orderId"] = json!("00000000-0000-4000-8000-000000000000");

    let (status, _) = ctx.post("/api/checkout", &body).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_without_stripe_key_fails_before_network() {
    let mut config = test_config();
    config.stripe.secret_key = None;
    let ctx = TestContext::with_config(config).await;
    let order = ctx.place_order("ada@example.com").await;

    let (status, body) = ctx.post("/api/checkout", &checkout_body(&order)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("STRIPE_SECRET_KEY"));
    assert!(ctx.gateway.requests().is_empty());
}
