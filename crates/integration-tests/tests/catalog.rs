//! Product and category browsing.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use openme_integration_tests::TestContext;
use serde_json::Value;

fn slugs(body: &Value) -> Vec<&str> {
    body["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_listing_skips_inactive_products() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.get("/api/products").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(slugs(&body), ["linen-set", "silk-cami"]);
}

#[tokio::test]
async fn test_listing_filters_by_category() {
    let ctx = TestContext::new().await;

    let (_, tops) = ctx.get("/api/products?category=tops").await;
    assert_eq!(slugs(&tops), ["silk-cami"]);

    let (status, none) = ctx.get("/api/products?category=no-such-category").await;
    assert_eq!(status, StatusCode::OK);
    assert!(slugs(&none).is_empty());
}

#[tokio::test]
async fn test_listing_search_and_price_range() {
    let ctx = TestContext::new().await;

    let (_, found) = ctx.get("/api/products?search=LINEN").await;
    assert_eq!(slugs(&found), ["linen-set"]);

    // silk-cami lists at 40.00 but sells at 32.00
    let (_, cheap) = ctx.get("/api/products?max_price=35").await;
    assert_eq!(slugs(&cheap), ["linen-set", "silk-cami"]);

    let (_, mid) = ctx.get("/api/products?min_price=30&max_price=35").await;
    assert_eq!(slugs(&mid), ["silk-cami"]);
}

#[tokio::test]
async fn test_listing_pages() {
    let ctx = TestContext::new().await;

    let (_, page) = ctx.get("/api/products?limit=1&offset=1").await;

    assert_eq!(slugs(&page), ["silk-cami"]);
}

#[tokio::test]
async fn test_featured_only_lists_active_featured() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.get("/api/products/featured").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(slugs(&body), ["linen-set"]);
}

#[tokio::test]
async fn test_product_detail_includes_relations() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.get("/api/products/linen-set").await;

    assert_eq!(status, StatusCode::OK);
    let product = &body["product"];
    assert_eq!(product["id"], "linen-set");
    assert_eq!(product["price"], "25.00");
    assert_eq!(product["category"]["slug"], "sets");
    assert_eq!(product["images"][0]["is_primary"], true);
    let variants: Vec<&str> = product["variants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap())
        .collect();
    assert_eq!(variants, ["linen-set-s", "linen-set-m"]);
}

#[tokio::test]
async fn test_inactive_or_unknown_product_is_not_found() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx.get("/api/products/wool-wrap").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.get("/api/products/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_categories_in_sort_order() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.get("/api/categories").await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Sets", "Tops"]);

    let (status, body) = ctx.get("/api/categories/tops").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"]["id"], "cat-tops");

    let (status, _) = ctx.get("/api/categories/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
