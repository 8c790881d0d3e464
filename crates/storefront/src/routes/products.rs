//! Catalog browsing handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::catalog::{Category, ProductListing};
use crate::services::catalog::ProductQuery;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductListing>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub product: ProductListing,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: Category,
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductsResponse>> {
    let products = state.catalog_service().products(query).await?;
    Ok(Json(ProductsResponse { products }))
}

/// `GET /api/products/featured`
#[instrument(skip(state))]
pub async fn featured(State(state): State<AppState>) -> Result<Json<ProductsResponse>> {
    let products = state.catalog_service().featured().await?;
    Ok(Json(ProductsResponse { products }))
}

/// `GET /api/products/{slug}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductResponse>> {
    let product = state
        .catalog_service()
        .product(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;
    Ok(Json(ProductResponse { product }))
}

/// `GET /api/categories`
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<CategoriesResponse>> {
    let categories = state.catalog_service().categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// `GET /api/categories/{slug}`
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryResponse>> {
    let category = state
        .catalog_service()
        .category(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?;
    Ok(Json(CategoryResponse { category }))
}
