//! Product endpoints. Reads are public, mutations sit behind the auth gate.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::gate::CurrentUser;
use super::validation::{validate_name, validate_price, validate_reference};
use crate::db::{
    Category, CreateProductRequest, MessageResponse, Page, Product, ProductFilter,
    ProductListQuery, UpdateProductRequest,
};
use crate::AppState;

fn validate_create_request(req: &CreateProductRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_price(req.price) {
        errors.add("price", e);
    }
    if let Err(e) = validate_reference(&req.category_id, "category_id") {
        errors.add("category_id", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateProductRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(price) = req.price {
        if let Err(e) = validate_price(price) {
            errors.add("price", e);
        }
    }
    if let Some(ref category_id) = req.category_id {
        if let Err(e) = validate_reference(category_id, "category_id") {
            errors.add("category_id", e);
        }
    }

    errors.finish()
}

async fn ensure_category_exists(state: &AppState, category_id: &str) -> Result<(), ApiError> {
    if Category::exists(&state.db, category_id).await? {
        Ok(())
    } else {
        Err(ApiError::validation_field(
            "category_id",
            "Category does not exist",
        ))
    }
}

/// POST /product
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    validate_create_request(&req)?;
    ensure_category_exists(&state, &req.category_id).await?;

    let product = Product::create(&state.db, &req).await?;
    tracing::info!(product_id = %product.id, user_id = %current.id(), "Product created");

    Ok(Json(product))
}

/// GET /product
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let window = query.list.window(&state.config.pagination)?;
    let filter = ProductFilter {
        name: query.list.name_filter(),
        category_id: query
            .category_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty()),
    };
    let (items, total) = Product::list(&state.db, filter, window).await?;

    Ok(Json(Page::new(items, total, window)))
}

/// GET /product/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = Product::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(product))
}

/// PATCH /product/:id
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    validate_update_request(&req)?;
    if let Some(ref category_id) = req.category_id {
        ensure_category_exists(&state, category_id).await?;
    }

    let product = Product::update(&state.db, &id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    tracing::info!(product_id = %id, user_id = %current.id(), "Product updated");

    Ok(Json(product))
}

/// DELETE /product/:id
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !Product::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Product not found"));
    }
    tracing::info!(product_id = %id, user_id = %current.id(), "Product deleted");

    Ok(Json(MessageResponse::new("Product deleted successfully")))
}
