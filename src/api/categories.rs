//! Category endpoints. Reads are public, mutations sit behind the auth gate.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::gate::CurrentUser;
use super::validation::{validate_image, validate_name};
use crate::db::{
    Category, CategoryWithProducts, CreateCategoryRequest, ListQuery, MessageResponse, Page,
    Product, UpdateCategoryRequest,
};
use crate::AppState;

fn validate_create_request(req: &CreateCategoryRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_image(&req.image) {
        errors.add("image", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateCategoryRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Err(e) = validate_image(&req.image) {
        errors.add("image", e);
    }

    errors.finish()
}

/// POST /category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    validate_create_request(&req)?;

    let category = Category::create(&state.db, &req).await?;
    tracing::info!(category_id = %category.id, user_id = %current.id(), "Category created");

    Ok(Json(category))
}

/// GET /category
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Category>>, ApiError> {
    let window = query.window(&state.config.pagination)?;
    let (items, total) = Category::list(&state.db, query.name_filter(), window).await?;

    Ok(Json(Page::new(items, total, window)))
}

/// GET /category/:id - the category with its products
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CategoryWithProducts>, ApiError> {
    let category = Category::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    let products = Product::list_by_category(&state.db, &id).await?;

    Ok(Json(CategoryWithProducts { category, products }))
}

/// PATCH /category/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    validate_update_request(&req)?;

    let category = Category::update(&state.db, &id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    tracing::info!(category_id = %id, user_id = %current.id(), "Category updated");

    Ok(Json(category))
}

/// DELETE /category/:id
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !Category::exists(&state.db, &id).await? {
        return Err(ApiError::not_found("Category not found"));
    }

    let products = Category::product_count(&state.db, &id).await?;
    if products > 0 {
        return Err(ApiError::conflict(format!(
            "Category still has {} product(s), delete or move them first",
            products
        )));
    }

    // A product inserted since the count check still trips the foreign key (400)
    if !Category::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Category not found"));
    }
    tracing::info!(category_id = %id, user_id = %current.id(), "Category deleted");

    Ok(Json(MessageResponse::new("Category deleted successfully")))
}
