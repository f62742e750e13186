use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response,
};
use crate::{
    auth::StaffUser,
    errors::ApiError,
    services::catalog::{CreateCategoryInput, UpdateCategoryInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Creates the router for category endpoints
pub fn categories_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_categories))
        .route("/", post(create_category))
        .route("/:slug", get(get_category))
        .route("/:slug", put(update_category))
        .route("/:slug", delete(delete_category))
}

/// List active categories
async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let categories = state
        .services
        .categories
        .list(false)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(categories))
}

/// Get a category by slug
async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .get_by_slug(&slug)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

/// Create a category (staff)
async fn create_category(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Json(payload): Json<CreateCategoryInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(category))
}

/// Update a category (staff)
async fn update_category(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateCategoryInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .update(&slug, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

/// Delete an empty category (staff)
async fn delete_category(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .categories
        .delete(&slug)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
