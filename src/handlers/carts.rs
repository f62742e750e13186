use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{auth::MaybeUser, errors::ApiError, services::carts::AddItemInput, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_cart))
        .route("/:id", get(get_cart))
        .route("/:id", delete(delete_cart))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:product_id", put(update_item))
        .route("/:id/items/:product_id", delete(remove_item))
}

/// Create a new cart, tied to the caller when authenticated
async fn create_cart(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .create_cart(user.map(|u| u.id))
        .await
        .map_err(map_service_error)?;
    Ok(created_response(cart))
}

/// Get cart with lines priced at current catalog values
async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

/// Add a product to the cart
async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddItemInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let cart = state
        .services
        .carts
        .add_item(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateQuantityRequest {
    #[validate(range(min = 0, max = 999))]
    quantity: i32,
}

/// Set a line's quantity; zero removes the line
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let cart = state
        .services
        .carts
        .update_item(id, product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

/// Remove a line from the cart
async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

/// Abandon a cart
async fn delete_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .carts
        .delete_cart(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
