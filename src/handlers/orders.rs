use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{CurrentUser, MaybeUser, StaffUser},
    errors::ApiError,
    services::{checkout::CheckoutInput, orders::UpdateOrderStatusInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for checkout and order endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(checkout))
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_order_status))
        .route("/:id", delete(soft_delete_order))
        .route("/:id/restore", post(restore_order))
}

/// Place an order from a cart. Anonymous callers get a guest account
/// created for the shipping email; the response flags it so the client
/// can prompt for account activation.
async fn checkout(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .checkout
        .create_order_from_cart(user.map(|u| u.id), payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(outcome))
}

/// List the caller's orders; staff see every order
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let scope = if user.is_staff { None } else { Some(user.id) };
    let (orders, total) = state
        .services
        .orders
        .list(scope, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        orders,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Get an order with its lines; owner or staff only. Staff can also
/// inspect soft-deleted orders.
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = if user.is_staff {
        state.services.orders.get_any(id).await
    } else {
        state.services.orders.get(id).await
    }
    .map_err(map_service_error)?;

    if !user.is_staff && view.order.user_id != Some(user.id) {
        return Err(ApiError::Forbidden(
            "you do not have access to this order".to_string(),
        ));
    }
    Ok(success_response(view))
}

/// Move an order through its lifecycle (staff)
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// Soft-delete an order (staff)
async fn soft_delete_order(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .orders
        .soft_delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Restore a soft-deleted order (staff)
async fn restore_order(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .restore(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}
