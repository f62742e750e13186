use crate::handlers::common::{
    map_service_error, no_content_response, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    auth::{CurrentUser, StaffUser},
    errors::ApiError,
    services::reviews::{ModerateReviewInput, UpdateReviewInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for review endpoints. Submission and listing live
/// under the product routes; this covers per-review operations and the
/// staff moderation queue.
pub fn reviews_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pending", get(list_pending_reviews))
        .route("/:id", put(update_review))
        .route("/:id", delete(delete_review))
        .route("/:id/moderate", post(moderate_review))
}

/// Staff moderation queue, oldest first
async fn list_pending_reviews(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (reviews, total) = state
        .services
        .reviews
        .list_pending(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        reviews,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Edit a review (author only); the edit re-enters moderation
async fn update_review(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let review = state
        .services
        .reviews
        .update_review(id, user.id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(review))
}

/// Approve or reject a review (staff)
async fn moderate_review(
    State(state): State<Arc<AppState>>,
    StaffUser(moderator): StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerateReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let review = state
        .services
        .reviews
        .moderate(id, moderator.id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(review))
}

/// Soft-delete a review (author or staff)
async fn delete_review(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .reviews
        .soft_delete(id, user.id, user.is_staff)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
