use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{MaybeUser, StaffUser},
    errors::ApiError,
    services::{
        catalog::{AddImageInput, CreateProductInput, ProductFilters, UpdateProductInput},
        reviews::{AuthorRef, CreateReviewInput, ReviewVisibility},
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/admin", get(list_all_products))
        .route("/:slug", get(get_product))
        .route("/:slug", put(update_product))
        .route("/:slug", delete(soft_delete_product))
        .route("/:slug/restore", post(restore_product))
        .route("/:slug/permanent", delete(hard_delete_product))
        .route("/:slug/images", post(add_product_image))
        .route("/:slug/images/:image_id", delete(remove_product_image))
        .route("/:slug/reviews", get(list_product_reviews))
        .route("/:slug/reviews", post(create_product_review))
}

/// Product detail with images and review aggregates
#[derive(Debug, Serialize)]
struct ProductDetail {
    #[serde(flatten)]
    product: crate::entities::ProductModel,
    images: Vec<crate::entities::ProductImageModel>,
    average_rating: Option<f64>,
    reviews_count: u64,
}

/// List visible products with catalog filters
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<ProductFilters>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .products
        .list(filters, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        products,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Staff listing that includes inactive and soft-deleted products
async fn list_all_products(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .products
        .list_all(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        products,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Get a product by slug with images and rating aggregates
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_by_slug(&slug)
        .await
        .map_err(map_service_error)?;
    let images = state
        .services
        .products
        .images(product.id)
        .await
        .map_err(map_service_error)?;
    let summary = state
        .services
        .products
        .rating_summary(product.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductDetail {
        product,
        images,
        average_rating: summary.average_rating,
        reviews_count: summary.reviews_count,
    }))
}

/// Create a product (staff)
async fn create_product(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .create(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

/// Update a product (staff)
async fn update_product(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .update(&slug, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Soft-delete a product (staff)
async fn soft_delete_product(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .products
        .soft_delete(&slug)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Restore a soft-deleted product (staff)
async fn restore_product(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .restore(&slug)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Permanently delete a product without order history (staff)
async fn hard_delete_product(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .products
        .hard_delete(&slug)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Attach an image to a product (staff)
async fn add_product_image(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path(slug): Path<String>,
    Json(payload): Json<AddImageInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let image = state
        .services
        .products
        .add_image(&slug, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(image))
}

/// Remove a product image (staff)
async fn remove_product_image(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Path((slug, image_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .products
        .remove_image(&slug, image_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// List reviews for a product; callers see their own pending reviews,
/// staff see everything
async fn list_product_reviews(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let visibility = match &user {
        Some(u) if u.is_staff => ReviewVisibility::Staff,
        Some(u) => ReviewVisibility::ForUser(u.id),
        None => ReviewVisibility::Public,
    };

    let (reviews, total) = state
        .services
        .reviews
        .list_for_product(product.id, visibility, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        reviews,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Submit a review, authenticated or anonymous
async fn create_product_review(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateReviewInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .get_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let author = user.map(|u| AuthorRef {
        user_id: u.id,
        display_name: u.name.unwrap_or(u.email),
    });

    let review = state
        .services
        .reviews
        .create_review(product.id, author, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(review))
}
