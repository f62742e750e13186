use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::StaffUser, errors::ApiError, services::stats::DateRange, AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use std::sync::Arc;

/// Creates the router for staff statistics endpoints
pub fn stats_routes() -> Router<Arc<AppState>> {
    Router::new().route("/overview", get(overview))
}

/// Sales overview for an optional date window (staff)
async fn overview(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    Query(range): Query<DateRange>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let stats = state
        .services
        .stats
        .overview(range)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(stats))
}
