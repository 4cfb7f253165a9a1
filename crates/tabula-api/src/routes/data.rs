//! Public record-set endpoint

use axum::{Json, Router, extract::State, routing::get};
use tabula_core::CachedRecordSet;
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/v1/data
async fn get_data(State(state): State<AppState>) -> Result<Json<CachedRecordSet>, ApiError> {
    metrics::counter!("tabula_data_requests_total").increment(1);

    let record_set = state.fetcher.get().await;
    if record_set.is_empty() {
        debug!("No record set to serve");
        return Err(ApiError::NotFound("No data available".to_string()));
    }

    Ok(Json(record_set))
}

/// Create public data routes; open to any origin
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/data", get(get_data))
        .layer(CorsLayer::permissive())
}
