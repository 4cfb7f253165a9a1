//! API routes

pub mod admin;
mod block;
mod data;
mod health;
pub mod metrics;

use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use rust_embed::Embed;
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Embedded stylesheets
#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/../../static"]
struct Assets;

/// GET /static/{*path}
async fn serve_embedded_file(Path(path): Path<String>) -> Response {
    match <Assets as Embed>::get(&path) {
        Some(content) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(data::routes())
        .merge(block::routes())
        .merge(admin::routes())
        .route("/static/{*path}", get(serve_embedded_file))
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
