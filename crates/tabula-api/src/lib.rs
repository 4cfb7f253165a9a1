//! Tabula HTTP API
//!
//! This crate provides the Axum-based HTTP surface for Tabula: the public
//! record-set endpoint, the embeddable table, and the admin pages.

pub mod error;
pub mod render;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AdminCredentials, AppState, MetricsHandle};
