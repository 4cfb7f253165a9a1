//! Application state

use tabula_auth::{JwtManager, NonceManager};
use tabula_core::CachedFetcher;
use std::sync::Arc;

/// Prometheus handle rendered by `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// The single admin account
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    /// argon2 PHC string
    pub password_hash: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<CachedFetcher>,
    pub jwt: Arc<JwtManager>,
    pub nonces: Arc<NonceManager>,
    pub admin: Arc<AdminCredentials>,
    pub auth_enabled: bool,
}

impl AppState {
    pub fn new(
        fetcher: Arc<CachedFetcher>,
        jwt: Arc<JwtManager>,
        nonces: Arc<NonceManager>,
        admin: AdminCredentials,
        auth_enabled: bool,
    ) -> Self {
        Self {
            fetcher,
            jwt,
            nonces,
            admin: Arc::new(admin),
            auth_enabled,
        }
    }
}
