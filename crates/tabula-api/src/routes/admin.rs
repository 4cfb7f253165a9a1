//! Admin pages: login, record table, manual refresh

use axum::{
    Form, Router,
    extract::{FromRef, FromRequestParts, Query, State},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tabula_auth::{AdminUser, clear_session_cookie, session_cookie, verify_password};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::render::{AdminView, render_admin, render_login};
use crate::state::AppState;

/// Nonce action for the refresh form
pub const REFRESH_ACTION: &str = "refresh-data";

const LOGIN_PATH: &str = "/admin/login";

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length
const MAX_PASSWORD_LENGTH: usize = 256;

// ==================== Extractor ====================

/// Extractor for an authenticated admin; browsers without a session are sent to the login page
pub struct RequireAdmin(pub AdminUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        if !app_state.auth_enabled {
            return Ok(RequireAdmin(AdminUser {
                username: "anonymous".to_string(),
            }));
        }

        match AdminUser::from_headers(&parts.headers, &app_state.jwt) {
            Ok(user) => Ok(RequireAdmin(user)),
            Err(e) => {
                debug!("Admin session rejected: {}", e);
                Err(Redirect::to(LOGIN_PATH))
            }
        }
    }
}

// ==================== Pages ====================

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub refreshed: Option<String>,
}

/// GET /admin
async fn admin_page(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Html<String> {
    let record_set = state.fetcher.get().await;
    let nonce = state.nonces.create(REFRESH_ACTION, &user.username);

    Html(render_admin(&AdminView {
        record_set: &record_set,
        endpoint: state.fetcher.endpoint(),
        nonce: &nonce,
        username: &user.username,
        refreshed: query.refreshed.is_some_and(|v| v == "1"),
        show_logout: state.auth_enabled,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshForm {
    #[serde(rename = "_nonce", default)]
    pub nonce: String,
}

/// POST /admin/refresh
async fn refresh(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<RefreshForm>,
) -> Result<Redirect, ApiError> {
    state
        .nonces
        .verify(REFRESH_ACTION, &user.username, &form.nonce)?;

    state.fetcher.invalidate().await?;
    metrics::counter!("tabula_admin_refreshes_total").increment(1);
    info!("Record set invalidated by {}", user.username);

    Ok(Redirect::to("/admin?refreshed=1"))
}

// ==================== Session ====================

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

/// GET /admin/login
async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    Html(render_login(query.error.is_some()))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// POST /admin/login
async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if form.username.len() > MAX_USERNAME_LENGTH || form.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest("Credentials too long".to_string()));
    }

    debug!("Login attempt for user: {}", form.username);

    // Always verify the password so unknown usernames take as long as known ones
    let password_valid = verify_password(&form.password, &state.admin.password_hash)?;
    let username_valid = form.username == state.admin.username;

    if !(password_valid && username_valid) {
        warn!("Failed login for user: {}", form.username);
        return Ok(Redirect::to("/admin/login?error=1").into_response());
    }

    let token = state.jwt.generate_token(&state.admin.username)?;
    let cookie = HeaderValue::from_str(&session_cookie(&token, state.jwt.expiry_secs()))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Admin {} logged in", state.admin.username);

    let mut response = Redirect::to("/admin").into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// POST /admin/logout
async fn logout() -> Result<Response, ApiError> {
    let cookie = HeaderValue::from_str(&clear_session_cookie())
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut response = Redirect::to(LOGIN_PATH).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

/// Create admin routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/admin") }))
        .route("/admin", get(admin_page))
        .route("/admin/refresh", post(refresh))
        .route(LOGIN_PATH, get(login_page).post(login))
        .route("/admin/logout", post(logout))
}

