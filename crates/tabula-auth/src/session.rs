//! Admin session extraction
//!
//! The session token travels in the `tabula_session` cookie for browsers,
//! or as a bearer token for scripted clients.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::{Claims, JwtManager};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "tabula_session";

/// Authenticated admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub username: String,
}

impl AdminUser {
    /// Create from JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            username: claims.sub.clone(),
        }
    }

    /// Authenticate a request from its headers
    pub fn from_headers(headers: &HeaderMap, jwt: &JwtManager) -> Result<Self, AuthError> {
        let token = session_token(headers)?.ok_or(AuthError::MissingSession)?;
        let claims = jwt.validate_token(&token)?;
        let user = Self::from_claims(&claims);

        debug!("Authenticated admin: {}", user.username);
        Ok(user)
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Find the session token, preferring the cookie over the Authorization header
pub fn session_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());

    if from_cookie.is_some() {
        return Ok(from_cookie);
    }

    match headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        Some(header) => extract_bearer_token(header).map(|t| Some(t.to_string())),
        None => Ok(None),
    }
}

/// `Set-Cookie` value carrying a new session
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that removes the session
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc").unwrap(), "abc");
        assert!(extract_bearer_token("Basic abc").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
    }

    #[test]
    fn test_session_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; tabula_session=tok123; lang=en"),
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer other"));

        assert_eq!(session_token(&headers).unwrap().as_deref(), Some("tok123"));
    }

    #[test]
    fn test_session_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok456"));
        assert_eq!(session_token(&headers).unwrap().as_deref(), Some("tok456"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token tok456"));
        assert!(matches!(
            session_token(&headers),
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[test]
    fn test_admin_from_headers() {
        let jwt = JwtManager::new("secret", 1);
        let token = jwt.generate_token("admin").unwrap();

        let mut headers = HeaderMap::new();
        assert!(matches!(
            AdminUser::from_headers(&headers, &jwt),
            Err(AuthError::MissingSession)
        ));

        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).unwrap(),
        );
        let user = AdminUser::from_headers(&headers, &jwt).unwrap();
        assert_eq!(user.username, "admin");
    }

    #[test]
    fn test_cookie_values() {
        let set = session_cookie("abc", 3600);
        assert!(set.starts_with("tabula_session=abc;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.ends_with("Max-Age=3600"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
