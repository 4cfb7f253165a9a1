//! Tabula Authentication
//!
//! This crate provides admin authentication for Tabula: argon2 password
//! hashes, JWT session tokens and anti-forgery nonces for admin forms.

pub mod error;
pub mod jwt;
pub mod nonce;
pub mod password;
pub mod session;

pub use error::AuthError;
pub use jwt::{Claims, JwtManager};
pub use nonce::NonceManager;
pub use password::{hash_password, verify_password};
pub use session::{
    AdminUser, SESSION_COOKIE, clear_session_cookie, extract_bearer_token, session_cookie,
    session_token,
};
