//! Anti-forgery nonces for admin forms
//!
//! A nonce is bound to an action name and a user, and stays valid for
//! between half and all of the configured lifetime. Time is divided into
//! ticks of half a lifetime; a nonce from the current or previous tick
//! verifies.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the MAC kept in a nonce (10 hex characters)
const NONCE_BYTES: usize = 5;

/// Issues and checks action-scoped nonces
#[derive(Clone)]
pub struct NonceManager {
    mac: HmacSha256,
    lifetime_secs: u64,
}

impl NonceManager {
    /// Create a new nonce manager; lifetimes under two seconds are raised to two
    pub fn new(secret: &str, lifetime_secs: u64) -> Result<Self, AuthError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AuthError::NonceKey(e.to_string()))?;

        Ok(Self {
            mac,
            lifetime_secs: lifetime_secs.max(2),
        })
    }

    /// Create a nonce for `action` on behalf of `user`
    pub fn create(&self, action: &str, user: &str) -> String {
        self.create_at(action, user, now_secs())
    }

    /// Verify a nonce submitted for `action` by `user`
    pub fn verify(&self, action: &str, user: &str, nonce: &str) -> Result<(), AuthError> {
        self.verify_at(action, user, nonce, now_secs())
    }

    fn create_at(&self, action: &str, user: &str, now: u64) -> String {
        let tag = self.keyed(self.tick(now), action, user).finalize().into_bytes();
        hex::encode(&tag[..NONCE_BYTES])
    }

    fn verify_at(&self, action: &str, user: &str, nonce: &str, now: u64) -> Result<(), AuthError> {
        let submitted = match hex::decode(nonce) {
            Ok(bytes) if bytes.len() == NONCE_BYTES => bytes,
            _ => {
                debug!("Malformed nonce for action: {}", action);
                return Err(AuthError::InvalidNonce);
            }
        };

        let tick = self.tick(now);
        for candidate in [tick, tick.saturating_sub(1)] {
            if self
                .keyed(candidate, action, user)
                .verify_truncated_left(&submitted)
                .is_ok()
            {
                return Ok(());
            }
        }

        debug!("Rejected nonce for action: {}", action);
        Err(AuthError::InvalidNonce)
    }

    fn tick(&self, now: u64) -> u64 {
        now.div_ceil(self.lifetime_secs / 2)
    }

    /// MAC over the tick and the length-prefixed action and user
    fn keyed(&self, tick: u64, action: &str, user: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(&tick.to_be_bytes());
        for field in [action, user] {
            mac.update(&(field.len() as u64).to_be_bytes());
            mac.update(field.as_bytes());
        }
        mac
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;

    fn manager(secret: &str, lifetime_secs: u64) -> NonceManager {
        NonceManager::new(secret, lifetime_secs).unwrap()
    }

    #[test]
    fn test_nonce_round_trip() {
        let nonces = manager("secret", DAY);
        let nonce = nonces.create("refresh-data", "admin");

        assert_eq!(nonce.len(), NONCE_BYTES * 2);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(nonces.verify("refresh-data", "admin", &nonce).is_ok());
    }

    #[test]
    fn test_nonce_bound_to_action_user_and_secret() {
        let nonces = manager("secret", DAY);
        let nonce = nonces.create_at("refresh-data", "admin", 1_000_000);

        assert!(nonces.verify_at("delete", "admin", &nonce, 1_000_000).is_err());
        assert!(nonces.verify_at("refresh-data", "eve", &nonce, 1_000_000).is_err());

        let other = manager("other-secret", DAY);
        assert!(other.verify_at("refresh-data", "admin", &nonce, 1_000_000).is_err());
    }

    #[test]
    fn test_action_and_user_boundary_is_unambiguous() {
        let nonces = manager("secret", DAY);
        let now = 1_000_000;

        let joined_in_action = nonces.create_at("refresh-data|admin", "x", now);
        let joined_in_user = nonces.create_at("refresh-data", "admin|x", now);
        assert_ne!(joined_in_action, joined_in_user);

        assert_ne!(
            nonces.create_at("ab", "c", now),
            nonces.create_at("a", "bc", now)
        );
        assert!(nonces.verify_at("refresh-data", "admin|x", &joined_in_action, now).is_err());
    }

    #[test]
    fn test_nonce_valid_for_previous_tick_only() {
        let nonces = manager("secret", DAY);
        let issued = DAY * 100 + 1;
        let nonce = nonces.create_at("refresh-data", "admin", issued);

        // Still inside the issuing tick, then one tick later
        assert!(nonces.verify_at("refresh-data", "admin", &nonce, issued + 100).is_ok());
        assert!(nonces.verify_at("refresh-data", "admin", &nonce, issued + DAY / 2).is_ok());

        // Two ticks later
        assert!(matches!(
            nonces.verify_at("refresh-data", "admin", &nonce, issued + DAY),
            Err(AuthError::InvalidNonce)
        ));
    }

    #[test]
    fn test_empty_and_malformed_nonce() {
        let nonces = manager("secret", DAY);
        let nonce = nonces.create_at("refresh-data", "admin", 1_000_000);

        assert!(nonces.verify("refresh-data", "admin", "").is_err());
        assert!(nonces.verify("refresh-data", "admin", "zzzz").is_err());
        // A prefix of a valid nonce is not accepted
        assert!(nonces.verify_at("refresh-data", "admin", &nonce[..4], 1_000_000).is_err());
    }

    #[test]
    fn test_tiny_lifetime_is_clamped() {
        let nonces = manager("secret", 0);
        let nonce = nonces.create_at("a", "u", 10);
        assert!(nonces.verify_at("a", "u", &nonce, 10).is_ok());
    }
}
