//! Caller bearer credential used for every gateway request.
//!
//! Obtaining the token is the host's job; this module only holds it and
//! answers whether it is still usable.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, PoisonError, RwLock};

/// Environment variable the CLI host reads the bearer token from.
pub const TOKEN_ENV: &str = "TELEVISIT_TOKEN";

#[derive(Debug, Clone)]
pub struct BearerCredential {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl BearerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.expose_secret().trim().is_empty() {
            return false;
        }
        self.expires_at.map_or(true, |expiry| now < expiry)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

/// Shared slot for the current caller credential.
///
/// The host may replace or clear it at any time (sign-out, refresh); the
/// orchestrator reads it right before each gateway call.
#[derive(Clone, Default)]
pub struct AuthHandle {
    inner: Arc<RwLock<Option<BearerCredential>>>,
}

impl AuthHandle {
    pub fn new(credential: Option<BearerCredential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credential)),
        }
    }

    pub fn set(&self, credential: BearerCredential) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The credential, if present and unexpired.
    pub fn current(&self) -> Option<BearerCredential> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|credential| credential.is_valid())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_bearer_validity() {
        let now = Utc::now();
        assert!(BearerCredential::new("abc").is_valid_at(now));
        assert!(!BearerCredential::new("   ").is_valid_at(now));

        let expired = BearerCredential::new("abc").with_expiry(now - Duration::seconds(1));
        assert!(!expired.is_valid_at(now));

        let fresh = BearerCredential::new("abc").with_expiry(now + Duration::minutes(5));
        assert!(fresh.is_valid_at(now));
    }

    #[test]
    fn test_bearer_debug_is_redacted() {
        let credential = BearerCredential::new("super-secret-token");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super-secret-token"));
        assert_eq!(credential.header_value(), "Bearer super-secret-token");
    }

    #[test]
    fn test_auth_handle_lifecycle() {
        let handle = AuthHandle::default();
        assert!(handle.current().is_none());

        handle.set(BearerCredential::new("tok"));
        assert!(handle.current().is_some());

        handle.set(BearerCredential::new("tok").with_expiry(Utc::now() - Duration::seconds(5)));
        assert!(handle.current().is_none());

        handle.set(BearerCredential::new("tok"));
        handle.clear();
        assert!(handle.current().is_none());
    }
}
