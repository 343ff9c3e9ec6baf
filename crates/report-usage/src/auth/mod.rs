//! Bearer token acquisition.
//!
//! The activity log only needs one thing from the identity platform: a
//! short-lived bearer token. [`CredentialProvider`] is the seam between the
//! pipeline and whatever produces that token; [`ClientCredentialsProvider`]
//! is the production implementation using the OAuth2 client-credentials
//! grant.

mod client;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

pub use client::{ClientCredentialsProvider, POWERBI_SCOPE};

use crate::error::AuthError;

/// Short-lived bearer credential. Never persisted, never logged.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: SecretString::from(token.into()),
            expires_at,
        }
    }

    /// Raw token value, for the `Authorization` header only.
    #[must_use]
    pub fn bearer(&self) -> &str {
        self.secret.expose_secret()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the token is expired or will expire within `grace`.
    #[must_use]
    pub fn is_expired(&self, grace: Duration) -> bool {
        Utc::now() + grace >= self.expires_at
    }
}

/// Source of bearer tokens for the activity log API.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Exchange the configured credentials for a fresh token.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the exchange fails or the response has no
    /// access token.
    async fn acquire_token(&self) -> Result<AccessToken, AuthError>;
}
