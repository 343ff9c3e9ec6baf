//! OAuth2 client-credentials grant against the Microsoft identity platform.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{AccessToken, CredentialProvider};
use crate::config::ClientCredentials;
use crate::error::AuthError;

/// Scope granting access to the Power BI REST API.
pub const POWERBI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

/// Lifetime assumed when the response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Successful token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Acquires tokens for a service principal.
#[derive(Debug, Clone)]
pub struct ClientCredentialsProvider {
    client: Client,
    credentials: ClientCredentials,
    token_url: String,
    scope: String,
}

impl ClientCredentialsProvider {
    /// Create a provider for `credentials` against `authority_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        credentials: ClientCredentials,
        authority_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(concat!("report-usage/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(AuthError::Transport)?;

        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_url.trim_end_matches('/'),
            credentials.tenant_id
        );

        Ok(Self {
            client,
            credentials,
            token_url,
            scope: POWERBI_SCOPE.to_string(),
        })
    }

    /// Override the requested scope (sovereign clouds use their own).
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    fn describe_rejection(body: &str) -> String {
        match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(err) => match err.error_description {
                Some(description) => {
                    // The description often spans several lines with trace ids.
                    let first = description.lines().next().unwrap_or_default();
                    format!("{}: {first}", err.error)
                }
                None => err.error,
            },
            Err(_) if body.is_empty() => "empty response body".to_string(),
            Err(_) => body.chars().take(200).collect(),
        }
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialsProvider {
    #[instrument(skip(self), fields(tenant_id = %self.credentials.tenant_id))]
    async fn acquire_token(&self) -> Result<AccessToken, AuthError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret(),
            ),
            ("scope", self.scope.as_str()),
        ];

        debug!(url = %self.token_url, "Requesting access token");

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(AuthError::Transport)?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: Self::describe_rejection(&body),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = chrono::Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!("expires_in out of range: {expires_in}"))
            })?;

        debug!(
            expires_at = %expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
            "Acquired access token"
        );

        Ok(AccessToken::new(access_token, expires_at))
    }
}
