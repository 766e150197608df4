//! HTTP client for the identity provider's OAuth endpoints.
//!
//! Stateless wire operations: authorize-URL construction, authorization
//! code exchange, token refresh, and the user-info fetch. Every call maps
//! to exactly one HTTP request — retries and backoff are the lifecycle
//! manager's concern, so failures stay observable and distinguishable.
//!
//! Response bodies are treated as untrusted text: read first, then parsed
//! as JSON against one explicit schema. Any shape deviation surfaces the
//! raw body inside the error for diagnosability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::OAuthConfig;
use crate::types::{TokenGrant, UserProfile};

/// Bounded timeout applied to every provider call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Maximum response-body length carried inside an error.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 86_400;

/// Error type for provider wire operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the documented JSON shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Request exceeded the bounded timeout.
    #[error("provider request timed out")]
    Timeout,

    /// Connection-level failure before a response was read.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Wire-level operations against the identity provider.
///
/// Abstracted behind a trait so the lifecycle manager can be driven by a
/// mock in tests and so alternative providers stay pluggable.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// The configuration this client was built with.
    fn config(&self) -> &OAuthConfig;

    /// Build the authorization redirect URL carrying `state`.
    ///
    /// The caller is responsible for remembering `state` and validating
    /// it on callback.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a token grant.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Obtain a fresh token grant from a refresh token.
    ///
    /// The response may omit a rotated refresh token; callers keep the
    /// previous one in that case.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    /// Fetch the profile for the account behind `access_token`.
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, ProviderError>;
}

/// Token endpoint response (both grant types share the shape).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// User-info endpoint envelope: `{"data": {"user": {...}}}`.
///
/// This is the one documented shape; anything else is
/// [`ProviderError::Malformed`]. Historical callers guessed between
/// `data.user`, `user`, and top-level fields — that guessing is exactly
/// what this parser replaces.
#[derive(Debug, Deserialize)]
struct UserInfoEnvelope {
    data: UserInfoData,
}

#[derive(Debug, Deserialize)]
struct UserInfoData {
    user: UserProfile,
}

/// Reqwest-backed [`ProviderApi`] implementation.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    config: OAuthConfig,
    client: Client,
}

impl ProviderClient {
    /// Create a client with the bounded request timeout applied.
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client }
    }

    /// Shared handling for both token grants: read the body as text, then
    /// parse. A 2xx response without an access token is malformed, not a
    /// success.
    async fn parse_token_response(
        response: reqwest::Response,
    ) -> Result<TokenGrant, ProviderError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|_| ProviderError::Malformed(truncate_body(&body)))?;

        let access_token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ProviderError::Malformed(truncate_body(&body)))?;

        Ok(TokenGrant {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        })
    }
}

#[async_trait]
impl ProviderApi for ProviderClient {
    fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn authorize_url(&self, state: &str) -> String {
        let scope = self.config.scope_string();
        let params = [
            ("client_key", self.config.client_key.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("state", state),
        ];

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.authorize_url, query)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        debug!("exchanging authorization code");

        let form = [
            ("client_key", self.config.client_key.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self.client.post(self.config.token_url()).form(&form).send().await?;

        Self::parse_token_response(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        debug!("refreshing access token");

        // No redirect_uri on the refresh grant.
        let form = [
            ("client_key", self.config.client_key.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self.client.post(self.config.token_url()).form(&form).send().await?;

        Self::parse_token_response(response).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
        debug!("fetching user info");

        let url = format!(
            "{}?fields=open_id,display_name,avatar_url",
            self.config.user_info_url()
        );
        let response = self.client.get(url).bearer_auth(access_token).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: UserInfoEnvelope = serde_json::from_str(&body)
            .map_err(|_| ProviderError::Malformed(truncate_body(&body)))?;

        Ok(parsed.data.user)
    }
}

/// Truncate a response body so errors stay loggable.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }

    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}
