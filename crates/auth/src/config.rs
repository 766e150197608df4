//! OAuth provider configuration.
//!
//! Loads credentials and endpoints from environment variables, with the
//! provider's production endpoints as defaults. The endpoint bases are
//! overridable so tests can point the client at a local mock server.

use thiserror::Error;

/// Production authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";

/// Production base URL for the token and user-info endpoints.
pub const DEFAULT_API_BASE: &str = "https://open.tiktokapis.com/v2";

const DEFAULT_SCOPES: &str = "user.info.basic,user.info.profile";

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
}

/// OAuth client configuration for the identity provider.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client key issued by the provider console.
    pub client_key: String,

    /// OAuth client secret. This is a confidential-client flow; the
    /// secret never leaves the server process.
    pub client_secret: String,

    /// Scopes to request, comma-joined on the wire.
    pub scopes: Vec<String>,

    /// Redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Authorization endpoint.
    pub authorize_url: String,

    /// Base URL for the token and user-info endpoints.
    pub api_base: String,
}

impl OAuthConfig {
    /// Create a configuration with the production endpoints.
    #[must_use]
    pub fn new(
        client_key: String,
        client_secret: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_key,
            client_secret,
            scopes,
            redirect_uri,
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `TIKTOK_CLIENT_KEY`, `TIKTOK_CLIENT_SECRET`, `REDIRECT_URI`
    /// (all required) and `TIKTOK_SCOPES` (optional, comma-separated,
    /// defaults to the basic profile scopes).
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] when a required variable is unset
    /// or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_key = env_var("TIKTOK_CLIENT_KEY")?;
        let client_secret = env_var("TIKTOK_CLIENT_SECRET")?;
        let redirect_uri = env_var("REDIRECT_URI")?;
        let scopes =
            std::env::var("TIKTOK_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_string());

        Ok(Self::new(client_key, client_secret, redirect_uri, parse_scopes(&scopes)))
    }

    /// Check that every required setting is present.
    ///
    /// Called by the manager before issuing an authorization redirect so a
    /// misconfigured deployment fails fast instead of producing a
    /// malformed redirect.
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] naming the first absent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_key.trim().is_empty() {
            return Err(ConfigError::Missing("client_key"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("client_secret"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(ConfigError::Missing("redirect_uri"));
        }
        Ok(())
    }

    /// Token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token/", self.api_base)
    }

    /// User-info endpoint URL.
    #[must_use]
    pub fn user_info_url(&self) -> String {
        format!("{}/user/info/", self.api_base)
    }

    /// Scopes as the comma-joined wire form.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(",")
    }
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}
