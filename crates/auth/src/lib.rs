//! Service-account OAuth token lifecycle.
//!
//! Authenticates a single service-level account against the identity
//! provider's OAuth2 endpoints, keeps the access token valid with a
//! self-re-arming refresh task, and persists the credential pair durably
//! across restarts. The HTTP surface that routes callbacks to these
//! operations lives outside this crate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   AuthManager    │  Session state machine + refresh scheduling
//! └────────┬─────────┘
//!          │
//!          ├──► ProviderClient        (OAuth wire operations)
//!          └──► FileCredentialStore   (atomic durable record)
//! ```
//!
//! # Usage example
//!
//! ```no_run
//! use trendpro_auth::{AuthManager, FileCredentialStore, OAuthConfig, ProviderClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::from_env()?;
//!     let manager = AuthManager::new(
//!         ProviderClient::new(config),
//!         FileCredentialStore::new("token-store.json"),
//!     );
//!
//!     // Recover a credential from a previous run, if any.
//!     manager.initialize().await;
//!
//!     // Login flow, driven by the HTTP layer:
//!     let redirect_url = manager.start_login().await?;
//!     // ... user authorizes, provider redirects back with code + state ...
//!     let session = manager.complete_login("auth_code", "returned_state").await?;
//!     println!("signed in as {:?}", session.user);
//!
//!     // The refresh timer is now armed; shut it down cleanly on exit.
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Module organization
//!
//! - [`types`]: `Credential`, `Session`, `TokenGrant`, `UserProfile`
//! - [`state`]: state-nonce generation for callback forgery protection
//! - [`config`]: provider configuration and environment loading
//! - [`provider`]: the wire client and its [`provider::ProviderApi`] seam
//! - [`store`]: durable credential persistence
//! - [`manager`]: the lifecycle state machine
//! - [`testing`]: in-memory doubles for the provider and store seams

pub mod config;
pub mod manager;
pub mod provider;
pub mod state;
pub mod store;
pub mod testing;
pub mod types;

pub use config::{ConfigError, OAuthConfig};
pub use manager::{AuthError, AuthManager, FAILURE_BACKOFF, LEAD_TIME, MIN_DELAY};
pub use provider::{ProviderApi, ProviderClient, ProviderError};
pub use store::{CredentialStore, FileCredentialStore, StoreError};
pub use types::{Credential, Session, SessionStatus, TokenGrant, UserProfile};
