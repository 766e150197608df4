//! Session and credential types.
//!
//! Defines the durable credential pair, the in-memory session that wraps
//! it, and the token grant shape returned by the provider's token
//! endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable access/refresh token pair.
///
/// Invariant: both fields are empty, or both hold the result of the most
/// recent successful exchange or refresh. The empty pair doubles as the
/// signed-out record, so the store never needs a delete operation. One
/// degraded exception: a provider grant that carries no refresh token at
/// all leaves an access-only pair, which stays signed in until expiry but
/// cannot be refreshed.
///
/// This is exactly the record persisted by the credential store; the
/// access token expiry is deliberately not part of it (see
/// [`Session::expires_at`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for the provider's resource APIs. Short-lived.
    pub access_token: String,

    /// Longer-lived token used to obtain new access tokens without
    /// re-prompting the user.
    pub refresh_token: String,
}

impl Credential {
    /// Create a populated credential pair.
    #[must_use]
    pub fn new(access_token: String, refresh_token: String) -> Self {
        Self { access_token, refresh_token }
    }

    /// True when no tokens are held (signed out).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

/// Successful result of a code exchange or refresh grant.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The new access token. Always present; a grant without one is a
    /// provider error, not a `TokenGrant`.
    pub access_token: String,

    /// Rotated refresh token, when the provider issued one. Providers may
    /// rotate, echo, or omit this field; callers keep the previous
    /// refresh token on `None`.
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Profile data fetched from the provider's user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider-scoped stable subject identifier.
    pub open_id: String,
    pub display_name: String,
    pub avatar_url: String,
}

/// Observable lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No tokens held.
    SignedOut,
    /// Authorize URL issued, callback nonce pending.
    Authorizing,
    /// Tokens held, refresh scheduled.
    Active,
    /// Refresh request in flight.
    Refreshing,
}

/// In-memory superset of [`Credential`] plus derived display data.
///
/// Owned exclusively by the lifecycle manager; callers only ever receive
/// clones.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credential: Credential,

    /// Absolute access token expiry, when known. `None` after a restart
    /// (expiry is not persisted) — treated as "likely expired".
    pub expires_at: Option<DateTime<Utc>>,

    /// Profile from the last successful user-info fetch. Absent when the
    /// fetch failed or has not happened yet.
    pub user: Option<UserProfile>,
}

impl Session {
    /// True when a credential pair is held.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        !self.credential.is_empty()
    }

    /// Seconds until the recorded expiry, or `None` when expiry is
    /// unknown. May be negative for an already-expired token.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|at| (at - Utc::now()).num_seconds())
    }

    /// Apply a token grant, preserving the previous refresh token when the
    /// provider did not rotate it.
    pub(crate) fn apply_grant(&mut self, grant: &TokenGrant) {
        let refresh_token = grant
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| self.credential.refresh_token.clone());

        self.credential = Credential::new(grant.access_token.clone(), refresh_token);
        self.expires_at = if grant.expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(grant.expires_in))
        } else {
            None
        };
    }

    /// Reset to the signed-out state.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
