//! Token lifecycle manager.
//!
//! Owns the in-memory session, drives the provider client and the
//! credential store, and keeps the access token fresh with a single
//! self-re-arming refresh task.
//!
//! Session states: `SignedOut → Authorizing → Active ⇄ Refreshing`. A
//! transient refresh failure keeps the session `Active` with the old
//! tokens — a stale-but-present access token is still preferable to
//! none, and only the provider can authoritatively reject it. Only an
//! explicit [`AuthManager::sign_out`] clears the credential.
//!
//! Concurrency model: `complete_login`, `refresh_now`, and `sign_out`
//! serialize on one operation mutex; reads clone a snapshot from an
//! `RwLock` and never block on in-flight writers. At most one scheduled
//! refresh exists at any time — arming a new timer aborts the previous
//! one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::provider::{ProviderApi, ProviderError};
use crate::state;
use crate::store::CredentialStore;
use crate::types::{Credential, Session, SessionStatus, UserProfile};

/// Proactive refresh happens this long before the recorded expiry.
pub const LEAD_TIME: Duration = Duration::from_secs(600);

/// Floor for the computed delay, so a very short-lived token cannot
/// busy-loop the timer.
pub const MIN_DELAY: Duration = Duration::from_secs(300);

/// Fixed retry interval after a failed refresh. Deliberately longer than
/// the lead-time formula would produce, to avoid hammering the provider
/// while a transient condition clears.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(3600);

/// Error type for manager operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Required configuration is missing; the operation fails fast
    /// instead of issuing a malformed redirect.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Callback state nonce missing or not the one issued by
    /// `start_login`. A rejected login, never a warning.
    #[error("authorization callback state mismatch")]
    StateMismatch,

    /// Code exchange rejected by the provider; the session is unchanged.
    #[error("code exchange failed: {0}")]
    ExchangeFailed(#[source] ProviderError),

    /// Refresh rejected by the provider; the previous tokens stay live.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] ProviderError),

    /// Refresh requested with no credential on file.
    #[error("no refresh token available")]
    NoRefreshToken,
}

struct Inner<P, S> {
    provider: P,
    store: S,
    session: RwLock<Session>,
    pending_state: RwLock<Option<String>>,
    refreshing: AtomicBool,
    /// Serializes the mutating operations (login, refresh, sign-out).
    op_lock: Mutex<()>,
    /// The single outstanding scheduled refresh, if any.
    refresh_task: StdMutex<Option<JoinHandle<()>>>,
}

/// The lifecycle manager. Cheap to clone; all clones share one session.
///
/// A pending refresh task holds a clone of the manager, so the manager
/// outlives its timers; call [`AuthManager::shutdown`] (or
/// [`AuthManager::sign_out`]) to cancel the pending timer and release
/// that reference.
pub struct AuthManager<P, S> {
    inner: Arc<Inner<P, S>>,
}

impl<P, S> Clone for AuthManager<P, S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<P, S> AuthManager<P, S>
where
    P: ProviderApi + 'static,
    S: CredentialStore + 'static,
{
    /// Create a manager with an empty session.
    #[must_use]
    pub fn new(provider: P, store: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                session: RwLock::new(Session::default()),
                pending_state: RwLock::new(None),
                refreshing: AtomicBool::new(false),
                op_lock: Mutex::new(()),
                refresh_task: StdMutex::new(None),
            }),
        }
    }

    /// Load the persisted credential, if any. Call once on startup.
    ///
    /// Expiry is not persisted, so a recovered credential is treated as
    /// likely expired and refreshed immediately rather than trusting a
    /// stale schedule.
    ///
    /// # Returns
    /// `true` when a credential was recovered.
    pub async fn initialize(&self) -> bool {
        match self.inner.store.load().await {
            Some(credential) if !credential.is_empty() => {
                {
                    let mut session = self.inner.session.write().await;
                    session.credential = credential;
                    session.expires_at = None;
                }
                info!("recovered persisted credential, scheduling immediate refresh");
                self.arm_refresh(Duration::ZERO);
                true
            }
            _ => {
                debug!("no persisted credential found");
                false
            }
        }
    }

    /// Begin a login flow: generate a fresh state nonce, remember it for
    /// the callback, and return the authorization URL to redirect to.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] when `client_key`, `client_secret`,
    /// or `redirect_uri` is missing.
    pub async fn start_login(&self) -> Result<String, AuthError> {
        self.inner.provider.config().validate()?;

        let nonce = state::generate_state();
        let url = self.inner.provider.authorize_url(&nonce);
        *self.inner.pending_state.write().await = Some(nonce);

        info!("issued authorization redirect");
        Ok(url)
    }

    /// Complete a login from the provider callback.
    ///
    /// Validates the returned state against the nonce from
    /// [`AuthManager::start_login`], exchanges the code, fetches the
    /// profile (non-fatal on failure), persists the credential, and arms
    /// the refresh timer.
    ///
    /// # Errors
    /// - [`AuthError::StateMismatch`] when no login is pending or the
    ///   returned state differs from the issued nonce; the session is
    ///   left untouched.
    /// - [`AuthError::ExchangeFailed`] when the provider rejects the
    ///   code; the session is left untouched.
    pub async fn complete_login(
        &self,
        code: &str,
        returned_state: &str,
    ) -> Result<Session, AuthError> {
        let _guard = self.inner.op_lock.lock().await;

        let Some(expected) = self.inner.pending_state.write().await.take() else {
            warn!("authorization callback with no pending login");
            return Err(AuthError::StateMismatch);
        };
        if !state::validate_state(&expected, returned_state) {
            warn!("authorization callback state mismatch, rejecting login");
            return Err(AuthError::StateMismatch);
        }

        let grant =
            self.inner.provider.exchange_code(code).await.map_err(AuthError::ExchangeFailed)?;

        // A profile fetch failure does not fail the login; the tokens are
        // what matter.
        let user = match self.inner.provider.fetch_user_info(&grant.access_token).await {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(error = %err, "user info fetch failed, continuing without profile");
                None
            }
        };

        let snapshot = {
            let mut session = self.inner.session.write().await;
            session.apply_grant(&grant);
            session.user = user;
            session.clone()
        };

        if snapshot.credential.refresh_token.is_empty() {
            // Access-only session: usable until the token expires, but
            // every refresh will fail with NoRefreshToken.
            warn!("provider issued no refresh token, session cannot be refreshed");
        }

        self.persist(&snapshot.credential).await;
        self.arm_refresh(next_delay(&snapshot));

        info!("login completed");
        Ok(snapshot)
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// Invoked by the timer and available as a manual trigger. On success
    /// the session and store are updated and the timer re-armed from the
    /// new expiry. On provider failure the previous tokens stay live and
    /// the timer re-arms at [`FAILURE_BACKOFF`].
    ///
    /// # Errors
    /// - [`AuthError::NoRefreshToken`] when no credential is on file.
    /// - [`AuthError::RefreshFailed`] when the provider rejects the
    ///   refresh; the session is unchanged.
    pub async fn refresh_now(&self) -> Result<(), AuthError> {
        let guard = self.inner.op_lock.lock().await;
        self.refresh_with_guard(guard).await
    }

    /// Sign out: clear the session, persist the empty credential, and
    /// cancel the pending refresh timer.
    pub async fn sign_out(&self) {
        let _guard = self.inner.op_lock.lock().await;

        self.inner.session.write().await.clear();
        *self.inner.pending_state.write().await = None;
        self.persist(&Credential::default()).await;
        self.cancel_refresh();

        info!("signed out");
    }

    /// Profile from the current session. Pure read, never triggers I/O.
    pub async fn current_user(&self) -> Option<UserProfile> {
        self.inner.session.read().await.user.clone()
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.inner.session.read().await.clone()
    }

    /// Observable lifecycle state.
    pub async fn status(&self) -> SessionStatus {
        if self.inner.refreshing.load(Ordering::SeqCst) {
            return SessionStatus::Refreshing;
        }
        if self.inner.session.read().await.is_signed_in() {
            return SessionStatus::Active;
        }
        if self.inner.pending_state.read().await.is_some() {
            return SessionStatus::Authorizing;
        }
        SessionStatus::SignedOut
    }

    /// Cancel the pending refresh timer. Call on process shutdown so no
    /// dangling task keeps the manager alive.
    pub fn shutdown(&self) {
        self.cancel_refresh();
        debug!("refresh timer cancelled");
    }

    async fn refresh_with_guard(
        &self,
        _guard: MutexGuard<'_, ()>,
    ) -> Result<(), AuthError> {
        let refresh_token = {
            let session = self.inner.session.read().await;
            if session.credential.refresh_token.is_empty() {
                return Err(AuthError::NoRefreshToken);
            }
            session.credential.refresh_token.clone()
        };

        self.inner.refreshing.store(true, Ordering::SeqCst);
        let result = self.inner.provider.refresh(&refresh_token).await;
        self.inner.refreshing.store(false, Ordering::SeqCst);

        match result {
            Ok(grant) => {
                let snapshot = {
                    let mut session = self.inner.session.write().await;
                    session.apply_grant(&grant);
                    session.clone()
                };
                self.persist(&snapshot.credential).await;

                let delay = next_delay(&snapshot);
                self.arm_refresh(delay);
                info!(delay_secs = delay.as_secs(), "access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(
                    error = %err,
                    backoff_secs = FAILURE_BACKOFF.as_secs(),
                    "refresh failed, keeping previous tokens"
                );
                self.arm_refresh(FAILURE_BACKOFF);
                Err(AuthError::RefreshFailed(err))
            }
        }
    }

    /// Entry point for the timer task. A tick that fired while a login or
    /// manual refresh was in flight waits its turn on the operation
    /// mutex, then re-checks whether the refresh is still due before
    /// spending a provider call.
    async fn scheduled_tick(&self) {
        let guard = self.inner.op_lock.lock().await;

        if !self.refresh_due().await {
            let delay = next_delay(&*self.inner.session.read().await);
            drop(guard);
            debug!(delay_secs = delay.as_secs(), "refresh no longer due, timer re-armed");
            self.arm_refresh(delay);
            return;
        }

        if let Err(err) = self.refresh_with_guard(guard).await {
            debug!(error = %err, "scheduled refresh did not complete");
        }
    }

    /// Whether the access token is inside the lead window (or its expiry
    /// is unknown, which counts as likely expired).
    async fn refresh_due(&self) -> bool {
        let session = self.inner.session.read().await;
        if !session.is_signed_in() {
            return false;
        }
        session
            .seconds_until_expiry()
            .map_or(true, |secs| secs <= LEAD_TIME.as_secs() as i64)
    }

    async fn persist(&self, credential: &Credential) {
        if let Err(err) = self.inner.store.save(credential).await {
            // The in-memory session stays usable; the next save writes
            // the full record again.
            warn!(error = %err, "failed to persist credential, keeping in-memory session");
        }
    }

    /// Arm the refresh timer, aborting any previously pending one.
    ///
    /// Re-arming from inside a firing timer replaces (and aborts) that
    /// task's own handle; this is safe because the refresh paths contain
    /// no await points after arming.
    fn arm_refresh(&self, delay: Duration) {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            debug!("refresh timer fired");
            manager.scheduled_tick().await;
        });

        let previous = self.with_task_slot(|slot| slot.replace(task));
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_refresh(&self) {
        if let Some(task) = self.with_task_slot(Option::take) {
            task.abort();
        }
    }

    fn with_task_slot<R>(&self, f: impl FnOnce(&mut Option<JoinHandle<()>>) -> R) -> R {
        let mut slot =
            self.inner.refresh_task.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut slot)
    }
}

/// Refresh-scheduling policy: `max(MIN_DELAY, time_to_expiry - LEAD_TIME)`,
/// or an immediate refresh when the expiry is unknown.
fn next_delay(session: &Session) -> Duration {
    match session.seconds_until_expiry() {
        Some(secs) => {
            let until_refresh = secs.saturating_sub(LEAD_TIME.as_secs() as i64).max(0);
            Duration::from_secs(until_refresh as u64).max(MIN_DELAY)
        }
        None => Duration::ZERO,
    }
}
