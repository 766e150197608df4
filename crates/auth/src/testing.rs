//! In-memory test doubles for the provider and store seams.
//!
//! `MockProvider` answers the wire operations from queued responses (or
//! sensible defaults) without any network; `MemoryCredentialStore` keeps
//! the durable record in memory and can simulate save failures. Both are
//! cheap clones sharing their internal state, so a test can hand one to
//! the manager and keep a handle for inspection.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::OAuthConfig;
use crate::provider::{ProviderApi, ProviderError};
use crate::store::{CredentialStore, StoreError};
use crate::types::{Credential, TokenGrant, UserProfile};

/// Mock provider that simulates OAuth flows without network calls.
///
/// Each operation pops the next queued response; an empty queue yields a
/// default success so the happy path needs no setup.
#[derive(Clone)]
pub struct MockProvider {
    config: OAuthConfig,
    exchange_responses: Arc<Mutex<VecDeque<Result<TokenGrant, ProviderError>>>>,
    refresh_responses: Arc<Mutex<VecDeque<Result<TokenGrant, ProviderError>>>>,
    user_info_responses: Arc<Mutex<VecDeque<Result<UserProfile, ProviderError>>>>,
    refresh_calls: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a mock with a complete test configuration.
    #[must_use]
    pub fn new() -> Self {
        let mut config = OAuthConfig::new(
            "test_key".to_string(),
            "test_secret".to_string(),
            "https://example.com/auth/callback".to_string(),
            vec!["user.info.basic".to_string()],
        );
        config.authorize_url = "https://provider.test/authorize".to_string();
        config.api_base = "https://provider.test/api".to_string();

        Self {
            config,
            exchange_responses: Arc::new(Mutex::new(VecDeque::new())),
            refresh_responses: Arc::new(Mutex::new(VecDeque::new())),
            user_info_responses: Arc::new(Mutex::new(VecDeque::new())),
            refresh_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mutable access to the configuration, for misconfiguration tests.
    /// Mutate before cloning; the configuration is not shared.
    pub fn config_mut(&mut self) -> &mut OAuthConfig {
        &mut self.config
    }

    /// Queue the next code-exchange response.
    pub fn push_exchange(&self, response: Result<TokenGrant, ProviderError>) {
        self.exchange_responses.lock().unwrap().push_back(response);
    }

    /// Queue the next refresh response.
    pub fn push_refresh(&self, response: Result<TokenGrant, ProviderError>) {
        self.refresh_responses.lock().unwrap().push_back(response);
    }

    /// Queue the next user-info response.
    pub fn push_user_info(&self, response: Result<UserProfile, ProviderError>) {
        self.user_info_responses.lock().unwrap().push_back(response);
    }

    /// Number of refresh calls made so far.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn default_grant(access: &str) -> TokenGrant {
        TokenGrant {
            access_token: access.to_string(),
            refresh_token: Some("mock_refresh".to_string()),
            expires_in: 3600,
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderApi for MockProvider {
    fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_key={}&state={state}",
            self.config.authorize_url, self.config.client_key
        )
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, ProviderError> {
        self.exchange_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_grant("mock_access")))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_grant("refreshed_access")))
    }

    async fn fetch_user_info(&self, _access_token: &str) -> Result<UserProfile, ProviderError> {
        self.user_info_responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(UserProfile {
                open_id: "mock_user".to_string(),
                display_name: "Mock User".to_string(),
                avatar_url: "https://provider.test/avatar.png".to_string(),
            })
        })
    }
}

/// In-memory credential store with controllable save failures.
#[derive(Clone)]
pub struct MemoryCredentialStore {
    record: Arc<Mutex<Option<Credential>>>,
    fail_saves: Arc<AtomicBool>,
    save_count: Arc<AtomicUsize>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            record: Arc::new(Mutex::new(None)),
            fail_saves: Arc::new(AtomicBool::new(false)),
            save_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pre-load a persisted record, as if a previous process had saved it.
    #[must_use]
    pub fn with_record(credential: Credential) -> Self {
        let store = Self::new();
        *store.record.lock().unwrap() = Some(credential);
        store
    }

    /// The currently persisted record, if any.
    #[must_use]
    pub fn persisted(&self) -> Option<Credential> {
        self.record.lock().unwrap().clone()
    }

    /// Make subsequent saves fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Option<Credential> {
        self.record.lock().unwrap().clone()
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("simulated save failure")));
        }
        *self.record.lock().unwrap() = Some(credential.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
