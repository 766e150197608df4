//! Durable persistence of the credential pair.
//!
//! The contract is deliberately narrow: load the last saved record or
//! report it absent, and save the full record atomically. Corrupt or
//! missing data is "no credential", never a crash — losing a refresh
//! token to a parse error would defeat the whole point of persisting it.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::Credential;

/// Error type for persistence failures.
///
/// Save failures are reported, not fatal: the manager keeps serving the
/// in-memory session and the next save writes the full record again.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist credential: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode credential: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable credential persistence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The last saved credential, or `None` when nothing readable is on
    /// disk.
    async fn load(&self) -> Option<Credential>;

    /// Persist the full credential atomically. Idempotent.
    async fn save(&self, credential: &Credential) -> Result<(), StoreError>;
}

/// JSON-file-backed store.
///
/// Writes go to a temporary file in the same directory and are renamed
/// over the target, so a reader never observes a half-written record.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path. The file need not
    /// exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Option<Credential> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(err) => {
                warn!(
                    error = %err,
                    path = %self.path.display(),
                    "credential record unreadable, treating as absent"
                );
                None
            }
        }
    }

    fn write(&self, credential: &Credential) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(credential)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Temp file in the same directory so the rename is atomic.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "credential record saved");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Option<Credential> {
        self.read()
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        self.write(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("token-store.json"))
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let credential = Credential::new("A1".to_string(), "R1".to_string());

        store.save(&credential).await.unwrap();

        assert_eq!(store.load().await, Some(credential));
    }

    #[tokio::test]
    async fn empty_credential_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save(&Credential::default()).await.unwrap();

        assert_eq!(store.load().await, Some(Credential::default()));
    }

    #[tokio::test]
    async fn missing_file_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn corrupt_record_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token-store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileCredentialStore::new(path);

        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let credential = Credential::new("A1".to_string(), "R1".to_string());

        store.save(&credential).await.unwrap();
        store.save(&credential).await.unwrap();

        assert_eq!(store.load().await, Some(credential));
    }

    #[tokio::test]
    async fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save(&Credential::new("A1".to_string(), "R1".to_string())).await.unwrap();
        store.save(&Credential::new("A2".to_string(), "R2".to_string())).await.unwrap();

        assert_eq!(
            store.load().await,
            Some(Credential::new("A2".to_string(), "R2".to_string()))
        );
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/dir/token-store.json"));

        store.save(&Credential::default()).await.unwrap();

        assert!(store.load().await.is_some());
    }
}
