//! Credential holder shared by the gateway and the session layer.
//!
//! The vault owns the single in-memory credential slot plus its durable mirror.
//! Every mutation goes through one mutex so the compare-and-clear in [`CredentialVault::revoke`]
//! is atomic with respect to concurrent installs and clears.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};
use verifier_types::Credential;
use verifier_utils::{atomic_write, remove_if_exists};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable storage for at most one credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, StoreError>;
    fn save(&self, credential: &Credential) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

/// Stores the raw token in a single owner-only file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Credential::new(contents).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        atomic_write(&self.path, credential.expose_secret().as_bytes())
            .map_err(|e| self.io_error(e))
    }

    fn remove(&self) -> Result<(), StoreError> {
        remove_if_exists(&self.path)
            .map(|_| ())
            .map_err(|e| self.io_error(e))
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    /// What a restart would see.
    #[must_use]
    pub fn peek(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.peek())
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// The one credential the client presents, mirrored to durable storage.
///
/// Simulated credentials live in memory only.
pub struct CredentialVault {
    current: Mutex<Option<Credential>>,
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("current", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl CredentialVault {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            current: Mutex::new(None),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credential>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the persisted credential into memory, if there is one.
    ///
    /// Unreadable storage is treated as empty.
    pub fn restore(&self) -> Option<Credential> {
        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to read persisted credential: {e}");
                None
            }
        };
        let loaded = match loaded {
            Some(credential) if credential.is_simulated() => {
                debug!("Discarding persisted simulated credential");
                if let Err(e) = self.store.remove() {
                    warn!("Failed to discard persisted credential: {e}");
                }
                None
            }
            other => other,
        };
        let mut current = self.lock();
        current.clone_from(&loaded);
        loaded
    }

    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.lock().is_some()
    }

    /// Make `credential` the presented credential and persist it.
    ///
    /// A persistence failure is logged; the in-memory session still proceeds.
    pub fn install(&self, credential: Credential) {
        let mut current = self.lock();
        if !credential.is_simulated()
            && let Err(e) = self.store.save(&credential)
        {
            warn!("Failed to persist credential: {e}");
        }
        *current = Some(credential);
    }

    /// Drop the credential from memory and storage. Returns whether one was held.
    pub fn clear(&self) -> bool {
        let mut current = self.lock();
        let held = current.take().is_some();
        self.remove_persisted();
        held
    }

    /// Clear only if `presented` is still the current credential.
    ///
    /// Returns `true` for exactly one caller per installed credential, no matter how many
    /// requests carrying it are rejected.
    pub fn revoke(&self, presented: &Credential) -> bool {
        let mut current = self.lock();
        if current.as_ref() != Some(presented) {
            return false;
        }
        *current = None;
        self.remove_persisted();
        true
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.store.remove() {
            warn!("Failed to remove persisted credential: {e}");
        }
    }
}
