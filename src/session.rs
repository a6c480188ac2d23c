//! Session credential lifecycle.
//!
//! [`SessionStore`] holds the bearer credential for the current process and
//! persists it through a [`CredentialBackend`] so a restart resumes the same
//! session. The store also tracks a session *epoch* that changes whenever the
//! credential is replaced or cleared; asynchronous producers tag their output
//! with the epoch they started under so stale work can be recognised.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::SessionStorage;

/// Keychain service name used for the stored credential.
const SERVICE: &str = "mmconsole";

/// Fixed key the credential is stored under.
const CREDENTIAL_KEY: &str = "access_token";

/// Opaque bearer token. Its validity is unknown until the server rejects it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the raw token for use in an `Authorization` header or query.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Durable key-value storage for a single credential.
pub trait CredentialBackend: Send + Sync {
    /// Returns the stored credential, or `None` if nothing is stored.
    fn load(&self) -> crate::Result<Option<Credential>>;
    /// Replaces the stored credential.
    fn save(&self, credential: &Credential) -> crate::Result<()>;
    /// Removes the stored credential. Removing nothing is not an error.
    fn delete(&self) -> crate::Result<()>;
}

/// Credential kept in the system keychain.
pub struct KeyringBackend {
    entry: keyring::Entry,
}

impl KeyringBackend {
    /// Opens the keychain entry for the console's fixed key.
    pub fn open() -> crate::Result<Self> {
        let entry = keyring::Entry::new(SERVICE, CREDENTIAL_KEY)
            .map_err(|e| crate::ConsoleError::Storage(format!("keyring entry error: {e}")))?;
        Ok(Self { entry })
    }
}

impl CredentialBackend for KeyringBackend {
    fn load(&self) -> crate::Result<Option<Credential>> {
        match self.entry.get_password() {
            Ok(password) => Ok(Some(Credential::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(crate::ConsoleError::Storage(format!(
                "failed to read keychain entry: {e}"
            ))),
        }
    }

    fn save(&self, credential: &Credential) -> crate::Result<()> {
        self.entry
            .set_password(credential.expose())
            .map_err(|e| crate::ConsoleError::Storage(format!("failed to save to keychain: {e}")))
    }

    fn delete(&self) -> crate::Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(crate::ConsoleError::Storage(format!(
                "failed to delete keychain entry: {e}"
            ))),
        }
    }
}

/// Credential kept in a file readable only by the current user.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> crate::Result<Option<Credential>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let contents = Zeroizing::new(contents);
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| Credential::new(token)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::ConsoleError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, credential: &Credential) -> crate::Result<()> {
        let storage_err = |e: std::io::Error| {
            crate::ConsoleError::Storage(format!("failed to write {}: {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(storage_err)?;
        file.write_all(credential.expose().as_bytes())
            .map_err(storage_err)
    }

    fn delete(&self) -> crate::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::ConsoleError::Storage(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Credential kept in memory only.
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<Credential>>,
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> crate::Result<Option<Credential>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, credential: &Credential) -> crate::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn delete(&self) -> crate::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Opens the backend selected by configuration.
///
/// # Errors
///
/// Returns [`ConsoleError::Storage`](crate::ConsoleError::Storage) if the
/// keychain entry cannot be opened.
pub fn open_backend(storage: &SessionStorage) -> crate::Result<Box<dyn CredentialBackend>> {
    Ok(match storage {
        SessionStorage::Keyring => Box::new(KeyringBackend::open()?),
        SessionStorage::File(path) => Box::new(FileBackend::new(path.clone())),
        SessionStorage::Memory => Box::new(MemoryBackend::default()),
    })
}

struct SessionState {
    credential: Option<Credential>,
    epoch: u64,
}

/// Process-wide holder of the current credential.
pub struct SessionStore {
    backend: Box<dyn CredentialBackend>,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Creates a store and loads any credential persisted by a previous run.
    ///
    /// A backend that fails to load is treated as holding no credential.
    pub fn open(backend: Box<dyn CredentialBackend>) -> Self {
        let credential = match backend.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "failed to load stored credential");
                None
            }
        };
        if credential.is_some() {
            debug!("restored credential from storage");
        }
        Self {
            backend,
            state: Mutex::new(SessionState {
                credential,
                epoch: 0,
            }),
        }
    }

    /// Creates a store that does not persist anything.
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryBackend::default()))
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    /// Returns `true` while a credential is held.
    pub fn is_authenticated(&self) -> bool {
        self.lock().credential.is_some()
    }

    /// Returns the current session epoch.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Stores a new credential and returns the epoch of the new session.
    pub fn set_credential(&self, credential: Credential) -> u64 {
        if let Err(e) = self.backend.save(&credential) {
            warn!(error = %e, "failed to persist credential, keeping it in memory");
        }
        let mut state = self.lock();
        state.credential = Some(credential);
        state.epoch += 1;
        info!(epoch = state.epoch, "session credential set");
        state.epoch
    }

    /// Returns the credential only while the store is still at `epoch`.
    pub fn credential_for(&self, epoch: u64) -> Option<Credential> {
        let state = self.lock();
        if state.epoch == epoch {
            state.credential.clone()
        } else {
            None
        }
    }

    /// Drops the credential. Returns `false` if there was nothing to clear.
    ///
    /// Idempotent: clearing an empty store changes nothing, including the epoch.
    pub fn clear(&self) -> bool {
        let mut state = self.lock();
        self.clear_locked(&mut state)
    }

    /// Drops the credential only if the session is still at `epoch`.
    ///
    /// A producer started for an earlier session cannot clear a newer one.
    pub fn clear_if(&self, epoch: u64) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(epoch, current = state.epoch, "ignoring clear from an ended session");
            return false;
        }
        self.clear_locked(&mut state)
    }

    fn clear_locked(&self, state: &mut SessionState) -> bool {
        if state.credential.take().is_none() {
            return false;
        }
        state.epoch += 1;
        if let Err(e) = self.backend.delete() {
            warn!(error = %e, "failed to remove persisted credential");
        }
        info!(epoch = state.epoch, "session credential cleared");
        true
    }
}
