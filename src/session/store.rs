//! Token Store
//!
//! Persists the session triplet (token, email, display name) in a
//! session-scoped key/value storage. Persistence is a durability aid only:
//! storage failures are logged and never reach callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::StorageError;
use crate::config::{SessionConfig, StoreKind};

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "jwt_token";
/// Storage key for the account email
pub const EMAIL_KEY: &str = "user_email";
/// Storage key for the display name
pub const NAME_KEY: &str = "user_name";

/// Key/value storage scoped to one user session
///
/// Mirrors the browser `sessionStorage` surface: every call may fail.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// The persisted session triplet
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: String,
    pub email: String,
    pub name: String,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish()
    }
}

/// Durable mirror of the in-memory session
pub struct TokenStore {
    backend: Box<dyn SessionStorage>,
}

impl TokenStore {
    /// Wrap a storage backend
    pub fn new(backend: impl SessionStorage + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Process-scoped store that forgets everything on exit
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::default())
    }

    /// File-backed store at the given path
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    /// Build the store selected in configuration
    pub fn from_config(config: &SessionConfig) -> Self {
        match config.store {
            StoreKind::Memory => Self::in_memory(),
            StoreKind::File => {
                let path = config
                    .path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(FileStorage::default_path);
                tracing::debug!(path = ?path, "Using file-backed session store");
                Self::file(path)
            }
        }
    }

    /// Write all three keys
    pub fn save(&self, credentials: &StoredCredentials) {
        let writes = [
            (TOKEN_KEY, credentials.token.as_str()),
            (EMAIL_KEY, credentials.email.as_str()),
            (NAME_KEY, credentials.name.as_str()),
        ];

        for (key, value) in writes {
            if let Err(e) = self.backend.set_item(key, value) {
                tracing::warn!(key, error = %e, "Failed to persist session value");
            }
        }
    }

    /// Read the stored triplet
    ///
    /// Returns `None` when the token or email is missing or empty.
    pub fn read(&self) -> Option<StoredCredentials> {
        let token = self.get(TOKEN_KEY)?;
        let email = self.get(EMAIL_KEY)?;
        let name = self.get(NAME_KEY).unwrap_or_else(|| email.clone());

        Some(StoredCredentials { token, email, name })
    }

    /// Remove all three keys
    pub fn clear(&self) {
        for key in [TOKEN_KEY, EMAIL_KEY, NAME_KEY] {
            if let Err(e) = self.backend.remove_item(key) {
                tracing::warn!(key, error = %e, "Failed to clear session value");
            }
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session value");
                None
            }
        }
    }
}

// ============================================
// Backends
// ============================================

/// In-memory storage, lost when the process exits
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items()?.remove(key);
        Ok(())
    }
}

/// JSON key/value file
///
/// The default location lives under the per-user runtime directory, which
/// the OS wipes at the end of the login session.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<runtime dir>/triage/session.json`, falling back to the cache dir
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("triage")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        if items.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, modify: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        let mut items = self.load()?;
        modify(&mut items);
        self.persist(&items)
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.remove(key);
        })
    }
}
