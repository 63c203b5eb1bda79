//! Session token lookup and the persistent credential store.
//!
//! The storefront never reads credentials from a global. Components that
//! need the signed-in user's token receive a [`SessionProvider`] at
//! construction; any [`CredentialStore`] is one.
//!
//! The store keeps the same keys the login flow writes:
//! [`keys::TOKEN`], [`keys::USERNAME`] and [`keys::BALANCE`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::warn;

/// Credential store keys.
pub mod keys {
    /// Key for the bearer token issued at login.
    pub const TOKEN: &str = "token";

    /// Key for the signed-in user's name.
    pub const USERNAME: &str = "username";

    /// Key for the signed-in user's wallet balance.
    pub const BALANCE: &str = "balance";
}

/// Errors raised by credential store implementations.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Reading or writing the backing file failed.
    #[error("credential store I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file is not a JSON object of strings.
    #[error("credential store is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("credential store lock poisoned")]
    Poisoned,
}

/// Opaque bearer token for the signed-in user.
///
/// `Debug` output is redacted by [`SecretString`].
#[derive(Debug, Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Raw token value, for building the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Source of the current session token.
///
/// `None` means the visitor is anonymous, which disables every cart
/// operation.
pub trait SessionProvider: Send + Sync {
    /// Current token, if a user is signed in.
    fn session_token(&self) -> Option<SessionToken>;
}

/// Persistent key-value store holding session credentials.
pub trait CredentialStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Delete a value. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
}

impl<S: CredentialStore + ?Sized> SessionProvider for S {
    fn session_token(&self) -> Option<SessionToken> {
        match self.get(keys::TOKEN) {
            Ok(Some(token)) if !token.trim().is_empty() => Some(SessionToken::new(token)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session token, treating visitor as anonymous");
                None
            }
        }
    }
}

/// Store the credentials returned by a successful login.
///
/// # Errors
///
/// Returns an error if any key cannot be written.
pub fn persist_login(
    store: &dyn CredentialStore,
    token: &SessionToken,
    username: &str,
    balance: u64,
) -> Result<(), SessionStoreError> {
    store.set(keys::TOKEN, token.expose())?;
    store.set(keys::USERNAME, username)?;
    store.set(keys::BALANCE, &balance.to_string())
}

/// Remove every session key, returning the visitor to anonymous.
///
/// # Errors
///
/// Returns an error if any key cannot be removed.
pub fn logout(store: &dyn CredentialStore) -> Result<(), SessionStoreError> {
    for key in [keys::TOKEN, keys::USERNAME, keys::BALANCE] {
        store.remove(key)?;
    }
    Ok(())
}

// =============================================================================
// In-memory store
// =============================================================================

/// Credential store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store (anonymous visitor).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(keys::TOKEN.to_string(), token.to_string());
        Self {
            values: RwLock::new(values),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let values = self
            .values
            .read()
            .map_err(|_| SessionStoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.values
            .write()
            .map_err(|_| SessionStoreError::Poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.values
            .write()
            .map_err(|_| SessionStoreError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Credential store persisted as a JSON object on disk.
///
/// The file is created on first write. A missing file reads as empty.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: RwLock<()>,
}

impl FileCredentialStore {
    /// Open (lazily) the store at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, SessionStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), SessionStoreError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.lock.write().map_err(|_| SessionStoreError::Poisoned)?;
        let mut values = self.load()?;
        apply(&mut values);
        self.save(&values)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let _guard = self.lock.read().map_err(|_| SessionStoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}
