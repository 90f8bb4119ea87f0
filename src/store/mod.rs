//! Credential storage - OS keyring with a secure-file fallback

mod file;
mod keyring_backend;

use thiserror::Error;

pub use file::FileStore;
pub use keyring_backend::KeyringStore;

/// Env var that forces the file backend regardless of keyring health.
pub const FORCE_FILE_STORAGE_ENV: &str = "NUMEROUS_FORCE_FILE_STORAGE";

/// Errors from credential storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The access token is too large to store")]
    TokenSize,

    #[error("No stored credentials found")]
    NotFound,

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode stored credentials: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Credentials were not stored: file storage was declined")]
    ConsentDeclined,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Tokens as they come back out of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access: String,
    pub refresh: Option<String>,
}

/// The two storage backends. Selection happens once at process start;
/// commands hold the selected store, not a global.
pub enum CredentialStore {
    Keyring(KeyringStore),
    File(FileStore),
}

impl CredentialStore {
    /// Pick a backend: forced file mode wins, otherwise probe the keyring
    /// and fall back to the file store (with a single warning) when the
    /// probe reports anything but a healthy hit or a clean "not found".
    pub fn select() -> Self {
        if std::env::var(FORCE_FILE_STORAGE_ENV).is_ok_and(|v| !v.is_empty() && v != "0") {
            return CredentialStore::File(FileStore::with_consent_granted());
        }

        match KeyringStore::probe() {
            Ok(()) => CredentialStore::Keyring(KeyringStore::new()),
            Err(err) => {
                tracing::debug!(error = %err, "keyring probe failed");
                crate::output::warning(
                    "The system keyring is unavailable; credentials will be stored in a file under your home directory.",
                );
                CredentialStore::File(FileStore::new())
            }
        }
    }

    pub fn store_access(&self, tenant: &str, token: &str) -> Result<()> {
        match self {
            CredentialStore::Keyring(store) => store.store_access(tenant, token),
            CredentialStore::File(store) => store.store_access(tenant, token),
        }
    }

    pub fn store_refresh(&self, tenant: &str, token: &str) -> Result<()> {
        match self {
            CredentialStore::Keyring(store) => store.store_refresh(tenant, token),
            CredentialStore::File(store) => store.store_refresh(tenant, token),
        }
    }

    pub fn store_both(&self, tenant: &str, access: &str, refresh: &str) -> Result<()> {
        self.store_access(tenant, access)?;
        self.store_refresh(tenant, refresh)
    }

    /// Fetch stored credentials, `None` when no access token exists.
    pub fn get(&self, tenant: &str) -> Result<Option<StoredCredentials>> {
        match self {
            CredentialStore::Keyring(store) => store.get(tenant),
            CredentialStore::File(store) => store.get(tenant),
        }
    }

    pub fn remove(&self, tenant: &str) -> Result<()> {
        match self {
            CredentialStore::Keyring(store) => store.remove(tenant),
            CredentialStore::File(store) => store.remove(tenant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_home_env_lock;
    use tempfile::TempDir;

    #[test]
    fn forced_file_storage_selects_file_backend() {
        let _lock = test_home_env_lock();
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("NUMEROUS_HOME", temp.path());
            std::env::set_var(FORCE_FILE_STORAGE_ENV, "1");
        }

        let store = CredentialStore::select();
        let selected_file = matches!(store, CredentialStore::File(_));

        unsafe {
            std::env::remove_var(FORCE_FILE_STORAGE_ENV);
            std::env::remove_var("NUMEROUS_HOME");
        }
        assert!(selected_file);
    }

    #[test]
    fn store_both_round_trips_through_file_backend() {
        let _lock = test_home_env_lock();
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("NUMEROUS_HOME", temp.path());
        }

        let store = CredentialStore::File(FileStore::with_consent_granted());
        store
            .store_both("tenant.example.com", "access-token", "refresh-token")
            .expect("store should succeed");
        let credentials = store
            .get("tenant.example.com")
            .expect("get should succeed")
            .expect("credentials should exist");

        unsafe {
            std::env::remove_var("NUMEROUS_HOME");
        }

        assert_eq!(credentials.access, "access-token");
        assert_eq!(credentials.refresh.as_deref(), Some("refresh-token"));
    }
}
