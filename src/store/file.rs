use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Result, StoreError, StoredCredentials};
use crate::paths::numerous_home_dir;

const TOKEN_FILE: &str = ".token";
const GITIGNORE_FILE: &str = ".gitignore";

/// On-disk credential record at `~/.numerous/.token`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialRecord {
    access: String,
    refresh: String,
    tenant: String,
}

/// Fallback credential backend: a 0600 file in a 0700 directory with a
/// sibling `.gitignore` so the directory can never leak through a commit.
pub struct FileStore {
    consent_granted: AtomicBool,
}

impl FileStore {
    pub fn new() -> Self {
        FileStore {
            consent_granted: AtomicBool::new(false),
        }
    }

    /// Used when the user already opted in, e.g. via
    /// `NUMEROUS_FORCE_FILE_STORAGE`.
    pub fn with_consent_granted() -> Self {
        FileStore {
            consent_granted: AtomicBool::new(true),
        }
    }

    fn token_path() -> Result<PathBuf> {
        Ok(numerous_home_dir()?.join(TOKEN_FILE))
    }

    /// First write in a session requires an interactive yes, unless the
    /// token file already exists (consent was given before).
    fn ensure_consent(&self) -> Result<()> {
        if self.consent_granted.load(Ordering::Relaxed) {
            return Ok(());
        }
        if Self::token_path()?.exists() {
            self.consent_granted.store(true, Ordering::Relaxed);
            return Ok(());
        }

        let confirmed = crate::output::confirm(
            "Store credentials in a plain file under your home directory?",
            false,
        )?;
        if !confirmed {
            return Err(StoreError::ConsentDeclined);
        }
        self.consent_granted.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn load_record(&self) -> Result<Option<CredentialRecord>> {
        let path = Self::token_path()?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save_record(&self, record: &CredentialRecord) -> Result<()> {
        self.ensure_consent()?;

        let home = numerous_home_dir()?;
        fs::create_dir_all(&home)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&home, fs::Permissions::from_mode(0o700))?;
        }

        let gitignore = home.join(GITIGNORE_FILE);
        if !gitignore.exists() {
            fs::write(&gitignore, "*\n")?;
        }

        let path = home.join(TOKEN_FILE);
        fs::write(&path, serde_json::to_string(record)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn store_access(&self, tenant: &str, token: &str) -> Result<()> {
        let mut record = self.load_record()?.unwrap_or_default();
        record.access = token.to_string();
        record.tenant = tenant.to_string();
        self.save_record(&record)
    }

    pub fn store_refresh(&self, tenant: &str, token: &str) -> Result<()> {
        let mut record = self.load_record()?.unwrap_or_default();
        record.refresh = token.to_string();
        record.tenant = tenant.to_string();
        self.save_record(&record)
    }

    pub fn get(&self, tenant: &str) -> Result<Option<StoredCredentials>> {
        let Some(record) = self.load_record()? else {
            return Ok(None);
        };
        if record.access.is_empty() || record.tenant != tenant {
            return Ok(None);
        }
        let refresh = if record.refresh.is_empty() {
            None
        } else {
            Some(record.refresh)
        };
        Ok(Some(StoredCredentials {
            access: record.access,
            refresh,
        }))
    }

    pub fn remove(&self, _tenant: &str) -> Result<()> {
        let path = Self::token_path()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_home_env_lock;
    use tempfile::TempDir;

    fn with_scratch_home<T>(f: impl FnOnce() -> T) -> T {
        let _lock = test_home_env_lock();
        let previous = std::env::var_os("NUMEROUS_HOME");
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("NUMEROUS_HOME", temp.path());
        }
        let result = f();
        match previous {
            Some(value) => unsafe { std::env::set_var("NUMEROUS_HOME", value) },
            None => unsafe { std::env::remove_var("NUMEROUS_HOME") },
        }
        result
    }

    #[test]
    fn writes_record_and_gitignore() {
        with_scratch_home(|| {
            let store = FileStore::with_consent_granted();
            store.store_access("tenant.example.com", "access").unwrap();

            let home = numerous_home_dir().unwrap();
            assert!(home.join(TOKEN_FILE).exists());
            assert_eq!(fs::read_to_string(home.join(GITIGNORE_FILE)).unwrap(), "*\n");

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let dir_mode = fs::metadata(&home).unwrap().permissions().mode() & 0o777;
                let file_mode =
                    fs::metadata(home.join(TOKEN_FILE)).unwrap().permissions().mode() & 0o777;
                assert_eq!(dir_mode, 0o700);
                assert_eq!(file_mode, 0o600);
            }
        });
    }

    #[test]
    fn get_requires_matching_tenant() {
        with_scratch_home(|| {
            let store = FileStore::with_consent_granted();
            store.store_both_for_test();
            assert!(store.get("other.example.com").unwrap().is_none());
            assert!(store.get("tenant.example.com").unwrap().is_some());
        });
    }

    #[test]
    fn remove_missing_file_is_not_found() {
        with_scratch_home(|| {
            let store = FileStore::with_consent_granted();
            let err = store.remove("tenant.example.com").unwrap_err();
            assert!(matches!(err, StoreError::NotFound));
        });
    }

    #[test]
    fn consent_is_implied_by_an_existing_token_file() {
        with_scratch_home(|| {
            let seeded = FileStore::with_consent_granted();
            seeded.store_access("tenant.example.com", "access").unwrap();

            // A fresh session must not prompt again.
            let store = FileStore::new();
            store.store_refresh("tenant.example.com", "refresh").unwrap();
            let credentials = store.get("tenant.example.com").unwrap().unwrap();
            assert_eq!(credentials.refresh.as_deref(), Some("refresh"));
        });
    }

    impl FileStore {
        fn store_both_for_test(&self) {
            self.store_access("tenant.example.com", "access").unwrap();
            self.store_refresh("tenant.example.com", "refresh").unwrap();
        }
    }
}
