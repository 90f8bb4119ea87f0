use keyring::Entry;

use super::{Result, StoreError, StoredCredentials};

const SERVICE: &str = "numerous";

/// Keyring entries cap out around 4 KiB on some platforms; chunk below
/// that and bound the total so a corrupt token cannot loop forever.
const CHUNK_SIZE: usize = 2048;
const MAX_CHUNKS: usize = 50;

/// Credential backend on the OS keyring.
///
/// The access token is split into `CHUNK_SIZE`-byte chunks stored under
/// indexed labels; the refresh token fits in a single entry.
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        KeyringStore
    }

    /// Benign lookup to find out whether a keyring backend is usable at
    /// all. A clean "no entry" answer counts as available.
    pub fn probe() -> std::result::Result<(), keyring::Error> {
        let entry = Entry::new(SERVICE, "keyring-probe")?;
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn access_entry(tenant: &str, index: usize) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(SERVICE, &format!("{} Access Token {}", tenant, index))
    }

    fn refresh_entry(tenant: &str) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(SERVICE, &format!("{} Refresh Token", tenant))
    }

    pub fn store_access(&self, tenant: &str, token: &str) -> Result<()> {
        let chunks = chunk_token(token)?;

        for (index, chunk) in chunks.iter().enumerate() {
            Self::access_entry(tenant, index)?.set_password(chunk)?;
        }

        // Drop stale chunks from a previously longer token.
        for index in chunks.len()..MAX_CHUNKS {
            let entry = Self::access_entry(tenant, index)?;
            match entry.delete_credential() {
                Ok(()) => {}
                Err(keyring::Error::NoEntry) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    pub fn store_refresh(&self, tenant: &str, token: &str) -> Result<()> {
        Self::refresh_entry(tenant)?.set_password(token)?;
        Ok(())
    }

    pub fn get(&self, tenant: &str) -> Result<Option<StoredCredentials>> {
        let mut access = String::new();
        for index in 0..MAX_CHUNKS {
            let entry = Self::access_entry(tenant, index)?;
            match entry.get_password() {
                Ok(chunk) => access.push_str(&chunk),
                Err(keyring::Error::NoEntry) if index == 0 => return Ok(None),
                Err(keyring::Error::NoEntry) => break,
                Err(err) => return Err(err.into()),
            }
        }

        let refresh = match Self::refresh_entry(tenant)?.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(err) => return Err(err.into()),
        };

        Ok(Some(StoredCredentials { access, refresh }))
    }

    /// Remove every access chunk, then the refresh entry. A missing chunk
    /// 0 means there was nothing to remove and is surfaced; missing
    /// higher chunks just terminate the sweep.
    pub fn remove(&self, tenant: &str) -> Result<()> {
        for index in 0..MAX_CHUNKS {
            let entry = Self::access_entry(tenant, index)?;
            match entry.delete_credential() {
                Ok(()) => {}
                Err(keyring::Error::NoEntry) if index == 0 => return Err(StoreError::NotFound),
                Err(keyring::Error::NoEntry) => break,
                Err(err) => return Err(err.into()),
            }
        }

        match Self::refresh_entry(tenant)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Split the access token into keyring-sized chunks. Tokens are base64url
/// JWTs, so byte boundaries never split a UTF-8 code point.
fn chunk_token(token: &str) -> Result<Vec<&str>> {
    let chunks: Vec<&str> = token
        .as_bytes()
        .chunks(CHUNK_SIZE)
        .map(|chunk| std::str::from_utf8(chunk).map_err(|_| StoreError::TokenSize))
        .collect::<Result<_>>()?;
    if chunks.len() > MAX_CHUNKS {
        return Err(StoreError::TokenSize);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_token_fails_before_touching_the_keyring() {
        let store = KeyringStore::new();
        let token = "a".repeat(CHUNK_SIZE * MAX_CHUNKS + 1);
        let err = store.store_access("tenant.example.com", &token).unwrap_err();
        assert!(matches!(err, StoreError::TokenSize));
    }

    #[test]
    fn chunking_round_trips_up_to_the_cap() {
        for len in [1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, CHUNK_SIZE * MAX_CHUNKS] {
            let token: String = "abc123".chars().cycle().take(len).collect();
            let chunks = chunk_token(&token).expect("token within the cap should chunk");
            assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
            assert_eq!(chunks.concat(), token, "reassembly must be lossless at {len}");
        }
    }

    #[test]
    fn chunk_count_is_bounded() {
        let exactly_max = "a".repeat(CHUNK_SIZE * MAX_CHUNKS);
        assert_eq!(chunk_token(&exactly_max).unwrap().len(), MAX_CHUNKS);

        let one_over = "a".repeat(CHUNK_SIZE * MAX_CHUNKS + 1);
        assert!(matches!(chunk_token(&one_over), Err(StoreError::TokenSize)));
    }
}
