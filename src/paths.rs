use std::path::PathBuf;

/// Get the CLI's global state directory.
///
/// `NUMEROUS_HOME` overrides the default of `~/.numerous`; tests point it
/// at a scratch directory.
pub fn numerous_home_dir() -> Result<PathBuf, std::io::Error> {
    if let Ok(v) = std::env::var("NUMEROUS_HOME")
        && !v.trim().is_empty()
    {
        return Ok(PathBuf::from(v));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;

    Ok(home.join(".numerous"))
}

#[cfg(test)]
pub(crate) fn test_home_env_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .expect("NUMEROUS_HOME test env lock poisoned")
}
