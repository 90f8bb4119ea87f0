use serde::{Deserialize, Serialize};
use std::fs;

use super::error::{ConfigError, Result};
use crate::paths::numerous_home_dir;

const CONFIG_FILE: &str = "config.toml";

/// Per-user defaults from ~/.numerous/config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SavedConfig {
    /// Default organization slug used when neither flag nor manifest
    /// names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl SavedConfig {
    /// Load the saved config. A missing or unreadable file is an empty
    /// config; deploys must not fail because of an optional default.
    pub fn load() -> Self {
        let Ok(home) = numerous_home_dir() else {
            return Self::default();
        };
        let path = home.join(CONFIG_FILE);
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&content).unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        let home = numerous_home_dir()
            .map_err(|e| ConfigError::FileWrite("~/.numerous".into(), e))?;
        fs::create_dir_all(&home).map_err(|e| ConfigError::FileWrite(home.clone(), e))?;
        let path = home.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| ConfigError::FileWrite(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_home_env_lock;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_round_trip() {
        let _lock = test_home_env_lock();
        let previous = std::env::var_os("NUMEROUS_HOME");
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("NUMEROUS_HOME", temp.path());
        }

        let config = SavedConfig {
            organization: Some("acme".to_string()),
        };
        config.save().expect("save should succeed");
        let loaded = SavedConfig::load();

        match previous {
            Some(value) => unsafe { std::env::set_var("NUMEROUS_HOME", value) },
            None => unsafe { std::env::remove_var("NUMEROUS_HOME") },
        }

        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let _lock = test_home_env_lock();
        let previous = std::env::var_os("NUMEROUS_HOME");
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("NUMEROUS_HOME", temp.path().join("nothing-here"));
        }

        let loaded = SavedConfig::load();

        match previous {
            Some(value) => unsafe { std::env::set_var("NUMEROUS_HOME", value) },
            None => unsafe { std::env::remove_var("NUMEROUS_HOME") },
        }

        assert_eq!(loaded, SavedConfig::default());
    }
}
