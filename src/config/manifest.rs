use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{ConfigError, Result};

pub const MANIFEST_FILE: &str = "numerous.toml";

/// App manifest from numerous.toml at the app directory root.
///
/// Unknown keys are ignored so older CLIs keep reading newer manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Display name of the app; also the fallback source for the app slug.
    pub name: Option<String>,

    /// Free-form app description shown on the platform.
    pub description: Option<String>,

    /// Glob patterns excluded from the source archive.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// [deployment] section - default deploy target
    pub deployment: Option<Deployment>,
}

/// [deployment] section of numerous.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub organization_slug: Option<String>,
    pub app_slug: Option<String>,
}

impl Manifest {
    /// Load the manifest from an app directory.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ConfigError::AppNotInitialized);
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}
