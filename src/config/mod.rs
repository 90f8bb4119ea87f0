mod env_file;
mod error;
mod manifest;
mod saved;

pub use env_file::read_secrets;
pub use error::{ConfigError, Result};
pub use manifest::{Deployment, MANIFEST_FILE, Manifest};
pub use saved::SavedConfig;
