use thiserror::Error;

use crate::config::{Manifest, SavedConfig};

/// Errors that can occur during app identity resolution
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error(
        "The app is not initialized. Add a numerous.toml manifest to the app directory first."
    )]
    AppNotInitialized,

    #[error(
        "No organization slug given. Pass --organization, set [deployment] organization_slug in numerous.toml, or save a default with the config."
    )]
    MissingOrganizationSlug,

    #[error(
        "No app slug given. Pass --app, set [deployment] app_slug in numerous.toml, or set a name in numerous.toml."
    )]
    MissingAppSlug,

    #[error("Invalid organization slug '{0}'. Slugs contain only lowercase letters, digits and hyphens.")]
    InvalidOrganizationSlug(String),

    #[error("Invalid app slug '{0}'. Slugs contain only lowercase letters, digits and hyphens.")]
    InvalidAppSlug(String),
}

pub type Result<T> = std::result::Result<T, IdentError>;

/// The `(organization, app)` pair every platform operation is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentifier {
    pub organization: String,
    pub app: String,
}

/// Resolve the app identity from flags, manifest and saved config.
///
/// Precedence per field is strict: explicit flag, then manifest
/// `[deployment]`, then (for the organization) the saved default. The app
/// slug falls back to a slugified manifest name. `manifest` is `None` when
/// no readable manifest exists in the app directory.
pub fn resolve_identifier(
    manifest: Option<&Manifest>,
    flag_org: Option<&str>,
    flag_app: Option<&str>,
    saved: &SavedConfig,
) -> Result<AppIdentifier> {
    if let (Some(org), Some(app)) = (flag_org, flag_app) {
        return validated(org.to_string(), app.to_string());
    }

    if manifest.is_none() && flag_app.is_none() {
        return Err(IdentError::AppNotInitialized);
    }

    let deployment = manifest.and_then(|m| m.deployment.as_ref());

    let organization = flag_org
        .map(str::to_string)
        .or_else(|| deployment.and_then(|d| d.organization_slug.clone()))
        .or_else(|| saved.organization.clone())
        .ok_or(IdentError::MissingOrganizationSlug)?;

    let app = flag_app
        .map(str::to_string)
        .or_else(|| deployment.and_then(|d| d.app_slug.clone()))
        .or_else(|| {
            manifest
                .and_then(|m| m.name.as_deref())
                .map(slugify)
                .filter(|s| !s.is_empty())
        })
        .ok_or(IdentError::MissingAppSlug)?;

    validated(organization, app)
}

fn validated(organization: String, app: String) -> Result<AppIdentifier> {
    if !is_valid_slug(&organization) {
        return Err(IdentError::InvalidOrganizationSlug(organization));
    }
    if !is_valid_slug(&app) {
        return Err(IdentError::InvalidAppSlug(app));
    }
    Ok(AppIdentifier { organization, app })
}

/// A slug is non-empty and matches `^[a-z0-9-]+$`.
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derive an app slug from a display name: lowercase, drop everything
/// outside `[a-z0-9- ]`, collapse whitespace runs to a single hyphen.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == ' ')
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut in_whitespace = false;
    for c in kept.trim().chars() {
        if c == ' ' {
            in_whitespace = true;
            continue;
        }
        if in_whitespace {
            slug.push('-');
            in_whitespace = false;
        }
        slug.push(c);
    }
    slug
}
