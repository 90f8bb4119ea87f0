//! Source archive creation - uncompressed tar with manifest exclusions

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while building the source archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid exclude pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),

    #[error("Failed to create archive: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Create an uncompressed tar of `src_dir` at `dest_path`.
///
/// Entry paths are relative to `src_dir` with `/` separators on every
/// host. A relative path matching any pattern is omitted; a match on a
/// directory prunes its whole subtree. Patterns use shell-glob semantics
/// (`glob::Pattern`: `*` stops at `/`, `**` spans segments, `?` is one
/// character); a pattern without a `/` also matches any single path
/// component. Only regular files carry content; directories and symlinks
/// contribute a header only. Owner ids are not recorded.
///
/// Returns the byte size of the finished archive.
pub fn tar_create(src_dir: &Path, dest_path: &Path, exclude: &[String]) -> Result<u64> {
    let patterns = compile_patterns(exclude)?;

    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(dest_path)?;
    let mut archive = tar::Builder::new(file);
    archive.follow_symlinks(false);
    archive.mode(tar::HeaderMode::Deterministic);

    // The archive usually lives inside src_dir while it is being written;
    // it must never contain itself.
    let self_path = dest_path.canonicalize().unwrap_or_else(|_| dest_path.to_path_buf());

    add_dir_entries(&mut archive, src_dir, src_dir, &patterns, &self_path)?;

    archive
        .into_inner()
        .map_err(|e| ArchiveError::Archive(format!("Failed to finish archive: {}", e)))?;

    let metadata = std::fs::metadata(dest_path)?;
    Ok(metadata.len())
}

fn compile_patterns(exclude: &[String]) -> Result<Vec<glob::Pattern>> {
    exclude
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| ArchiveError::InvalidPattern(p.clone(), e))
        })
        .collect()
}

/// Check a `/`-separated relative path against the exclusion set.
fn is_excluded(relative: &str, patterns: &[glob::Pattern]) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.matches(relative) {
            return true;
        }
        // A bare pattern (no separator) prunes matching components at any
        // depth, so `exclude = ["__pycache__"]` works as users expect.
        if !pattern.as_str().contains('/') {
            return relative.split('/').any(|part| pattern.matches(part));
        }
        false
    })
}

fn add_dir_entries<W: std::io::Write>(
    archive: &mut tar::Builder<W>,
    base_dir: &Path,
    current_dir: &Path,
    patterns: &[glob::Pattern],
    self_path: &Path,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(current_dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let relative = path
            .strip_prefix(base_dir)
            .expect("walked entries live under the base directory");
        let relative_str = posix_path(relative);

        if is_excluded(&relative_str, patterns) {
            continue;
        }
        if path.canonicalize().map(|p| p == self_path).unwrap_or(false) {
            continue;
        }

        let file_type = std::fs::symlink_metadata(&path)?.file_type();
        if file_type.is_dir() {
            archive
                .append_path_with_name(&path, relative)
                .map_err(|e| archive_entry_error(&path, e))?;
            add_dir_entries(archive, base_dir, &path, patterns, self_path)?;
        } else if file_type.is_file() || file_type.is_symlink() {
            archive
                .append_path_with_name(&path, relative)
                .map_err(|e| archive_entry_error(&path, e))?;
        }
        // Sockets, fifos and devices do not belong in an app source upload.
    }

    Ok(())
}

fn archive_entry_error(path: &Path, err: std::io::Error) -> ArchiveError {
    ArchiveError::Archive(format!("Failed to add {}: {}", path.display(), err))
}

fn posix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Render a byte count the way humans read archive sizes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
