use crate::config::Policy;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Failed to read directory {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}

/// List the image files directly inside `dir`, in directory-listing order.
///
/// The order is whatever the filesystem returns; it is never sorted, since
/// duplicate resolution depends on it. Subdirectories are not descended into.
/// Symlinks are followed, so a link to an image is listed (and later moved as
/// the link itself); dangling links are logged and skipped.
pub fn list_images(dir: &Path, policy: &Policy) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::InvalidPath {
            path: format!("{} is not a directory", dir.display()),
        });
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(ScanError::Walk {
                    path: dir.display().to_string(),
                    source: e,
                });
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if is_image(entry.path(), policy) {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

pub fn is_image(path: &Path, policy: &Policy) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| policy.accepts_extension(ext))
}

/// Final path component as UTF-8 (lossy).
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
