use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::error::{CatalogError, StorageReclaimWarning};
use super::upload_stager::UploadConfig;

/// Result of trying to delete a thumbnail file that is no longer referenced.
#[derive(Debug)]
pub enum ReclaimOutcome {
    /// There was no previous thumbnail.
    Skipped,
    /// Another product still points at the file, so it was kept.
    StillReferenced(String),
    Removed(PathBuf),
    Warning(StorageReclaimWarning),
}

impl ReclaimOutcome {
    pub fn log(&self, product_id: &str) {
        match self {
            ReclaimOutcome::Skipped => {}
            ReclaimOutcome::StillReferenced(relative) => {
                debug!(product_id, thumbnail = %relative, "Previous thumbnail is shared, keeping it.");
            }
            ReclaimOutcome::Removed(path) => {
                debug!(product_id, path = %path.display(), "Reclaimed previous thumbnail.");
            }
            ReclaimOutcome::Warning(warning) => {
                warn!(product_id, warning = %warning, "Could not reclaim previous thumbnail.");
            }
        }
    }
}

fn is_strictly_inside(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root) && candidate.components().count() > root.components().count()
}

/// Turns the absolute path of a written file into the reference stored on a product.
///
/// The file must exist and must live strictly inside the uploads root.
pub async fn public_relative_path(
    config: &UploadConfig,
    absolute: &Path,
) -> Result<String, CatalogError> {
    let resolved = fs::canonicalize(absolute)
        .await
        .map_err(|_| CatalogError::FileNotFound(absolute.display().to_string()))?;

    if !is_strictly_inside(&config.uploads_root, &resolved) {
        return Err(CatalogError::InvalidPath(resolved.display().to_string()));
    }

    let relative = resolved
        .strip_prefix(&config.public_root)
        .map_err(|_| CatalogError::InvalidPath(resolved.display().to_string()))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Resolves a stored thumbnail reference against the public root.
///
/// Only plain relative paths are accepted, and the result must be strictly inside
/// the uploads root.
pub fn resolve_stored(config: &UploadConfig, relative: &str) -> Result<PathBuf, CatalogError> {
    let candidate = Path::new(relative);
    let plain = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || !plain {
        return Err(CatalogError::InvalidPath(relative.to_string()));
    }

    let absolute = config.public_root.join(candidate);
    if is_strictly_inside(&config.uploads_root, &absolute) {
        Ok(absolute)
    } else {
        Err(CatalogError::InvalidPath(relative.to_string()))
    }
}

/// A thumbnail value is valid when empty or when it resolves inside the uploads root.
pub fn validate_thumbnail(config: &UploadConfig, thumbnail: &str) -> Result<(), CatalogError> {
    if thumbnail.is_empty() {
        return Ok(());
    }
    resolve_stored(config, thumbnail).map(|_| ())
}

/// Maps a requested upload name to a file directly under the uploads root.
pub fn resolve_served(config: &UploadConfig, filename: &str) -> Result<PathBuf, CatalogError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(config.uploads_root.join(filename)),
        _ => Err(CatalogError::FileNotFound(filename.to_string())),
    }
}

/// Best-effort deletion of a thumbnail that is no longer referenced. Never fails.
pub async fn reclaim(config: &UploadConfig, relative: &str) -> ReclaimOutcome {
    if relative.is_empty() {
        return ReclaimOutcome::Skipped;
    }

    let path = match resolve_stored(config, relative) {
        Ok(path) => path,
        Err(_) => {
            return ReclaimOutcome::Warning(StorageReclaimWarning::OutsideUploads(
                relative.to_string(),
            ))
        }
    };

    match fs::remove_file(&path).await {
        Ok(()) => ReclaimOutcome::Removed(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ReclaimOutcome::Warning(StorageReclaimWarning::Missing(path))
        }
        Err(source) => ReclaimOutcome::Warning(StorageReclaimWarning::Io { path, source }),
    }
}

/// Picks the response content type for a served upload: file content first, then extension.
pub fn sniff_content_type(bytes: &[u8], filename: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}
