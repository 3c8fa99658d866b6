use std::io;
use std::path::{Path, PathBuf};
use std::pin::{pin, Pin};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::CatalogError;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1_000_000;
pub const DEFAULT_ALLOWED_MIME_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

const MAX_NAME_ATTEMPTS: usize = 16;
const MAX_ORIGINAL_NAME_LEN: usize = 200;

/// Where uploads live and what they may contain.
///
/// Both roots are canonical absolute paths; `uploads_root` is strictly inside `public_root`,
/// and stored thumbnail references are relative to `public_root`.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub public_root: PathBuf,
    pub uploads_root: PathBuf,
    pub allowed_mime_types: Vec<String>,
    pub max_bytes: u64,
}

impl UploadConfig {
    /// Creates the uploads directory if needed and canonicalizes both roots.
    pub async fn prepare(
        public_root: impl AsRef<Path>,
        uploads_subdir: &str,
        allowed_mime_types: Vec<String>,
        max_bytes: u64,
    ) -> io::Result<Self> {
        let uploads_dir = public_root.as_ref().join(uploads_subdir);
        fs::create_dir_all(&uploads_dir).await?;

        let public_root = fs::canonicalize(public_root.as_ref()).await?;
        let uploads_root = fs::canonicalize(&uploads_dir).await?;
        if uploads_root == public_root || !uploads_root.starts_with(&public_root) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "uploads directory {} must be a subdirectory of {}",
                    uploads_root.display(),
                    public_root.display()
                ),
            ));
        }

        Ok(Self {
            public_root,
            uploads_root,
            allowed_mime_types,
            max_bytes,
        })
    }

    pub fn is_allowed(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|allowed| allowed == mime_type)
    }
}

/// A validated upload that has been written to disk but is not yet referenced by any product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub generated_name: String,
    pub absolute_path: PathBuf,
    pub original_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

pub struct UploadStager {
    config: Arc<UploadConfig>,
    last_millis: AtomicI64,
}

impl UploadStager {
    pub fn new(config: Arc<UploadConfig>) -> Self {
        Self {
            config,
            last_millis: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &Arc<UploadConfig> {
        &self.config
    }

    /// Validates and persists one attachment under the uploads root.
    ///
    /// The content type is checked before any byte is read. Oversized or interrupted
    /// uploads leave nothing behind on disk.
    pub async fn stage<S, E>(
        &self,
        original_name: &str,
        mime_type: &str,
        body: S,
    ) -> Result<StagedFile, CatalogError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.config.is_allowed(mime_type) {
            debug!(mime_type, "Rejected upload with disallowed content type.");
            return Err(CatalogError::InvalidFileType(mime_type.to_string()));
        }

        let original_name = sanitize_file_name(original_name);
        let (generated_name, absolute_path, mut file) = self.create_target(&original_name).await?;

        let body = pin!(body);
        match write_body(&mut file, body, self.config.max_bytes).await {
            Ok(size_bytes) => {
                info!(file = %generated_name, size_bytes, "Staged upload.");
                Ok(StagedFile {
                    generated_name,
                    absolute_path,
                    original_name,
                    size_bytes,
                    mime_type: mime_type.to_string(),
                })
            }
            Err(e) => {
                drop(file);
                remove_partial(&absolute_path).await;
                Err(e)
            }
        }
    }

    /// Removes a staged file that will never be committed.
    pub async fn discard(&self, staged: &StagedFile) -> io::Result<()> {
        match fs::remove_file(&staged.absolute_path).await {
            Ok(()) => {
                debug!(file = %staged.generated_name, "Discarded staged upload.");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn create_target(
        &self,
        original_name: &str,
    ) -> Result<(String, PathBuf, File), CatalogError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let millis = self.next_millis();
            let generated_name = format!("{millis}-{original_name}");
            let absolute_path = self.config.uploads_root.join(&generated_name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&absolute_path)
                .await
            {
                Ok(file) => return Ok((generated_name, absolute_path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    self.last_millis.fetch_max(millis + 1, Ordering::SeqCst);
                }
                Err(e) => return Err(CatalogError::UploadFailed(e)),
            }
        }

        Err(CatalogError::UploadFailed(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free upload name for '{original_name}'"),
        )))
    }

    /// Wall-clock milliseconds, never lower than a value already handed out.
    fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_millis.fetch_max(now, Ordering::SeqCst).max(now)
    }
}

async fn write_body<S, E>(
    file: &mut File,
    mut body: Pin<&mut S>,
    max_bytes: u64,
) -> Result<u64, CatalogError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| CatalogError::UploadFailed(io::Error::other(e)))?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(CatalogError::FileTooLarge { limit: max_bytes });
        }
        file.write_all(&chunk)
            .await
            .map_err(CatalogError::UploadFailed)?;
    }

    file.flush().await.map_err(CatalogError::UploadFailed)?;
    file.sync_all().await.map_err(CatalogError::UploadFailed)?;
    Ok(written)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial upload.");
        }
    }
}

/// Reduces a client-supplied file name to a single safe path component.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_ORIGINAL_NAME_LEN)
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
