use std::io;
use std::path::PathBuf;

use sea_orm::DbErr;
use thiserror::Error;

/// Errors surfaced by the asset lifecycle and tag association services.
///
/// Every variant is scoped to a single request; none of them is fatal to the process.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid file type '{0}'. Only JPEG and PNG are allowed")]
    InvalidFileType(String),
    #[error("File size exceeds the {limit} byte limit")]
    FileTooLarge { limit: u64 },
    #[error("Upload failed: {0}")]
    UploadFailed(#[source] io::Error),
    #[error("Path is outside the uploads directory: {0}")]
    InvalidPath(String),
    #[error("Product not found: {0}")]
    EntityNotFound(String),
    #[error("Failed to update product {id}: {source}")]
    UpdateFailed {
        id: String,
        #[source]
        source: DbErr,
    },
    #[error("Product already has the tag with id {tag_id}")]
    TagAlreadyAssociated { product_id: String, tag_id: String },
    #[error("Tag with id {tag_id} not found in product {product_id}")]
    TagNotAssociated { product_id: String, tag_id: String },
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Non-fatal outcome of reclaiming a thumbnail file that is no longer referenced.
///
/// Only ever logged; a committed thumbnail reference is never rolled back because of it.
#[derive(Error, Debug)]
pub enum StorageReclaimWarning {
    #[error("previous thumbnail '{0}' resolves outside the uploads directory")]
    OutsideUploads(String),
    #[error("previous thumbnail file {} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("failed to delete previous thumbnail file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
