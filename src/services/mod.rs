//! Asset lifecycle and tag association services.
//!
//! These sit between the HTTP handlers and the Record Store: the upload stager writes
//! incoming files, the thumbnail service commits them to a product and reclaims the old
//! file, and the tag association service keeps `tag_ids` ordered and duplicate-free.

pub mod asset_storage;
pub mod entity_locks;
pub mod error;
pub mod tag_association_service;
pub mod thumbnail_service;
pub mod upload_stager;

pub use entity_locks::EntityLocks;
pub use error::{CatalogError, StorageReclaimWarning};
pub use tag_association_service::{ProductWithTags, TagAssociationService};
pub use thumbnail_service::{ThumbnailCommit, ThumbnailService};
pub use upload_stager::{StagedFile, UploadConfig, UploadStager};
