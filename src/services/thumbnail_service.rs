use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::asset_storage::{self, ReclaimOutcome};
use super::entity_locks::EntityLocks;
use super::error::CatalogError;
use super::upload_stager::{StagedFile, UploadConfig};
use crate::db::store::{ProductChanges, ProductFilter, ProductStore};

/// What the caller gets back once a thumbnail is the product's thumbnail of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailCommit {
    pub filename: String,
    pub path: String,
}

pub struct ThumbnailService {
    products: Arc<dyn ProductStore>,
    config: Arc<UploadConfig>,
    locks: EntityLocks,
}

impl ThumbnailService {
    pub fn new(products: Arc<dyn ProductStore>, config: Arc<UploadConfig>, locks: EntityLocks) -> Self {
        Self {
            products,
            config,
            locks,
        }
    }

    /// Points a product at a staged file and reclaims the file it pointed at before.
    ///
    /// The product update is the commit point. Lookup and path failures happen before it and
    /// leave the staged file untouched for the caller; once the update succeeds the new
    /// thumbnail stays, whatever happens to the old file.
    pub async fn replace_thumbnail(
        &self,
        product_id: &str,
        staged: &StagedFile,
    ) -> Result<ThumbnailCommit, CatalogError> {
        let _guard = self.locks.lock(product_id).await;

        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CatalogError::EntityNotFound(product_id.to_string()))?;
        let previous_thumbnail = product.thumbnail;

        let new_path = asset_storage::public_relative_path(&self.config, &staged.absolute_path).await?;

        self.products
            .update_by_id(product_id, ProductChanges::thumbnail(new_path.clone()))
            .await
            .map_err(|source| CatalogError::UpdateFailed {
                id: product_id.to_string(),
                source,
            })?
            .ok_or_else(|| CatalogError::EntityNotFound(product_id.to_string()))?;

        info!(product_id, thumbnail = %new_path, "Thumbnail replaced.");

        if !previous_thumbnail.is_empty() && previous_thumbnail != new_path {
            self.reclaim_orphan(product_id, &previous_thumbnail).await;
        }

        Ok(ThumbnailCommit {
            filename: staged.generated_name.clone(),
            path: new_path,
        })
    }

    /// Best-effort removal of a thumbnail that `product_id` no longer references.
    ///
    /// The file is kept while any other product still points at it.
    pub async fn reclaim_orphan(&self, product_id: &str, thumbnail: &str) -> ReclaimOutcome {
        let outcome = if !thumbnail.is_empty() && self.still_referenced(thumbnail).await {
            ReclaimOutcome::StillReferenced(thumbnail.to_string())
        } else {
            asset_storage::reclaim(&self.config, thumbnail).await
        };
        outcome.log(product_id);
        outcome
    }

    async fn still_referenced(&self, thumbnail: &str) -> bool {
        match self.products.count(&ProductFilter::with_thumbnail(thumbnail)).await {
            Ok(count) => count > 0,
            Err(e) => {
                // Unknown references count as shared.
                warn!(thumbnail, error = %e, "Could not check thumbnail references, keeping file.");
                true
            }
        }
    }
}
