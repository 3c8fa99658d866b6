use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::info;

use super::entity_locks::EntityLocks;
use super::error::CatalogError;
use crate::db::entities::{product, tag};
use crate::db::store::{ProductChanges, ProductStore, TagStore};

/// A product together with the tag records its `tag_ids` resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductWithTags {
    pub product: product::Model,
    pub tags: Vec<tag::Model>,
}

pub struct TagAssociationService {
    products: Arc<dyn ProductStore>,
    tags: Arc<dyn TagStore>,
    locks: EntityLocks,
}

impl TagAssociationService {
    pub fn new(products: Arc<dyn ProductStore>, tags: Arc<dyn TagStore>, locks: EntityLocks) -> Self {
        Self {
            products,
            tags,
            locks,
        }
    }

    /// Appends `tag_id` to the product's tags. The tag itself does not have to exist.
    pub async fn add_tag(&self, product_id: &str, tag_id: &str) -> Result<(), CatalogError> {
        let _guard = self.locks.lock(product_id).await;

        let product = self.load(product_id).await?;
        if product.tag_ids.contains(tag_id) {
            return Err(CatalogError::TagAlreadyAssociated {
                product_id: product_id.to_string(),
                tag_id: tag_id.to_string(),
            });
        }

        let mut tag_ids = product.tag_ids.0;
        tag_ids.push(tag_id.to_string());
        self.persist(product_id, tag_ids).await?;

        info!(product_id, tag_id, "Tag added to product.");
        Ok(())
    }

    /// Removes every occurrence of `tag_id` from the product's tags.
    pub async fn remove_tag(&self, product_id: &str, tag_id: &str) -> Result<(), CatalogError> {
        let _guard = self.locks.lock(product_id).await;

        let product = self.load(product_id).await?;
        if !product.tag_ids.contains(tag_id) {
            return Err(CatalogError::TagNotAssociated {
                product_id: product_id.to_string(),
                tag_id: tag_id.to_string(),
            });
        }

        let tag_ids = product
            .tag_ids
            .0
            .into_iter()
            .filter(|id| id != tag_id)
            .collect();
        self.persist(product_id, tag_ids).await?;

        info!(product_id, tag_id, "Tag removed from product.");
        Ok(())
    }

    /// Resolves each product's tag ids with one tag query per product.
    ///
    /// Ids without a matching tag are dropped silently, and the order of `tags` need not
    /// follow `tag_ids`.
    pub async fn expand_tags(
        &self,
        products: Vec<product::Model>,
    ) -> Result<Vec<ProductWithTags>, CatalogError> {
        let expanded = try_join_all(products.into_iter().map(|product| async move {
            let tags = self.tags.find_by_ids(&product.tag_ids.0).await?;
            Ok::<_, CatalogError>(ProductWithTags { product, tags })
        }))
        .await?;
        Ok(expanded)
    }

    pub async fn expand_one(&self, product: product::Model) -> Result<ProductWithTags, CatalogError> {
        let tags = self.tags.find_by_ids(&product.tag_ids.0).await?;
        Ok(ProductWithTags { product, tags })
    }

    async fn load(&self, product_id: &str) -> Result<product::Model, CatalogError> {
        self.products
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CatalogError::EntityNotFound(product_id.to_string()))
    }

    async fn persist(&self, product_id: &str, tag_ids: Vec<String>) -> Result<(), CatalogError> {
        self.products
            .update_by_id(product_id, ProductChanges::tag_ids(tag_ids))
            .await
            .map_err(|source| CatalogError::UpdateFailed {
                id: product_id.to_string(),
                source,
            })?
            .ok_or_else(|| CatalogError::EntityNotFound(product_id.to_string()))?;
        Ok(())
    }
}
