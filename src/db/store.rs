//! Record Store interfaces.
//!
//! Services and handlers talk to storage only through these traits, so the
//! sea-orm implementations in `db::services` can be swapped or wrapped freely.

use async_trait::async_trait;
use sea_orm::DbErr;
use serde_json::{Map, Value};

use crate::db::entities::{product, tag};

/// Selection criteria for product queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub hidden: Option<bool>,
    pub category_id: Option<String>,
    pub thumbnail: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ProductFilter {
    pub fn visible() -> Self {
        Self {
            hidden: Some(false),
            ..Default::default()
        }
    }

    /// Products whose thumbnail is exactly `path`.
    pub fn with_thumbnail(path: impl Into<String>) -> Self {
        Self {
            thumbnail: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Fields a new or fully replaced product is written with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub thumbnail: String,
    pub hidden: bool,
    pub tag_ids: Vec<String>,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub extras: Map<String, Value>,
}

/// A partial update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub thumbnail: Option<String>,
    pub hidden: Option<bool>,
    pub tag_ids: Option<Vec<String>>,
    pub category_id: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub extras: Option<Map<String, Value>>,
}

impl ProductChanges {
    pub fn thumbnail(path: impl Into<String>) -> Self {
        Self {
            thumbnail: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn tag_ids(ids: Vec<String>) -> Self {
        Self {
            tag_ids: Some(ids),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<product::Model>, DbErr>;

    async fn create(&self, product: NewProduct) -> Result<product::Model, DbErr>;

    /// Writes only the changed columns in one UPDATE. `None` when the product does not exist.
    async fn update_by_id(
        &self,
        id: &str,
        changes: ProductChanges,
    ) -> Result<Option<product::Model>, DbErr>;

    async fn replace_by_id(
        &self,
        id: &str,
        product: NewProduct,
    ) -> Result<Option<product::Model>, DbErr>;

    /// Returns the deleted row, or `None` when nothing was deleted.
    async fn delete_by_id(&self, id: &str) -> Result<Option<product::Model>, DbErr>;

    async fn find(&self, filter: &ProductFilter) -> Result<Vec<product::Model>, DbErr>;

    async fn count(&self, filter: &ProductFilter) -> Result<u64, DbErr>;

    async fn update_all(&self, filter: &ProductFilter, changes: ProductChanges)
        -> Result<u64, DbErr>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Tags whose id is in `ids`. Unknown ids are skipped; order is not guaranteed.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<tag::Model>, DbErr>;

    async fn find_all(&self) -> Result<Vec<tag::Model>, DbErr>;

    async fn create(&self, name: String) -> Result<tag::Model, DbErr>;
}
