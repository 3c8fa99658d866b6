use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::db::entities::{product, tag};
use crate::db::store::{NewProduct, ProductChanges, ProductFilter};
use crate::services::asset_storage;
use crate::services::{CatalogError, ProductWithTags, UploadConfig};

/// Keys that are computed or server-owned and never stored as extension fields.
const RESERVED_KEYS: [&str; 4] = ["id", "tags", "createdAt", "updatedAt"];

/// Body of `POST /products` and `PUT /products/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl CreateProductRequest {
    pub fn into_new_product(self, config: &UploadConfig) -> Result<NewProduct, CatalogError> {
        validate_name(&self.name)?;
        ensure_unique_tag_ids(&self.tag_ids)?;
        asset_storage::validate_thumbnail(config, &self.thumbnail)?;

        Ok(NewProduct {
            name: self.name,
            thumbnail: self.thumbnail,
            hidden: self.hidden,
            tag_ids: self.tag_ids,
            category_id: self.category_id,
            description: self.description,
            extras: strip_reserved(self.extras),
        })
    }
}

/// Body of `PATCH /products` and `PATCH /products/{id}`. Absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub thumbnail: Option<String>,
    pub hidden: Option<bool>,
    pub tag_ids: Option<Vec<String>>,
    // `null` clears the column, absence leaves it.
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl UpdateProductRequest {
    /// Validates the well-known fields. Extension fields are returned separately because
    /// they are merged into the stored map rather than written over it.
    pub fn into_changes(
        self,
        config: &UploadConfig,
    ) -> Result<(ProductChanges, Map<String, Value>), CatalogError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(tag_ids) = &self.tag_ids {
            ensure_unique_tag_ids(tag_ids)?;
        }
        if let Some(thumbnail) = &self.thumbnail {
            asset_storage::validate_thumbnail(config, thumbnail)?;
        }

        let changes = ProductChanges {
            name: self.name,
            thumbnail: self.thumbnail,
            hidden: self.hidden,
            tag_ids: self.tag_ids,
            category_id: self.category_id,
            description: self.description,
            extras: None,
        };
        Ok((changes, strip_reserved(self.extras)))
    }
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Query string accepted by the product listing and counting routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub hidden: Option<bool>,
    pub category_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        ProductFilter {
            hidden: query.hidden,
            category_id: query.category_id,
            thumbnail: None,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    pub hidden: bool,
    pub tag_ids: Vec<String>,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<tag::Model>>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        ProductResponse {
            id: model.id,
            name: model.name,
            thumbnail: model.thumbnail,
            hidden: model.hidden,
            tag_ids: model.tag_ids.0,
            category_id: model.category_id,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
            tags: None,
            extras: model.extras.0,
        }
    }
}

impl From<ProductWithTags> for ProductResponse {
    fn from(expanded: ProductWithTags) -> Self {
        let mut response = ProductResponse::from(expanded.product);
        response.tags = Some(expanded.tags);
        response
    }
}

pub fn validate_name(name: &str) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(())
}

pub fn ensure_unique_tag_ids(tag_ids: &[String]) -> Result<(), CatalogError> {
    let mut seen = HashSet::with_capacity(tag_ids.len());
    for tag_id in tag_ids {
        if !seen.insert(tag_id.as_str()) {
            return Err(CatalogError::InvalidInput(format!(
                "tagIds contains '{tag_id}' more than once"
            )));
        }
    }
    Ok(())
}

fn strip_reserved(mut extras: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        extras.remove(key);
    }
    extras
}
