use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free tag ids, stored as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct TagIds(pub Vec<String>);

impl TagIds {
    pub fn contains(&self, tag_id: &str) -> bool {
        self.0.iter().any(|id| id == tag_id)
    }
}

/// Free-form extra properties kept alongside the well-known columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Extras(pub serde_json::Map<String, serde_json::Value>);

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    // Relative to the public root; empty means no thumbnail.
    pub thumbnail: String,
    pub hidden: bool,
    #[sea_orm(column_type = "Json")]
    pub tag_ids: TagIds,
    pub category_id: Option<String>,
    pub description: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub extras: Extras,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

// Tags are referenced only through `tag_ids`; there is no join table.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
