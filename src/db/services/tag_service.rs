use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::db::entities::tag;
use crate::db::store::TagStore;

// --- Tag Store ---

/// `TagStore` backed by the `tags` table.
#[derive(Clone)]
pub struct SeaOrmTagStore {
    db: DatabaseConnection,
}

impl SeaOrmTagStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TagStore for SeaOrmTagStore {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<tag::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        tag::Entity::find()
            .filter(tag::Column::Id.is_in(ids.iter().cloned()))
            .order_by_asc(tag::Column::Name)
            .all(&self.db)
            .await
    }

    async fn find_all(&self) -> Result<Vec<tag::Model>, DbErr> {
        tag::Entity::find()
            .order_by_asc(tag::Column::Name)
            .all(&self.db)
            .await
    }

    async fn create(&self, name: String) -> Result<tag::Model, DbErr> {
        let new_tag = tag::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(name),
            created_at: Set(Utc::now()),
        };
        new_tag.insert(&self.db).await
    }
}
