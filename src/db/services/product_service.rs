use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::entities::product::{self, Extras, TagIds};
use crate::db::store::{NewProduct, ProductChanges, ProductFilter, ProductStore};

/// `ProductStore` backed by the `products` table.
#[derive(Clone)]
pub struct SeaOrmProductStore {
    db: DatabaseConnection,
}

impl SeaOrmProductStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filter_condition(filter: &ProductFilter) -> Condition {
    let mut condition = Condition::all();
    if let Some(hidden) = filter.hidden {
        condition = condition.add(product::Column::Hidden.eq(hidden));
    }
    if let Some(category_id) = &filter.category_id {
        condition = condition.add(product::Column::CategoryId.eq(category_id.clone()));
    }
    if let Some(thumbnail) = &filter.thumbnail {
        condition = condition.add(product::Column::Thumbnail.eq(thumbnail.clone()));
    }
    condition
}

fn apply_changes(active: &mut product::ActiveModel, changes: ProductChanges) {
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(thumbnail) = changes.thumbnail {
        active.thumbnail = Set(thumbnail);
    }
    if let Some(hidden) = changes.hidden {
        active.hidden = Set(hidden);
    }
    if let Some(tag_ids) = changes.tag_ids {
        active.tag_ids = Set(TagIds(tag_ids));
    }
    if let Some(category_id) = changes.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(extras) = changes.extras {
        active.extras = Set(Extras(extras));
    }
}

fn not_updated_as_none(
    result: Result<product::Model, DbErr>,
) -> Result<Option<product::Model>, DbErr> {
    match result {
        Ok(model) => Ok(Some(model)),
        Err(DbErr::RecordNotUpdated) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ProductStore for SeaOrmProductStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<product::Model>, DbErr> {
        product::Entity::find_by_id(id).one(&self.db).await
    }

    async fn create(&self, new_product: NewProduct) -> Result<product::Model, DbErr> {
        let now = Utc::now();
        let active = product::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(new_product.name),
            thumbnail: Set(new_product.thumbnail),
            hidden: Set(new_product.hidden),
            tag_ids: Set(TagIds(new_product.tag_ids)),
            category_id: Set(new_product.category_id),
            description: Set(new_product.description),
            extras: Set(Extras(new_product.extras)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        active.insert(&self.db).await
    }

    async fn update_by_id(
        &self,
        id: &str,
        changes: ProductChanges,
    ) -> Result<Option<product::Model>, DbErr> {
        let mut active = product::ActiveModel {
            id: Set(id.to_string()),
            ..Default::default()
        };
        apply_changes(&mut active, changes);
        active.updated_at = Set(Utc::now());

        not_updated_as_none(active.update(&self.db).await)
    }

    async fn replace_by_id(
        &self,
        id: &str,
        replacement: NewProduct,
    ) -> Result<Option<product::Model>, DbErr> {
        let active = product::ActiveModel {
            id: Set(id.to_string()),
            name: Set(replacement.name),
            thumbnail: Set(replacement.thumbnail),
            hidden: Set(replacement.hidden),
            tag_ids: Set(TagIds(replacement.tag_ids)),
            category_id: Set(replacement.category_id),
            description: Set(replacement.description),
            extras: Set(Extras(replacement.extras)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        not_updated_as_none(active.update(&self.db).await)
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<product::Model>, DbErr> {
        let Some(existing) = product::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let result = product::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok((result.rows_affected > 0).then_some(existing))
    }

    async fn find(&self, filter: &ProductFilter) -> Result<Vec<product::Model>, DbErr> {
        let mut query = product::Entity::find()
            .filter(filter_condition(filter))
            .order_by_asc(product::Column::CreatedAt)
            .order_by_asc(product::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        query.all(&self.db).await
    }

    async fn count(&self, filter: &ProductFilter) -> Result<u64, DbErr> {
        product::Entity::find()
            .filter(filter_condition(filter))
            .count(&self.db)
            .await
    }

    async fn update_all(
        &self,
        filter: &ProductFilter,
        changes: ProductChanges,
    ) -> Result<u64, DbErr> {
        let mut active = <product::ActiveModel as Default>::default();
        apply_changes(&mut active, changes);
        active.updated_at = Set(Utc::now());

        let result = product::Entity::update_many()
            .set(active)
            .filter(filter_condition(filter))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
