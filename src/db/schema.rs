//! Table bootstrap from the entity definitions.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema};
use tracing::debug;

use crate::db::entities::prelude::{Product, Tag};

/// Creates the `products` and `tags` tables when they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut product_table = schema.create_table_from_entity(Product);
    product_table.if_not_exists();
    let mut tag_table = schema.create_table_from_entity(Tag);
    tag_table.if_not_exists();

    db.execute(builder.build(&product_table)).await?;
    db.execute(builder.build(&tag_table)).await?;

    debug!(backend = ?builder, "Ensured catalog tables exist.");
    Ok(())
}
