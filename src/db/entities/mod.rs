//! SeaORM entities for the catalog tables.

pub mod product;
pub mod tag;

pub mod prelude {
    pub use super::product::Entity as Product;
    pub use super::product::Model as ProductModel;
    pub use super::product::ActiveModel as ProductActiveModel;
    pub use super::product::Column as ProductColumn;

    pub use super::tag::Entity as Tag;
    pub use super::tag::Model as TagModel;
    pub use super::tag::ActiveModel as TagActiveModel;
    pub use super::tag::Column as TagColumn;
}
