//! sea-orm implementations of the Record Store traits in `db::store`.
//!
//! Each sub-module owns one table; the stores are re-exported here so callers can use
//! `crate::db::services::SeaOrmProductStore` directly.

pub mod product_service;
pub mod tag_service;

pub use product_service::SeaOrmProductStore;
pub use tag_service::SeaOrmTagStore;
