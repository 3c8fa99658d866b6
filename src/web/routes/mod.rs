pub mod product_routes;
pub mod tag_routes;
pub mod thumbnail_routes;

pub use product_routes::create_products_router;
pub use tag_routes::create_tags_router;
pub use thumbnail_routes::create_thumbnails_router;
