pub mod product_models;
pub mod tag_models;

pub use product_models::{
    CountResponse, CreateProductRequest, ProductQuery, ProductResponse, UpdateProductRequest,
};
pub use tag_models::CreateTagRequest;
