use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

use crate::db::store::ProductFilter;
use crate::services::CatalogError;
use crate::web::models::{
    CountResponse, CreateProductRequest, ProductQuery, ProductResponse, UpdateProductRequest,
};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn create_product_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let new_product = payload.into_new_product(&app_state.upload_config)?;
    let created = app_state.products.create(new_product).await?;
    info!(product_id = %created.id, "Product created.");
    Ok(Json(ProductResponse::from(created)))
}

async fn count_products_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<CountResponse>, AppError> {
    let filter = ProductFilter {
        limit: None,
        offset: None,
        ..ProductFilter::from(query)
    };
    let count = app_state.products.count(&filter).await?;
    Ok(Json(CountResponse { count }))
}

async fn list_products_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    list_expanded(&app_state, ProductFilter::from(query)).await
}

async fn list_visible_products_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    list_expanded(&app_state, ProductFilter::visible()).await
}

async fn list_expanded(
    app_state: &AppState,
    filter: ProductFilter,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = app_state.products.find(&filter).await?;
    let expanded = app_state.tag_associations.expand_tags(products).await?;
    Ok(Json(expanded.into_iter().map(ProductResponse::from).collect()))
}

async fn update_all_products_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let (changes, extras) = payload.into_changes(&app_state.upload_config)?;
    if !extras.is_empty() {
        return Err(AppError::InvalidInput(
            "Extension fields cannot be updated on many products at once".to_string(),
        ));
    }

    let filter = ProductFilter {
        limit: None,
        offset: None,
        ..ProductFilter::from(query)
    };
    let count = app_state.products.update_all(&filter, changes).await?;
    info!(count, "Products updated in bulk.");
    Ok(Json(CountResponse { count }))
}

async fn get_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = app_state
        .products
        .get_by_id(&id)
        .await?
        .ok_or_else(|| CatalogError::EntityNotFound(id.clone()))?;
    let expanded = app_state.tag_associations.expand_one(product).await?;
    Ok(Json(ProductResponse::from(expanded)))
}

async fn update_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<StatusCode, AppError> {
    let (mut changes, extras) = payload.into_changes(&app_state.upload_config)?;
    let _guard = app_state.locks.lock(&id).await;

    if !extras.is_empty() {
        let existing = app_state
            .products
            .get_by_id(&id)
            .await?
            .ok_or_else(|| CatalogError::EntityNotFound(id.clone()))?;
        let mut merged = existing.extras.0;
        merged.extend(extras);
        changes.extras = Some(merged);
    }

    app_state
        .products
        .update_by_id(&id, changes)
        .await?
        .ok_or_else(|| CatalogError::EntityNotFound(id.clone()))?;
    info!(product_id = %id, "Product updated.");
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<StatusCode, AppError> {
    let replacement = payload.into_new_product(&app_state.upload_config)?;
    let _guard = app_state.locks.lock(&id).await;

    app_state
        .products
        .replace_by_id(&id, replacement)
        .await?
        .ok_or_else(|| CatalogError::EntityNotFound(id.clone()))?;
    info!(product_id = %id, "Product replaced.");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let _guard = app_state.locks.lock(&id).await;

    let deleted = app_state
        .products
        .delete_by_id(&id)
        .await?
        .ok_or_else(|| CatalogError::EntityNotFound(id.clone()))?;
    info!(product_id = %id, "Product deleted.");

    app_state
        .thumbnails
        .reclaim_orphan(&id, &deleted.thumbnail)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_products_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/products",
            get(list_products_handler)
                .post(create_product_handler)
                .patch(update_all_products_handler),
        )
        .route("/products/count", get(count_products_handler))
        .route("/visible-products", get(list_visible_products_handler))
        .route(
            "/products/{id}",
            get(get_product_handler)
                .patch(update_product_handler)
                .put(replace_product_handler)
                .delete(delete_product_handler),
        )
}
