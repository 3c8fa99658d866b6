use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use std::sync::Arc;

use crate::db::entities::tag;
use crate::web::models::{product_models::validate_name, CreateTagRequest};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn create_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<tag::Model>), AppError> {
    validate_name(&payload.name)?;
    let tag_model = app_state.tags.create(payload.name).await?;
    Ok((StatusCode::CREATED, Json(tag_model)))
}

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<tag::Model>>, AppError> {
    let tags = app_state.tags.find_all().await?;
    Ok(Json(tags))
}

async fn add_tag_to_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path((product_id, tag_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    app_state
        .tag_associations
        .add_tag(&product_id, &tag_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_tag_from_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path((product_id, tag_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    app_state
        .tag_associations
        .remove_tag(&product_id, &tag_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags", get(list_tags_handler).post(create_tag_handler))
        .route(
            "/products/{id}/tags/{tag_id}",
            patch(add_tag_to_product_handler).delete(remove_tag_from_product_handler),
        )
}
