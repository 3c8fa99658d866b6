use axum::{
    extract::{
        multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::warn;

use crate::services::asset_storage;
use crate::services::{CatalogError, StagedFile, ThumbnailCommit, UploadStager};
use crate::web::{AppError, AppState};

const THUMBNAIL_FIELD: &str = "thumbnail";

// Room for the boundary lines and part headers around the single file part.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

// --- Route Handlers ---

async fn upload_thumbnail_handler(
    State(app_state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ThumbnailCommit>, AppError> {
    let staged = stage_thumbnail_field(&app_state.stager, &mut multipart).await?;

    match app_state
        .thumbnails
        .replace_thumbnail(&product_id, &staged)
        .await
    {
        Ok(commit) => Ok(Json(commit)),
        Err(e) => {
            discard_staged(&app_state.stager, &staged).await;
            Err(e.into())
        }
    }
}

/// Streams the single `thumbnail` part to disk. Any other part is rejected.
async fn stage_thumbnail_field(
    stager: &UploadStager,
    multipart: &mut Multipart,
) -> Result<StagedFile, AppError> {
    let mut staged: Option<StagedFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if let Some(first) = &staged {
                    discard_staged(stager, first).await;
                }
                return Err(multipart_error(stager, e).into());
            }
        };

        let unexpected = match field.name() {
            Some(THUMBNAIL_FIELD) if staged.is_some() => Some(format!(
                "Expected exactly one '{THUMBNAIL_FIELD}' field"
            )),
            Some(THUMBNAIL_FIELD) => None,
            other => Some(format!(
                "Unexpected field '{}', only '{THUMBNAIL_FIELD}' is accepted",
                other.unwrap_or_default()
            )),
        };
        if let Some(message) = unexpected {
            if let Some(first) = staged.take() {
                discard_staged(stager, &first).await;
            }
            return Err(CatalogError::InvalidInput(message).into());
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let result = stager.stage(&original_name, &mime_type, field).await;
        staged = Some(result.map_err(|e| body_limit_as_too_large(stager, e))?);
    }

    staged.ok_or_else(|| {
        CatalogError::InvalidInput(format!("Missing '{THUMBNAIL_FIELD}' field")).into()
    })
}

fn multipart_error(stager: &UploadStager, e: MultipartError) -> CatalogError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        CatalogError::FileTooLarge {
            limit: stager.config().max_bytes,
        }
    } else {
        CatalogError::InvalidInput(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// The request body cap surfaces inside the part stream as an upload error.
fn body_limit_as_too_large(stager: &UploadStager, e: CatalogError) -> CatalogError {
    let hit_limit = match &e {
        CatalogError::UploadFailed(io) => io
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
            .is_some_and(|inner| inner.status() == StatusCode::PAYLOAD_TOO_LARGE),
        _ => false,
    };
    if hit_limit {
        CatalogError::FileTooLarge {
            limit: stager.config().max_bytes,
        }
    } else {
        e
    }
}

async fn discard_staged(stager: &UploadStager, staged: &StagedFile) {
    if let Err(e) = stager.discard(staged).await {
        warn!(file = %staged.generated_name, error = %e, "Failed to discard staged upload.");
    }
}

async fn serve_upload_handler(
    State(app_state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let path = asset_storage::resolve_served(&app_state.upload_config, &filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| CatalogError::FileNotFound(filename.clone()))?;

    let content_type = asset_storage::sniff_content_type(&bytes, &filename);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

// --- Router ---

pub fn create_thumbnails_router(max_upload_bytes: u64) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/products/{id}/thumbnail",
            post(upload_thumbnail_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/uploads/{filename}", get(serve_upload_handler))
}
