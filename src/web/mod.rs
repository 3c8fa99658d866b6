use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::store::{ProductStore, TagStore};
use crate::services::{
    EntityLocks, TagAssociationService, ThumbnailService, UploadConfig, UploadStager,
};

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

pub struct AppState {
    pub products: Arc<dyn ProductStore>,
    pub tags: Arc<dyn TagStore>,
    pub stager: UploadStager,
    pub thumbnails: ThumbnailService,
    pub tag_associations: TagAssociationService,
    pub locks: EntityLocks,
    pub upload_config: Arc<UploadConfig>,
}

impl AppState {
    pub fn new(
        products: Arc<dyn ProductStore>,
        tags: Arc<dyn TagStore>,
        upload_config: Arc<UploadConfig>,
    ) -> Self {
        // One lock map shared by every service so all writers of a product queue together.
        let locks = EntityLocks::new();
        Self {
            stager: UploadStager::new(upload_config.clone()),
            thumbnails: ThumbnailService::new(products.clone(), upload_config.clone(), locks.clone()),
            tag_associations: TagAssociationService::new(products.clone(), tags.clone(), locks.clone()),
            products,
            tags,
            locks,
            upload_config,
        }
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    products: Arc<dyn ProductStore>,
    tags: Arc<dyn TagStore>,
    upload_config: Arc<UploadConfig>,
) -> Router {
    let max_upload_bytes = upload_config.max_bytes;
    let app_state = Arc::new(AppState::new(products, tags, upload_config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .merge(routes::create_products_router())
        .merge(routes::create_thumbnails_router(max_upload_bytes))
        .merge(routes::create_tags_router())
        .with_state(app_state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tokio::fs;
    use tower::ServiceExt;

    use crate::db::services::{SeaOrmProductStore, SeaOrmTagStore};
    use crate::test_utils::{
        jpeg_bytes, png_bytes, setup_test_stores, test_upload_config, FailingUpdateStore,
    };

    const BOUNDARY: &str = "catalog-test-boundary";

    struct TestApp {
        _dir: tempfile::TempDir,
        router: Router,
        products: Arc<SeaOrmProductStore>,
        tags: Arc<SeaOrmTagStore>,
        config: Arc<UploadConfig>,
    }

    async fn setup() -> TestApp {
        let (dir, config) = test_upload_config().await;
        let (products, tags) = setup_test_stores().await.unwrap();
        let router = create_axum_router(products.clone(), tags.clone(), config.clone());
        TestApp {
            _dir: dir,
            router,
            products,
            tags,
            config,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
        app.router.clone().oneshot(request).await.unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    /// Encodes `(field name, file name, content type, bytes)` parts as multipart/form-data.
    fn multipart_body(parts: &[(&str, &str, &str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content_type, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn raw_multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn multipart_request(uri: &str, parts: &[(&str, &str, &str, Vec<u8>)]) -> Request<Body> {
        raw_multipart_request(uri, multipart_body(parts))
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn create_product(app: &TestApp, body: Value) -> String {
        let response = send(app, json_request("POST", "/products", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["id"].as_str().unwrap().to_string()
    }

    async fn uploads_count(app: &TestApp) -> usize {
        let mut count = 0;
        let mut entries = fs::read_dir(&app.config.uploads_root).await.unwrap();
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup().await;
        let response = send(&app, empty_request("GET", "/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    #[tokio::test]
    async fn test_product_crud_flow() {
        let app = setup().await;
        let id = create_product(&app, json!({ "name": "Lamp", "price": 20, "categoryId": "c1" })).await;

        let response = send(&app, empty_request("GET", &format!("/products/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let product = body_json(response).await;
        assert_eq!(product["name"], "Lamp");
        assert_eq!(product["price"], 20);
        assert_eq!(product["thumbnail"], "");
        assert_eq!(product["hidden"], false);
        assert_eq!(product["tags"], json!([]));

        let patch = json_request("PATCH", &format!("/products/{id}"), json!({ "name": "Desk Lamp", "color": "red" }));
        assert_eq!(send(&app, patch).await.status(), StatusCode::NO_CONTENT);
        let stored = app.products.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Desk Lamp");
        assert_eq!(stored.extras.0["price"], json!(20));
        assert_eq!(stored.extras.0["color"], json!("red"));

        let put = json_request("PUT", &format!("/products/{id}"), json!({ "name": "Floor Lamp" }));
        assert_eq!(send(&app, put).await.status(), StatusCode::NO_CONTENT);
        let stored = app.products.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Floor Lamp");
        assert_eq!(stored.category_id, None);
        assert!(stored.extras.0.is_empty());

        let response = send(&app, empty_request("DELETE", &format!("/products/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, empty_request("GET", &format!("/products/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payloads() {
        let app = setup().await;

        let blank = send(&app, json_request("POST", "/products", json!({ "name": "" }))).await;
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let dup = json!({ "name": "Chair", "tagIds": ["t1", "t1"] });
        assert_eq!(send(&app, json_request("POST", "/products", dup)).await.status(), StatusCode::BAD_REQUEST);

        let escaping = json!({ "name": "Chair", "thumbnail": "../../etc/passwd" });
        assert_eq!(send(&app, json_request("POST", "/products", escaping)).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_product_routes_return_not_found() {
        let app = setup().await;
        let patch = json_request("PATCH", "/products/missing", json!({ "hidden": true }));
        assert_eq!(send(&app, patch).await.status(), StatusCode::NOT_FOUND);
        let put = json_request("PUT", "/products/missing", json!({ "name": "X" }));
        assert_eq!(send(&app, put).await.status(), StatusCode::NOT_FOUND);
        let delete = empty_request("DELETE", "/products/missing");
        assert_eq!(send(&app, delete).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_counting_and_bulk_update() {
        let app = setup().await;
        let tag = app.tags.create("sale".to_string()).await.unwrap();
        create_product(&app, json!({ "name": "A", "tagIds": [tag.id.clone(), "dangling"] })).await;
        create_product(&app, json!({ "name": "B", "hidden": true })).await;
        create_product(&app, json!({ "name": "C", "categoryId": "c1" })).await;

        let visible = body_json(send(&app, empty_request("GET", "/visible-products")).await).await;
        let visible = visible.as_array().unwrap();
        let mut names: Vec<_> = visible.iter().map(|p| p["name"].as_str().unwrap()).collect();
        names.sort();
        assert_eq!(names, vec!["A", "C"]);
        let a = visible.iter().find(|p| p["name"] == "A").unwrap();
        assert_eq!(a["tagIds"], json!([tag.id.clone(), "dangling"]));
        assert_eq!(a["tags"].as_array().unwrap().len(), 1);
        assert_eq!(a["tags"][0]["id"], json!(tag.id));
        assert_eq!(a["tags"][0]["name"], "sale");

        let count = body_json(send(&app, empty_request("GET", "/products/count?hidden=true")).await).await;
        assert_eq!(count, json!({ "count": 1 }));

        let page = body_json(send(&app, empty_request("GET", "/products?limit=2")).await).await;
        assert_eq!(page.as_array().unwrap().len(), 2);
        let rest = body_json(send(&app, empty_request("GET", "/products?limit=2&offset=2")).await).await;
        assert_eq!(rest.as_array().unwrap().len(), 1);

        let bulk = json_request("PATCH", "/products?categoryId=c1", json!({ "hidden": true }));
        let updated = body_json(send(&app, bulk).await).await;
        assert_eq!(updated, json!({ "count": 1 }));
        let count = body_json(send(&app, empty_request("GET", "/products/count?hidden=true")).await).await;
        assert_eq!(count, json!({ "count": 2 }));

        let with_extras = json_request("PATCH", "/products", json!({ "color": "red" }));
        assert_eq!(send(&app, with_extras).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tag_association_routes() {
        let app = setup().await;
        let id = create_product(&app, json!({ "name": "Shelf" })).await;
        let uri = format!("/products/{id}/tags/t1");

        assert_eq!(send(&app, empty_request("PATCH", &uri)).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&app, empty_request("PATCH", &uri)).await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(send(&app, empty_request("DELETE", &uri)).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&app, empty_request("DELETE", &uri)).await.status(), StatusCode::NOT_FOUND);

        let unknown = send(&app, empty_request("PATCH", "/products/missing/tags/t1")).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tag_management_routes() {
        let app = setup().await;
        let created = send(&app, json_request("POST", "/tags", json!({ "name": "new" }))).await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let tags = body_json(send(&app, empty_request("GET", "/tags")).await).await;
        assert_eq!(tags.as_array().unwrap().len(), 1);
        assert_eq!(tags[0]["name"], "new");
    }

    #[tokio::test]
    async fn test_thumbnail_upload_replaces_and_serves() {
        let app = setup().await;
        fs::write(app.config.uploads_root.join("old.png"), png_bytes()).await.unwrap();
        let id = create_product(&app, json!({ "name": "Vase", "thumbnail": "uploads/old.png" })).await;

        let request = multipart_request(
            &format!("/products/{id}/thumbnail"),
            &[("thumbnail", "new photo.jpg", "image/jpeg", jpeg_bytes())],
        );
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let commit = body_json(response).await;
        let filename = commit["filename"].as_str().unwrap().to_string();
        assert!(filename.ends_with("-new_photo.jpg"));
        assert_eq!(commit["path"], format!("uploads/{filename}"));

        assert!(!app.config.uploads_root.join("old.png").exists());
        let stored = app.products.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.thumbnail, format!("uploads/{filename}"));

        let served = send(&app, empty_request("GET", &format!("/uploads/{filename}"))).await;
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(served.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(body_bytes(served).await, jpeg_bytes());
    }

    #[tokio::test]
    async fn test_thumbnail_upload_rejections_leave_no_files() {
        let app = setup().await;
        let id = create_product(&app, json!({ "name": "Rug" })).await;
        let uri = format!("/products/{id}/thumbnail");

        let wrong_type = multipart_request(&uri, &[("thumbnail", "a.gif", "image/gif", b"GIF89a".to_vec())]);
        assert_eq!(send(&app, wrong_type).await.status(), StatusCode::BAD_REQUEST);

        let too_big = vec![0u8; (app.config.max_bytes + 1) as usize];
        let oversized = multipart_request(&uri, &[("thumbnail", "big.png", "image/png", too_big)]);
        assert_eq!(send(&app, oversized).await.status(), StatusCode::BAD_REQUEST);

        let other_field = multipart_request(&uri, &[("other", "a.png", "image/png", png_bytes())]);
        assert_eq!(send(&app, other_field).await.status(), StatusCode::BAD_REQUEST);

        let missing = multipart_request(&uri, &[]);
        assert_eq!(send(&app, missing).await.status(), StatusCode::BAD_REQUEST);

        let twice = multipart_request(
            &uri,
            &[
                ("thumbnail", "a.png", "image/png", png_bytes()),
                ("thumbnail", "b.png", "image/png", png_bytes()),
            ],
        );
        assert_eq!(send(&app, twice).await.status(), StatusCode::BAD_REQUEST);

        let unknown = multipart_request(
            "/products/missing/thumbnail",
            &[("thumbnail", "a.png", "image/png", png_bytes())],
        );
        assert_eq!(send(&app, unknown).await.status(), StatusCode::NOT_FOUND);

        assert_eq!(uploads_count(&app).await, 0);
        let stored = app.products.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.thumbnail, "");
    }

    #[tokio::test]
    async fn test_delete_reclaims_thumbnail() {
        let app = setup().await;
        let file = app.config.uploads_root.join("1-chair.png");
        fs::write(&file, png_bytes()).await.unwrap();
        let id = create_product(&app, json!({ "name": "Chair", "thumbnail": "uploads/1-chair.png" })).await;

        let response = send(&app, empty_request("DELETE", &format!("/products/{id}"))).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_serve_upload_rejects_missing_and_traversal() {
        let app = setup().await;
        fs::write(app.config.public_root.join("secret.txt"), b"nope").await.unwrap();

        let missing = send(&app, empty_request("GET", "/uploads/none.png")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let traversal = send(&app, empty_request("GET", "/uploads/..%2Fsecret.txt")).await;
        assert_eq!(traversal.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_thumbnail_upload_rejects_extra_parts_before_reading_them() {
        let app = setup().await;
        let id = create_product(&app, json!({ "name": "Frame" })).await;
        let large_note = vec![b'n'; 100_000];
        let near_limit = vec![0u8; 990_000];

        let request = multipart_request(
            &format!("/products/{id}/thumbnail"),
            &[
                ("note", "note.txt", "text/plain", large_note),
                ("thumbnail", "a.jpg", "image/jpeg", near_limit),
            ],
        );
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("Unexpected field 'note'"), "{error}");
        assert_eq!(uploads_count(&app).await, 0);
    }

    #[tokio::test]
    async fn test_thumbnail_upload_near_limit_is_accepted() {
        let app = setup().await;
        let id = create_product(&app, json!({ "name": "Poster" })).await;
        let mut data = jpeg_bytes();
        data.resize(app.config.max_bytes as usize, 0);

        let request = multipart_request(
            &format!("/products/{id}/thumbnail"),
            &[("thumbnail", "poster.jpg", "image/jpeg", data)],
        );
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(uploads_count(&app).await, 1);
    }

    #[tokio::test]
    async fn test_oversized_request_body_is_reported_as_file_too_large() {
        let app = setup().await;
        let id = create_product(&app, json!({ "name": "Mirror" })).await;

        // Preamble bytes before the first boundary count against the body cap only.
        let mut body = vec![b'x'; (app.config.max_bytes + 128 * 1024) as usize];
        body.extend_from_slice(b"\r\n");
        body.extend(multipart_body(&[("thumbnail", "m.png", "image/png", png_bytes())]));
        let response = send(&app, raw_multipart_request(&format!("/products/{id}/thumbnail"), body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("byte limit"), "{error}");
        assert_eq!(uploads_count(&app).await, 0);
    }

    #[tokio::test]
    async fn test_failed_thumbnail_update_keeps_previous_and_discards_upload() {
        let (_dir, config) = test_upload_config().await;
        let (products, tags) = setup_test_stores().await.unwrap();
        let failing = Arc::new(FailingUpdateStore { inner: products.clone() });
        let router = create_axum_router(failing, tags, config.clone());

        fs::write(config.uploads_root.join("old.png"), png_bytes()).await.unwrap();
        let mut input = crate::test_utils::new_product("Clock");
        input.thumbnail = "uploads/old.png".to_string();
        let product = products.create(input).await.unwrap();

        let request = multipart_request(
            &format!("/products/{}/thumbnail", product.id),
            &[("thumbnail", "clock.jpg", "image/jpeg", jpeg_bytes())],
        );
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let stored = products.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.thumbnail, "uploads/old.png");
        assert!(config.uploads_root.join("old.png").exists());

        let mut entries = fs::read_dir(&config.uploads_root).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["old.png"]);
    }

    #[tokio::test]
    async fn test_shared_thumbnail_survives_until_last_reference_is_deleted() {
        let app = setup().await;
        let file = app.config.uploads_root.join("1-shared.png");
        fs::write(&file, png_bytes()).await.unwrap();
        let first = create_product(&app, json!({ "name": "One", "thumbnail": "uploads/1-shared.png" })).await;
        let second = create_product(&app, json!({ "name": "Two", "thumbnail": "uploads/1-shared.png" })).await;

        let response = send(&app, empty_request("DELETE", &format!("/products/{first}"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(file.exists());

        let response = send(&app, empty_request("DELETE", &format!("/products/{second}"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!file.exists());
    }
}
