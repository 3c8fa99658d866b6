//! Shared test utilities.
//!
//! Every test gets its own in-memory SQLite database with the catalog tables created,
//! and its own temporary public root with an `uploads` directory inside.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tempfile::TempDir;

use crate::db::schema::create_tables;
use crate::db::services::{SeaOrmProductStore, SeaOrmTagStore};
use crate::db::entities::product;
use crate::db::store::{NewProduct, ProductChanges, ProductFilter, ProductStore};
use crate::services::upload_stager::{
    StagedFile, UploadConfig, UploadStager, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_UPLOAD_BYTES,
};

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await?;
    create_tables(&db).await?;
    Ok(db)
}

pub async fn setup_test_stores() -> Result<(Arc<SeaOrmProductStore>, Arc<SeaOrmTagStore>), DbErr> {
    let db = setup_test_db().await?;
    Ok((
        Arc::new(SeaOrmProductStore::new(db.clone())),
        Arc::new(SeaOrmTagStore::new(db)),
    ))
}

/// A public root at `<tmp>/public` with uploads at `<tmp>/public/uploads`.
///
/// Keep the returned `TempDir` alive for as long as the config is used.
pub async fn test_upload_config() -> (TempDir, Arc<UploadConfig>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = UploadConfig::prepare(
        dir.path().join("public"),
        "uploads",
        DEFAULT_ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        DEFAULT_MAX_UPLOAD_BYTES,
    )
    .await
    .expect("prepare upload config");
    (dir, Arc::new(config))
}

/// Creates a product with defaults for everything but the name.
pub fn new_product(name: &str) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn png_bytes() -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0, 0, 1, 0, 0, 0, 1]);
    data
}

pub fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0xFF, 0xD9]
}

pub fn single_chunk(data: Vec<u8>) -> impl Stream<Item = Result<Bytes, io::Error>> {
    stream::iter(vec![Ok(Bytes::from(data))])
}

pub async fn stage_jpeg(stager: &UploadStager, name: &str) -> StagedFile {
    stager
        .stage(name, "image/jpeg", single_chunk(jpeg_bytes()))
        .await
        .expect("stage jpeg")
}

/// A product store whose writes of existing rows always fail. Reads and inserts go through.
pub struct FailingUpdateStore {
    pub inner: Arc<SeaOrmProductStore>,
}

fn write_refused() -> DbErr {
    DbErr::Custom("write refused".to_string())
}

#[async_trait]
impl ProductStore for FailingUpdateStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<product::Model>, DbErr> {
        self.inner.get_by_id(id).await
    }

    async fn create(&self, product: NewProduct) -> Result<product::Model, DbErr> {
        self.inner.create(product).await
    }

    async fn update_by_id(
        &self,
        _id: &str,
        _changes: ProductChanges,
    ) -> Result<Option<product::Model>, DbErr> {
        Err(write_refused())
    }

    async fn replace_by_id(
        &self,
        _id: &str,
        _product: NewProduct,
    ) -> Result<Option<product::Model>, DbErr> {
        Err(write_refused())
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<product::Model>, DbErr> {
        self.inner.delete_by_id(id).await
    }

    async fn find(&self, filter: &ProductFilter) -> Result<Vec<product::Model>, DbErr> {
        self.inner.find(filter).await
    }

    async fn count(&self, filter: &ProductFilter) -> Result<u64, DbErr> {
        self.inner.count(filter).await
    }

    async fn update_all(
        &self,
        _filter: &ProductFilter,
        _changes: ProductChanges,
    ) -> Result<u64, DbErr> {
        Err(write_refused())
    }
}
