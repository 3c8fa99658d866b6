use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::services::upload_stager::{
    UploadConfig, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_UPLOAD_BYTES,
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    #[serde(default = "default_uploads_subdir")]
    pub uploads_subdir: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    public_dir: Option<String>,
    uploads_subdir: Option<String>,
    max_upload_bytes: Option<u64>,
    allowed_mime_types: Option<Vec<String>>,
    log_dir: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_uploads_subdir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_allowed_mime_types() -> Vec<String> {
    DEFAULT_ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ServerConfig {
    /// Loads the config file (if any), then lets environment variables override it.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    let contents = fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                    parse_partial(&contents)
                        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
                } else {
                    PartialServerConfig::default()
                }
            }
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        merge(env_config, file_config)
    }

    /// Builds the upload configuration, creating the uploads directory when missing.
    pub async fn upload_config(&self) -> std::io::Result<UploadConfig> {
        UploadConfig::prepare(
            &self.public_dir,
            &self.uploads_subdir,
            self.allowed_mime_types.clone(),
            self.max_upload_bytes,
        )
        .await
    }
}

fn parse_partial(contents: &str) -> Result<PartialServerConfig, toml::de::Error> {
    toml::from_str(contents)
}

fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<ServerConfig, String> {
    let config = ServerConfig {
        database_url: env
            .database_url
            .or(file.database_url)
            .ok_or("DATABASE_URL is required")?,
        listen_addr: env
            .listen_addr
            .or(file.listen_addr)
            .unwrap_or_else(default_listen_addr),
        public_dir: env
            .public_dir
            .or(file.public_dir)
            .unwrap_or_else(default_public_dir),
        uploads_subdir: env
            .uploads_subdir
            .or(file.uploads_subdir)
            .unwrap_or_else(default_uploads_subdir),
        max_upload_bytes: env
            .max_upload_bytes
            .or(file.max_upload_bytes)
            .unwrap_or_else(default_max_upload_bytes),
        allowed_mime_types: env
            .allowed_mime_types
            .or(file.allowed_mime_types)
            .unwrap_or_else(default_allowed_mime_types),
        log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
    };

    if config.max_upload_bytes == 0 {
        return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
    }
    Ok(config)
}
