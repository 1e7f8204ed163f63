use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// When unset the catalog runs in memory (single process, nothing persisted).
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Products known to the in-memory catalog at startup.
    pub memory_product_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Root directory for product media. Every stored file resolves beneath it.
    pub upload_dir: PathBuf,
    /// Sub-root (relative to `upload_dir`) holding avatar assets.
    pub avatar_subdir: String,
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            avatar_subdir: "avatars".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let media_defaults = MediaConfig::default();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
                memory_product_ids: env::var("MEMORY_PRODUCT_IDS")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::parse::<i64>)
                    .collect::<Result<Vec<_>, _>>()?,
            },
            media: MediaConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(media_defaults.upload_dir),
                avatar_subdir: env::var("AVATAR_SUBDIR")
                    .unwrap_or(media_defaults.avatar_subdir),
                max_upload_bytes: match env::var("MAX_UPLOAD_BYTES") {
                    Ok(value) => value.parse()?,
                    Err(_) => media_defaults.max_upload_bytes,
                },
            },
        })
    }
}
