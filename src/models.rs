use std::sync::Arc;

use crate::config::Config;
use crate::db::CatalogStore;
use crate::media::{FilenameSanitizer, MediaCatalog};
use crate::storage::AssetStore;
use crate::types::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: MediaCatalog,
    pub avatars: AvatarAssets,
}

impl AppState {
    /// Wire the asset stores from `config.media` around a catalog backend.
    pub fn new(config: Config, store: Arc<dyn CatalogStore>) -> AppResult<Self> {
        let products = AssetStore::new(config.media.upload_dir.clone())?;
        let avatars = AvatarAssets {
            store: products.scoped(&config.media.avatar_subdir)?,
            names: FilenameSanitizer::avatars(),
        };
        let catalog = MediaCatalog::new(store, products, FilenameSanitizer::products());

        Ok(Self {
            config,
            catalog,
            avatars,
        })
    }
}

/// Avatar asset class: its own sub-root and key scheme, no catalog records.
#[derive(Clone)]
pub struct AvatarAssets {
    pub store: AssetStore,
    pub names: FilenameSanitizer,
}

// Note: FromRow is needed for runtime query_as (no DATABASE_URL at compile time)

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub id: i64,
    pub product_id: i64,
    pub storage_key: String,
    pub is_thumbnail: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// API Request/Response types

/// Body of `POST /products/{id}/images`: storage keys in display order.
#[derive(Debug, serde::Deserialize)]
#[serde(transparent)]
pub struct AttachRequest {
    pub keys: Vec<String>,
}

/// Listing entry for a product image.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageSummary {
    pub key: String,
    #[serde(rename = "isThumbnail")]
    pub is_thumbnail: bool,
}

impl From<ImageAsset> for ImageSummary {
    fn from(asset: ImageAsset) -> Self {
        Self {
            key: asset.storage_key,
            is_thumbnail: asset.is_thumbnail,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct DeleteResponse {
    pub status: String,
    pub removed: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}
