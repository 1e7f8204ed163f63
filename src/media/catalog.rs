//! Media Catalog
//!
//! Keeps the product image records and the asset store consistent:
//!
//! - a record is only created for a key whose file is already stored
//! - records are removed (and committed) before their file is deleted, so a
//!   failure in between leaves an unreferenced file, never a broken link
//! - each product has at most one thumbnail; removing it promotes the
//!   oldest remaining image
//!
//! Thumbnail decisions are made inside a per-product transaction. Attach and
//! file deletion for the same key are ordered by [`KeyLocks`], which is taken
//! before the transaction and held until the file operation is done.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{store_uploads, FilenameSanitizer, IncomingFile, KeyLocks};
use crate::db::CatalogStore;
use crate::models::ImageAsset;
use crate::storage::{AssetStore, FetchedAsset};
use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct MediaCatalog {
    store: Arc<dyn CatalogStore>,
    assets: AssetStore,
    names: FilenameSanitizer,
    key_locks: KeyLocks,
}

impl MediaCatalog {
    pub fn new(store: Arc<dyn CatalogStore>, assets: AssetStore, names: FilenameSanitizer) -> Self {
        Self {
            store,
            assets,
            names,
            key_locks: KeyLocks::new(),
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    /// Persist raw uploads and return their generated keys.
    pub async fn upload(&self, files: Vec<IncomingFile>) -> AppResult<Vec<String>> {
        store_uploads(&self.assets, &self.names, files).await
    }

    /// Read a stored file by a client-supplied key.
    pub async fn fetch(&self, key: &str) -> AppResult<FetchedAsset> {
        ensure_valid_key(key)?;
        self.assets.fetch(key).await
    }

    /// Bind stored keys to a product, in order.
    ///
    /// The first new image becomes the thumbnail only when the product has
    /// none yet.
    pub async fn attach(&self, product_id: i64, keys: &[String]) -> AppResult<Vec<ImageAsset>> {
        if keys.is_empty() {
            return Err(AppError::Validation("no storage keys given".to_string()));
        }

        let keys: Vec<&str> = keys.iter().map(|key| key.trim()).collect();
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            ensure_valid_key(key)?;
            if !seen.insert(*key) {
                return Err(AppError::Validation(format!("duplicate storage key {:?}", key)));
            }
        }

        let _keys_held = self.key_locks.lock(keys.iter().copied()).await;
        let mut tx = self.store.begin(product_id).await?;
        for key in &keys {
            if !self.assets.exists(key).await? {
                return Err(AppError::Validation(format!("no stored file for key {:?}", key)));
            }
        }
        let mut needs_thumbnail = !tx.images().await?.iter().any(|image| image.is_thumbnail);

        let mut created = Vec::with_capacity(keys.len());
        for key in keys {
            let image = tx.insert_image(key, needs_thumbnail).await?;
            needs_thumbnail = false;
            created.push(image);
        }
        tx.commit().await?;

        info!(
            product_id,
            count = created.len(),
            thumbnail = created.iter().any(|image| image.is_thumbnail),
            "Attached images"
        );
        Ok(created)
    }

    /// Images of a product in creation order.
    pub async fn list_by_product(&self, product_id: i64) -> AppResult<Vec<ImageAsset>> {
        self.store.list_images(product_id).await
    }

    /// Remove the image `key` from a product, then its file.
    ///
    /// Returns the number of records removed.
    pub async fn delete_by_key(&self, product_id: i64, key: &str) -> AppResult<usize> {
        ensure_valid_key(key)?;

        let _key_held = self.key_locks.lock([key]).await;
        let mut tx = self.store.begin(product_id).await?;
        let removed = tx.remove_images(key).await?;
        if removed.is_empty() {
            return Err(AppError::NotFound(format!(
                "image {} of product {}",
                key, product_id
            )));
        }

        if removed.iter().any(|image| image.is_thumbnail) {
            let remaining = tx.images().await?;
            if !remaining.iter().any(|image| image.is_thumbnail) {
                if let Some(next) = remaining.iter().min_by_key(|image| image.id) {
                    tx.set_thumbnail(next.id).await?;
                    debug!(product_id, key = %next.storage_key, "Promoted thumbnail");
                }
            }
        }
        tx.commit().await?;

        info!(product_id, key, removed = removed.len(), "Deleted image");
        self.discard_file(product_id, key).await;
        Ok(removed.len())
    }

    /// Remove every image of a product, then their files.
    pub async fn purge_product(&self, product_id: i64) -> AppResult<usize> {
        let _keys_held = self.key_locks.lock_all().await;
        let mut tx = self.store.begin(product_id).await?;
        let removed = tx.remove_all_images().await?;
        tx.commit().await?;

        info!(product_id, removed = removed.len(), "Purged product images");
        join_all(
            removed
                .iter()
                .map(|image| self.discard_file(product_id, &image.storage_key)),
        )
        .await;
        Ok(removed.len())
    }

    /// File removal after a committed record deletion. Failure leaves an
    /// orphaned file and is not reported to the caller.
    async fn discard_file(&self, product_id: i64, key: &str) {
        if let Err(e) = self.assets.delete(key).await {
            warn!(product_id, key, error = %e, "Failed to delete image file, leaving orphan");
        }
    }
}

fn ensure_valid_key(key: &str) -> AppResult<()> {
    if FilenameSanitizer::validate(Some(key)) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid storage key {:?}", key)))
    }
}
