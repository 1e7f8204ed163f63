//! In-process catalog used when no database is configured, and by tests.
//!
//! A single async mutex guards the whole catalog; a transaction owns the
//! guard for its lifetime and works on a staged copy that replaces the shared
//! state only on commit.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{CatalogStore, CatalogTx};
use crate::models::ImageAsset;
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct CatalogState {
    products: BTreeSet<i64>,
    images: Vec<ImageAsset>,
    next_image_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `product_id` known to the catalog.
    pub async fn register_product(&self, product_id: i64) {
        let mut state = self.state.lock().await;
        state.products.insert(product_id);
    }

    /// Forget a product. Its image records go with it; files are left alone.
    pub async fn remove_product(&self, product_id: i64) {
        let mut state = self.state.lock().await;
        state.products.remove(&product_id);
        state.images.retain(|image| image.product_id != product_id);
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn begin(&self, product_id: i64) -> AppResult<Box<dyn CatalogTx>> {
        let guard = self.state.clone().lock_owned().await;
        if !guard.products.contains(&product_id) {
            return Err(AppError::NotFound(format!("product {}", product_id)));
        }

        let staged = guard.clone();
        Ok(Box::new(MemoryCatalogTx {
            guard,
            staged,
            product_id,
        }))
    }

    async fn list_images(&self, product_id: i64) -> AppResult<Vec<ImageAsset>> {
        let state = self.state.lock().await;
        Ok(state.product_images(product_id))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

impl CatalogState {
    fn product_images(&self, product_id: i64) -> Vec<ImageAsset> {
        // Ids are handed out in increasing order, so vector order is creation order.
        self.images
            .iter()
            .filter(|image| image.product_id == product_id)
            .cloned()
            .collect()
    }
}

pub struct MemoryCatalogTx {
    guard: OwnedMutexGuard<CatalogState>,
    staged: CatalogState,
    product_id: i64,
}

#[async_trait]
impl CatalogTx for MemoryCatalogTx {
    async fn images(&mut self) -> AppResult<Vec<ImageAsset>> {
        Ok(self.staged.product_images(self.product_id))
    }

    async fn insert_image(&mut self, storage_key: &str, is_thumbnail: bool) -> AppResult<ImageAsset> {
        if self.staged.images.iter().any(|image| image.storage_key == storage_key) {
            return Err(AppError::ConstraintViolation(
                "product_images_storage_key_key".to_string(),
            ));
        }
        if is_thumbnail
            && self
                .staged
                .images
                .iter()
                .any(|image| image.product_id == self.product_id && image.is_thumbnail)
        {
            return Err(AppError::ConstraintViolation(
                "product_images_one_thumbnail".to_string(),
            ));
        }

        self.staged.next_image_id += 1;
        let image = ImageAsset {
            id: self.staged.next_image_id,
            product_id: self.product_id,
            storage_key: storage_key.to_string(),
            is_thumbnail,
            created_at: chrono::Utc::now(),
        };
        self.staged.images.push(image.clone());
        Ok(image)
    }

    async fn remove_images(&mut self, storage_key: &str) -> AppResult<Vec<ImageAsset>> {
        let product_id = self.product_id;
        let (removed, kept): (Vec<ImageAsset>, Vec<ImageAsset>) = std::mem::take(&mut self.staged.images)
            .into_iter()
            .partition(|image| image.product_id == product_id && image.storage_key == storage_key);
        self.staged.images = kept;
        Ok(removed)
    }

    async fn remove_all_images(&mut self) -> AppResult<Vec<ImageAsset>> {
        let product_id = self.product_id;
        let (removed, kept): (Vec<ImageAsset>, Vec<ImageAsset>) = std::mem::take(&mut self.staged.images)
            .into_iter()
            .partition(|image| image.product_id == product_id);
        self.staged.images = kept;
        Ok(removed)
    }

    async fn set_thumbnail(&mut self, image_id: i64) -> AppResult<()> {
        let product_id = self.product_id;
        let image = self
            .staged
            .images
            .iter_mut()
            .find(|image| image.id == image_id && image.product_id == product_id)
            .ok_or_else(|| AppError::NotFound(format!("image {}", image_id)))?;
        image.is_thumbnail = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryCatalogTx { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_unknown_product_is_not_found() {
        let store = MemoryCatalogStore::new();
        let err = store.begin(42).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryCatalogStore::new();
        store.register_product(1).await;

        let mut tx = store.begin(1).await.unwrap();
        tx.insert_image("a.png", true).await.unwrap();
        drop(tx);

        assert!(store.list_images(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryCatalogStore::new();
        store.register_product(1).await;

        let mut tx = store.begin(1).await.unwrap();
        tx.insert_image("a.png", true).await.unwrap();
        tx.insert_image("b.png", false).await.unwrap();
        tx.commit().await.unwrap();

        let keys: Vec<_> = store
            .list_images(1)
            .await
            .unwrap()
            .into_iter()
            .map(|image| image.storage_key)
            .collect();
        assert_eq!(keys, vec!["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn test_storage_key_is_globally_unique() {
        let store = MemoryCatalogStore::new();
        store.register_product(1).await;
        store.register_product(2).await;

        let mut tx = store.begin(1).await.unwrap();
        tx.insert_image("shared.png", true).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(2).await.unwrap();
        let err = tx.insert_image("shared.png", true).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_second_thumbnail_is_rejected() {
        let store = MemoryCatalogStore::new();
        store.register_product(1).await;

        let mut tx = store.begin(1).await.unwrap();
        tx.insert_image("a.png", true).await.unwrap();
        let err = tx.insert_image("b.png", true).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_remove_product_drops_its_images() {
        let store = MemoryCatalogStore::new();
        store.register_product(1).await;
        let mut tx = store.begin(1).await.unwrap();
        tx.insert_image("a.png", true).await.unwrap();
        tx.commit().await.unwrap();

        store.remove_product(1).await;

        assert!(store.list_images(1).await.unwrap().is_empty());
        assert!(store.begin(1).await.is_err());
    }
}
