//! Relational storage boundary for product image records.
//!
//! Every mutation happens inside a [`CatalogTx`] opened for one product. The
//! transaction holds that product's lock until it is committed or dropped, so
//! thumbnail decisions made inside it cannot race with another request for
//! the same product. Dropping a transaction without committing discards its
//! changes.

use async_trait::async_trait;

use crate::models::ImageAsset;
use crate::types::AppResult;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Open a transaction scoped to `product_id`, waiting for any other
    /// transaction on that product to finish. Fails with `NotFound` when the
    /// product does not exist.
    async fn begin(&self, product_id: i64) -> AppResult<Box<dyn CatalogTx>>;

    /// Current images of a product in creation order. Unknown products have none.
    async fn list_images(&self, product_id: i64) -> AppResult<Vec<ImageAsset>>;

    /// Short label for health reporting.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> AppResult<()>;
}

#[async_trait]
pub trait CatalogTx: Send {
    /// Images of the locked product in creation order.
    async fn images(&mut self) -> AppResult<Vec<ImageAsset>>;

    async fn insert_image(&mut self, storage_key: &str, is_thumbnail: bool) -> AppResult<ImageAsset>;

    /// Remove every record of the locked product with `storage_key`, returning them.
    async fn remove_images(&mut self, storage_key: &str) -> AppResult<Vec<ImageAsset>>;

    /// Remove every record of the locked product, returning them.
    async fn remove_all_images(&mut self) -> AppResult<Vec<ImageAsset>>;

    async fn set_thumbnail(&mut self, image_id: i64) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
