use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{CatalogStore, CatalogTx};
use crate::models::ImageAsset;
use crate::types::{AppError, AppResult};

const IMAGE_COLUMNS: &str = "id, product_id, storage_key, is_thumbnail, created_at";

/// Catalog backed by the `products` / `product_images` tables.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn begin(&self, product_id: i64) -> AppResult<Box<dyn CatalogTx>> {
        let mut tx = self.pool.begin().await?;

        // The product row lock serializes all image mutations for this product.
        let locked = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Err(AppError::NotFound(format!("product {}", product_id)));
        }

        Ok(Box::new(PgCatalogTx { tx, product_id }))
    }

    async fn list_images(&self, product_id: i64) -> AppResult<Vec<ImageAsset>> {
        let images = sqlx::query_as::<_, ImageAsset>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE product_id = $1 ORDER BY id ASC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> AppResult<()> {
        super::health_check(&self.pool).await?;
        Ok(())
    }
}

pub struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
    product_id: i64,
}

#[async_trait]
impl CatalogTx for PgCatalogTx {
    async fn images(&mut self) -> AppResult<Vec<ImageAsset>> {
        let images = sqlx::query_as::<_, ImageAsset>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE product_id = $1 ORDER BY id ASC"
        ))
        .bind(self.product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(images)
    }

    async fn insert_image(&mut self, storage_key: &str, is_thumbnail: bool) -> AppResult<ImageAsset> {
        let image = sqlx::query_as::<_, ImageAsset>(&format!(
            r#"
            INSERT INTO product_images (product_id, storage_key, is_thumbnail)
            VALUES ($1, $2, $3)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(self.product_id)
        .bind(storage_key)
        .bind(is_thumbnail)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(image)
    }

    async fn remove_images(&mut self, storage_key: &str) -> AppResult<Vec<ImageAsset>> {
        let removed = sqlx::query_as::<_, ImageAsset>(&format!(
            r#"
            DELETE FROM product_images
            WHERE product_id = $1 AND storage_key = $2
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(self.product_id)
        .bind(storage_key)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(removed)
    }

    async fn remove_all_images(&mut self) -> AppResult<Vec<ImageAsset>> {
        let removed = sqlx::query_as::<_, ImageAsset>(&format!(
            "DELETE FROM product_images WHERE product_id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(self.product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(removed)
    }

    async fn set_thumbnail(&mut self, image_id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE product_images SET is_thumbnail = TRUE WHERE id = $1 AND product_id = $2",
        )
        .bind(image_id)
        .bind(self.product_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("image {}", image_id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
