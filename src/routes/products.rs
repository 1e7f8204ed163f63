use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use tracing::info;

use crate::models::{AppState, AttachRequest, DeleteResponse, ImageAsset, ImageSummary};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/products/{id}/images",
            get(list_images).post(attach_images).delete(purge_images),
        )
        .route("/products/{id}/images/{key}", delete(delete_image))
        .with_state(state)
}

/// POST /products/{id}/images - body is an ordered list of storage keys
async fn attach_images(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(request): Json<AttachRequest>,
) -> AppResult<Json<Vec<ImageAsset>>> {
    info!(product_id, count = request.keys.len(), "Attach images request received");

    let created = state.catalog.attach(product_id, &request.keys).await?;
    Ok(Json(created))
}

/// GET /products/{id}/images
async fn list_images(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Vec<ImageSummary>>> {
    let images = state.catalog.list_by_product(product_id).await?;
    Ok(Json(images.into_iter().map(ImageSummary::from).collect()))
}

/// DELETE /products/{id}/images/{key}
async fn delete_image(
    State(state): State<AppState>,
    Path((product_id, key)): Path<(i64, String)>,
) -> AppResult<Json<DeleteResponse>> {
    let removed = state.catalog.delete_by_key(product_id, &key).await?;
    Ok(Json(DeleteResponse {
        status: "deleted".to_string(),
        removed,
    }))
}

/// DELETE /products/{id}/images - drop every image of the product
async fn purge_images(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<DeleteResponse>> {
    let removed = state.catalog.purge_product(product_id).await?;
    Ok(Json(DeleteResponse {
        status: "purged".to_string(),
        removed,
    }))
}
