use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, info, warn};

use crate::media::IncomingFile;
use crate::models::AppState;
use crate::storage::FetchedAsset;
use crate::types::{AppError, AppResult};

/// Multipart field carrying product image uploads.
const UPLOAD_FIELD: &str = "files";

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.media.max_upload_bytes;

    Router::new()
        .route("/media", post(upload_media))
        .route("/media/{key}", get(fetch_media))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// POST /media - store each multipart part under a generated key
async fn upload_media(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Vec<String>>> {
    let files = read_parts(multipart, UPLOAD_FIELD).await?;
    info!(parts = files.len(), "Media upload request received");

    let keys = state.catalog.upload(files).await?;
    Ok(Json(keys))
}

/// GET /media/{key}
async fn fetch_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let asset = state.catalog.fetch(&key).await?;
    Ok(asset_response(asset))
}

/// Collect the file parts of a multipart body named `field`. Other fields,
/// and parts without a filename, are skipped.
pub(crate) async fn read_parts(mut multipart: Multipart, field: &str) -> AppResult<Vec<IncomingFile>> {
    let mut files = Vec::new();

    while let Some(part) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Rejected multipart body");
        AppError::Validation(e.body_text())
    })? {
        if part.name() != Some(field) {
            debug!(name = ?part.name(), "Skipping multipart field");
            continue;
        }
        let Some(original_name) = part.file_name().map(str::to_string) else {
            debug!(name = field, "Skipping multipart field without filename");
            continue;
        };
        let data = part
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        files.push(IncomingFile {
            original_name: Some(original_name),
            data,
        });
    }

    Ok(files)
}

pub(crate) fn asset_response(asset: FetchedAsset) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, asset.content_type)], asset.bytes)
}
