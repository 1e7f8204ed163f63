use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::media::{asset_response, read_parts};
use crate::media::{store_uploads, FilenameSanitizer};
use crate::models::AppState;
use crate::types::{AppError, AppResult};

/// Multipart field carrying avatar uploads.
const UPLOAD_FIELD: &str = "file";

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.media.max_upload_bytes;

    Router::new()
        .route("/avatars", post(upload_avatars))
        .route("/avatars/{key}", get(fetch_avatar))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// POST /avatars
async fn upload_avatars(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Vec<String>>> {
    let files = read_parts(multipart, UPLOAD_FIELD).await?;
    info!(parts = files.len(), "Avatar upload request received");

    let keys = store_uploads(&state.avatars.store, &state.avatars.names, files).await?;
    Ok(Json(keys))
}

/// GET /avatars/{key}
async fn fetch_avatar(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !FilenameSanitizer::validate(Some(&key)) {
        return Err(AppError::Validation(format!("invalid storage key {:?}", key)));
    }

    let asset = state.avatars.store.fetch(&key).await?;
    Ok(asset_response(asset))
}
