use axum::{extract::State, routing::get, Json, Router};
use tracing::warn;

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.catalog.store();
    let (status, database) = match store.health_check().await {
        Ok(()) => ("ok", format!("{} connected", store.backend())),
        Err(e) => {
            warn!(error = %e, "Catalog health check failed");
            ("degraded", format!("{} unreachable", store.backend()))
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
    })
}
