// Mimi Media - product media asset management for the Mimi listing backend

pub mod config;
pub mod db;
pub mod media;
pub mod models;
pub mod routes;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
