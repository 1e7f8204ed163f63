// Error taxonomy shared by the sanitizer, asset store and catalog

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or unsafe filename, empty batch, unknown storage key.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A storage key resolved outside the configured root.
    #[error("Path violation: {0}")]
    PathViolation(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Referential or uniqueness failure reported by the relational store.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.kind() {
                sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::CheckViolation => {
                    let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                    return AppError::ConstraintViolation(constraint);
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::PathViolation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::Io(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PathViolation(_) => "PATH_VIOLATION",
            AppError::Io(_) => "IO_FAILURE",
            AppError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
