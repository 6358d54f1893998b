use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::client::ClientError;
use crate::storage::StorageError;

#[derive(Serialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Too many attempts. Retry in {retry_after} seconds.")]
    RateLimited { retry_after: u64 },

    #[error("Compliance API error")]
    Upstream(#[from] ClientError),

    #[error("Object storage error")]
    Storage(#[from] StorageError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Rate limiter unavailable")]
    Redis(#[from] redis::RedisError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(err) => match err {
                ClientError::NotFound => StatusCode::NOT_FOUND,
                ClientError::Status { status, .. } if *status == 401 || *status == 403 => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Upstream(ClientError::NotFound) => "NOT_FOUND",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Storage(StorageError::NotFound(_)) => "OBJECT_NOT_FOUND",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Database(_) => "DB_ERROR",
            AppError::Redis(_) => "RATE_LIMITER_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Extra detail exposed to the caller. Infrastructure errors keep theirs in the logs.
    fn details(&self) -> Option<String> {
        match self {
            AppError::Validation(errors) => Some(errors.to_string()),
            AppError::Upstream(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Database(e) => tracing::error!("Database error: {}", e),
            AppError::Redis(e) => tracing::error!("Redis error: {}", e),
            AppError::Storage(e) => tracing::warn!("Object storage error: {}", e),
            AppError::Upstream(e) => tracing::warn!("Compliance API error: {}", e),
            AppError::Internal(e) => tracing::error!("Internal error: {}", e),
            _ => {}
        }

        let mut body = ErrorResponse::new(self.to_string(), self.code());
        if let Some(details) = self.details() {
            body = body.with_details(details);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_not_found_maps_to_404() {
        let err = AppError::Upstream(ClientError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn upstream_auth_failures_keep_their_status() {
        let err = AppError::Upstream(ClientError::Status {
            status: 401,
            detail: "expired".into(),
        });
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::Upstream(ClientError::Status {
            status: 500,
            detail: "boom".into(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_object_is_404() {
        let err = AppError::Storage(StorageError::NotFound("reports/a.pdf".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_message_mentions_retry() {
        let err = AppError::RateLimited { retry_after: 42 };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(err.to_string().contains("42"));
    }
}
