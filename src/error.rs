use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::report::WebResponse;
use crate::services::photo_store::PhotoStoreError;

/// Error type for HTTP handlers, rendered in the standard response envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Photo must be a JPEG, PNG or WebP image")]
    UnsupportedMedia,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Photo staging error: {0}")]
    PhotoStore(#[from] PhotoStoreError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Database(_) | ApiError::PhotoStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Upper-case reason phrase used in the envelope's `status` field.
pub fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("UNKNOWN").to_uppercase()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = WebResponse::<()> {
            code: status.as_u16(),
            status: status_text(status),
            message: None,
            error: Some(message),
            data: None,
            pagination: None,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::UnsupportedMedia.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(StatusCode::NOT_FOUND), "NOT FOUND");
        assert_eq!(status_text(StatusCode::CREATED), "CREATED");
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let response = ApiError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
