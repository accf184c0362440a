use crate::services::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// JSON body of every failed request
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {limit}")]
    PayloadTooLarge { limit: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn no_file() -> Self {
        AppError::BadRequest("No file uploaded".to_string())
    }

    pub fn unexpected_field() -> Self {
        AppError::BadRequest("Unexpected field".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse {
                    error: "File too large".to_string(),
                    message: Some(format!(
                        "The uploaded file exceeds the {} size limit",
                        limit
                    )),
                },
            ),
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                internal()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, ErrorResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("Internal server error"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let plain = serde_json::to_value(ErrorResponse::new("No file uploaded")).unwrap();
        assert_eq!(plain, serde_json::json!({ "error": "No file uploaded" }));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::no_file().into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PayloadTooLarge {
                limit: "50MB".to_string()
            }
            .into_response()
            .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::Storage(StorageError::Io(std::io::Error::other("disk on fire")))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
