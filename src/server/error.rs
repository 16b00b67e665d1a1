use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error returned by the HTTP handlers. Bodies stay minimal: an `error`
/// message plus optional `details`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest {
        error: String,
        details: Option<String>,
    },
    Internal(String),
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::BadRequest {
            error: error.into(),
            details: None,
        }
    }

    pub fn bad_request_with(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self::BadRequest {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest {
                error,
                details: Some(details),
            } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": error, "details": details }),
            ),
            Self::BadRequest {
                error,
                details: None,
            } => (StatusCode::BAD_REQUEST, json!({ "error": error })),
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
        };

        (status, Json(body)).into_response()
    }
}
