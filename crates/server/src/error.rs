use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tutor_protocol::ValidationError;

/// A request rejected before any reply was streamed.
#[derive(Debug)]
pub enum ApiError {
    /// The request body is malformed. The message says what is wrong.
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        debug!("rejecting request: {error}");
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    #[inline]
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ValidationError> for ApiError {
    #[inline]
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
