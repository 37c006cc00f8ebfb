//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use thinghub_domain::error::ThingHubError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`ThingHubError`] to an HTTP response with the appropriate status.
pub struct ApiError(ThingHubError);

impl From<ThingHubError> for ApiError {
    fn from(err: ThingHubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ThingHubError::BadRequest(_)
            | ThingHubError::Validation(_)
            | ThingHubError::Unknown { .. } => (StatusCode::BAD_REQUEST, self.0.to_string()),
            ThingHubError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            ThingHubError::Conflict { .. } => (StatusCode::CONFLICT, self.0.to_string()),
            ThingHubError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
