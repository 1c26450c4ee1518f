use crate::signing::SignError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Wrapper type for successful API responses.
///
/// Encapsulates the data payload and prepares it for JSON serialization.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        axum::Json(self).into_response()
    }
}

/// Error body carrying the stable machine-readable code alongside the
/// human-readable message, so clients can branch on `code` without parsing
/// prose.
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
}

/// Adapter mapping `SignError` onto HTTP semantics.
pub struct ApiError(pub SignError);

impl From<SignError> for ApiError {
    fn from(err: SignError) -> Self {
        // ---
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = match &self.0 {
            SignError::DocumentNotFound | SignError::CredentialNotConfigured => {
                StatusCode::NOT_FOUND
            }
            SignError::AlreadySigned | SignError::DocumentCancelled | SignError::InvalidState => {
                StatusCode::CONFLICT
            }
            SignError::ChallengeExpiredOrMissing
            | SignError::SignatureInvalid
            | SignError::OriginMismatch
            | SignError::RpIdMismatch
            | SignError::ReplayDetected => StatusCode::UNAUTHORIZED,
            SignError::TotalsMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            SignError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SignError::Storage(err) => {
                tracing::error!("Storage error: {:?}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            code: self.0.code(),
            error: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
