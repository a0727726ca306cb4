use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use protolab_core::error::ProtolabError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Every failure leaves a handler as
/// `{"error": "<message>"}` with a status derived from [`ProtolabError`].
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn status(&self) -> StatusCode {
        let Some(e) = self.0.downcast_ref::<ProtolabError>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            ProtolabError::InvalidPort(_) | ProtolabError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ProtolabError::PrototypeNotFound(_)
            | ProtolabError::DirectoryMissing(_)
            | ProtolabError::DescriptorMissing(_) => StatusCode::NOT_FOUND,
            ProtolabError::PrototypeExists(_)
            | ProtolabError::StartInProgress(_)
            | ProtolabError::PortInUse(_) => StatusCode::CONFLICT,
            ProtolabError::SpawnFailed(_)
            | ProtolabError::CommandFailed(_)
            | ProtolabError::Io(_)
            | ProtolabError::Yaml(_)
            | ProtolabError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
