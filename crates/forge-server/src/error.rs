use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge_core::diagnostic;
use forge_core::ForgeError;

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Client errors carry `{"error": ...}`; server errors carry the diagnostic
/// document of the whole cause chain plus the numeric `status`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(ForgeError::InvalidPayload(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<ForgeError>() {
            Some(ForgeError::CommandNotFound { .. }) => StatusCode::NOT_FOUND,
            Some(
                ForgeError::NotAWizard(_)
                | ForgeError::InvalidStepIndex(_)
                | ForgeError::InvalidPayload(_),
            ) => StatusCode::BAD_REQUEST,
            Some(ForgeError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            Some(
                ForgeError::Configuration(_)
                | ForgeError::Archive(_)
                | ForgeError::Io(_)
                | ForgeError::Yaml(_)
                | ForgeError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(status = status.as_u16(), "request failed: {:#}", self.0);

        if let Some(ForgeError::CommandNotFound { known, .. }) = self.0.downcast_ref::<ForgeError>() {
            let body = serde_json::json!({
                "error": self.0.to_string(),
                "commands": known,
            });
            return (status, axum::Json(body)).into_response();
        }

        if status.is_client_error() {
            let body = serde_json::json!({ "error": self.0.to_string() });
            return (status, axum::Json(body)).into_response();
        }

        let mut body = diagnostic::render(&self.0);
        body["status"] = serde_json::json!(status.as_u16());
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
