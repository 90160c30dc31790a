use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use magi_core::ProviderError;
use magi_services::WeightError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(#[from] WeightError),

    #[error("Judge failed: {0}")]
    JudgeFailed(ProviderError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::InvalidWeights(_) => StatusCode::BAD_REQUEST,
            ApiError::JudgeFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// Malformed or missing JSON bodies are client errors
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidRequest("prompt is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(WeightError::MissingUnit("sophia".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::JudgeFailed(ProviderError::new("OpenAI", "timeout")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        let err = ApiError::JudgeFailed(ProviderError::with_status("OpenAI", 503, "overloaded"));
        assert_eq!(err.to_string(), "Judge failed: [OpenAI] overloaded");

        let err = ApiError::from(WeightError::UnknownUnit("mary".into()));
        assert_eq!(err.to_string(), "Invalid weights: unknown unit 'mary'");
    }
}
