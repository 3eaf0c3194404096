use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use thiserror::Error;

use crate::models::ErrorBody;

/// Failure of one call against the answer backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected locally; no request was sent.
    #[error("{0}")]
    Validation(String),
    /// The backend answered with a non-2xx status.
    #[error("backend returned status {status}")]
    Upstream { status: u16, body: String },
    /// No response was received at all.
    #[error("connection error: {0}")]
    Connection(String),
    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Message shown to a reader of the chat panel or chapter view.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(message) => message.clone(),
            ApiError::Upstream { status, .. } => format!(
                "Sorry, the assistant returned an error (status {status}). Please try again."
            ),
            ApiError::Connection(_) => {
                "Connection error. Please check your connection and try again.".to_string()
            }
            ApiError::Decode(_) => {
                "Sorry, the assistant sent a reply I could not read. Please try again.".to_string()
            }
        }
    }

    /// `detail` field of an upstream FastAPI-style error body, if any.
    pub fn upstream_detail(&self) -> Option<String> {
        let ApiError::Upstream { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("detail")
            .and_then(|detail| detail.as_str())
            .map(str::to_string)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    details: None,
                },
            ),
            ApiError::Upstream { status, body } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                ErrorBody {
                    error: "Failed to get response from backend".to_string(),
                    details: Some(body),
                },
            ),
            ApiError::Connection(details) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: "connection error".to_string(),
                    details: Some(details),
                },
            ),
            ApiError::Decode(details) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: "invalid backend response".to_string(),
                    details: Some(details),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
