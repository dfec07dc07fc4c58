//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the visitor routes. Every variant renders as
/// `{ "error": <message> }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database not configured")]
    NotConfigured,

    #[error("Invalid type parameter")]
    InvalidType,

    #[error("Failed to track visitor")]
    Track(#[source] anyhow::Error),

    #[error("Failed to fetch analytics")]
    Fetch(#[source] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidType => StatusCode::BAD_REQUEST,
            AppError::Track(e) => {
                tracing::error!("Error tracking visitor: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Fetch(e) => {
                tracing::error!("Error fetching analytics: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
