//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use sync::SyncError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain rule violation.
    Domain(DomainError),
    /// Sync orchestration error.
    Sync(SyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Sync(err) => sync_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::StoreNotFound(_)
        | DomainError::CategoryNotFound(_)
        | DomainError::ProductNotFound(_)
        | DomainError::OrderNotFound(_)
        | DomainError::IntegrationNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidStatusTransition { .. } | DomainError::Conflict(_) => {
            StatusCode::CONFLICT
        }
        DomainError::InsufficientStock { .. }
        | DomainError::InvalidQuantity { .. }
        | DomainError::InvalidPrice { .. }
        | DomainError::InvalidAmount(_)
        | DomainError::StoreMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn sync_error_to_response(err: SyncError) -> (StatusCode, String) {
    match err {
        SyncError::Domain(inner) => domain_error_to_response(inner),
        SyncError::IntegrationNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SyncError::AlreadySyncing(_) => (StatusCode::CONFLICT, err.to_string()),
        SyncError::IntegrationInactive(_)
        | SyncError::UnsupportedPlatform(_)
        | SyncError::Credentials { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        SyncError::StatusMirror(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        SyncError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError::Sync(err)
    }
}
