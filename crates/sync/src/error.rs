//! Sync error types.

use common::IntegrationId;
use domain::{DomainError, PersistenceError, PlatformType};
use thiserror::Error;

/// Failure of a single outbound platform call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Network failure, timeout, rate limit or 5xx. Worth retrying.
    #[error("Transient platform error: {0}")]
    Transient(String),

    /// Rejected credentials or payload. Retrying the same call cannot help.
    #[error("Permanent platform error: {0}")]
    Permanent(String),
}

impl AdapterError {
    pub fn transient(message: impl Into<String>) -> Self {
        AdapterError::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        AdapterError::Permanent(message.into())
    }

    /// Classifies an HTTP response status.
    ///
    /// 408, 429 and every 5xx are transient; any other status is permanent.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            408 | 429 | 500..=599 => AdapterError::Transient(format!("HTTP {status}: {body}")),
            _ => AdapterError::Permanent(format!("HTTP {status}: {body}")),
        }
    }

    /// The call did not answer within the configured timeout.
    pub fn timeout(after: std::time::Duration) -> Self {
        AdapterError::Transient(format!("timed out after {}ms", after.as_millis()))
    }

    /// Only transient errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }
}

/// Errors that stop a sync run before any item is attempted, or that the
/// orchestrator surfaces for single-shot operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Integration not found: {0}")]
    IntegrationNotFound(IntegrationId),

    #[error("Integration is inactive: {0}")]
    IntegrationInactive(IntegrationId),

    /// Another run for the same integration is in flight.
    #[error("A sync is already running for integration {0}")]
    AlreadySyncing(IntegrationId),

    /// No adapter is registered for the integration's platform.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(PlatformType),

    #[error("Credentials unavailable for integration {integration_id}: {reason}")]
    Credentials {
        integration_id: IntegrationId,
        reason: String,
    },

    /// The local status change committed, but the platform refused it.
    #[error("Order status was changed locally but not mirrored to the platform: {0}")]
    StatusMirror(AdapterError),

    #[error("Domain error: {0}")]
    Domain(DomainError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::IntegrationNotFound(id) => SyncError::IntegrationNotFound(id),
            DomainError::Persistence(inner) => SyncError::Persistence(inner),
            other => SyncError::Domain(other),
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, SyncError>;
