//! Error types for the calsync engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during synchronization and conflict handling.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication expired for provider '{0}': re-consent required")]
    AuthExpired(String),

    #[error("Provider rate limit hit: {0}")]
    RateLimited(String),

    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No client registered for provider '{0}'")]
    ProviderNotRegistered(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Integration not found: {0}")]
    IntegrationNotFound(Uuid),

    #[error("Conflict not found: {0}")]
    ConflictNotFound(Uuid),

    #[error("Sync already in progress for integration {0}")]
    SyncInProgress(Uuid),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Whether the error is worth retrying with backoff.
    ///
    /// Auth and validation failures are never transient: retrying them
    /// cannot succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::RateLimited(_)
                | SyncError::TransientNetwork(_)
                | SyncError::ProviderTimeout(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Result type alias for calsync operations.
pub type CalSyncResult<T> = Result<T, SyncError>;
