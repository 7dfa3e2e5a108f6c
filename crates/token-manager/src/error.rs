//! Error types for credential lifecycle operations

/// Errors from credential storage and refresh operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The authorization endpoint rejected the refresh token itself
    /// (401/403). Not retryable; the stored credential is dead.
    #[error("refresh token rejected: {0}")]
    RefreshRejected(String),

    /// Transient refresh failure (network error, 5xx, malformed body).
    /// The stored credential may still be valid.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("credential parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
