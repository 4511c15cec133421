//! Error types. `cortex-core` never speaks HTTP; `CortexError` carries enough
//! structure for `cortex-mcp` to map it onto status codes at the boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CortexError>;

#[derive(Debug, Error)]
pub enum CortexError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CortexError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CortexError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CortexError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CortexError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CortexError::Internal(msg.into())
    }

    /// Stable machine-readable kind, used by `cortex-mcp` for status-code
    /// mapping and by JSON-RPC error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            CortexError::Validation(_) => "validation",
            CortexError::NotFound(_) => "not_found",
            CortexError::Conflict(_) => "conflict",
            CortexError::Timeout(_) => "timeout",
            CortexError::ProviderUnavailable(_) => "provider_unavailable",
            CortexError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StorageError> for CortexError {
    fn from(err: StorageError) -> Self {
        CortexError::Internal(err.to_string())
    }
}

/// Errors surfaced by provider adapters (spec §7). `Unavailable` and
/// `Timeout` are the two that `CascadeX` acts on — everything else
/// degrades a cascade member the same way `Unavailable` does.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ProviderError> for CortexError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(d) => CortexError::Timeout(format!("{d:?}")),
            other => CortexError::ProviderUnavailable(other.to_string()),
        }
    }
}
