//! Error types for the conversation memory store

use thiserror::Error;

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur while storing or reading conversations
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The backend could not be opened or did not answer a ping
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A statement or batch failed inside the backend
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// List fields could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A compressed blob is not valid base64/zlib/UTF-8
    #[error("Decode error: {0}")]
    Decode(String),

    /// A stored record is missing mandatory fields
    #[error("Corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    pub(crate) fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        MemoryError::CorruptRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
