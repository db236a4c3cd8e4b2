use thiserror::Error;

/// Pipeline error taxonomy. Validation and state errors are surfaced
/// immediately and never retried; storage errors are retried by the call
/// path that produced them before landing here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("upload session not found: {0}")]
    SessionNotFound(String),

    #[error("upload session expired: {0}")]
    SessionExpired(String),

    #[error("chunk number {number} out of range (total chunks: {total})")]
    ChunkOutOfRange { number: i32, total: i32 },

    #[error("chunk {number} has {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        number: i32,
        expected: u64,
        actual: u64,
    },

    #[error("media probe failed: {0}")]
    ProbeFailed(String),

    #[error("storage error: {0}")]
    Storage(anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl From<sea_orm::TransactionError<IngestError>> for IngestError {
    fn from(err: sea_orm::TransactionError<IngestError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => IngestError::Database(e),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}
