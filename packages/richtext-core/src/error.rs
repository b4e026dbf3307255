use thiserror::Error;

use crate::ids::Version;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation was created against a different document version and must be
    /// transformed before it can be applied.
    #[error("version conflict: operation base version {actual} does not match document version {expected}")]
    VersionConflict { expected: Version, actual: Version },
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("cross-root operation: {0}")]
    CrossRootOperation(String),
    #[error("batch is sealed and cannot accept more operations")]
    SealedBatchMutation,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("unknown root: {0}")]
    UnknownRoot(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the caller is expected to recover by transforming and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }
}
