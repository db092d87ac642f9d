use std::error::Error;
use thiserror::Error;

use crate::dao::facts::FactHash;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by fact store backends regardless of the underlying engine.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A fact could not be turned into its canonical form.
    #[error("failed to encode fact")]
    Encoding(#[from] serde_json::Error),
    /// A fact references a predecessor the store has never seen.
    #[error("unknown predecessor `{0}`")]
    MissingPredecessor(FactHash),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
