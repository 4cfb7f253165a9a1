//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] tabula_storage::StorageError),

    #[error("Source error: {0}")]
    Source(#[from] tabula_source::SourceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
