//! Error types for Carpet Notes
//!
//! All errors use thiserror for structured error handling.
//! Storage read/write failures are recovered inside the services and never
//! reach this enum; everything here is something a caller can act on.

use thiserror::Error;

/// Input rejected before it reaches the store.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("address is required")]
    EmptyAddress,

    #[error("rate must be a positive number")]
    InvalidRate,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("At least one carpet row is required")]
    RowRemovalRejected,

    #[error("No carpet row at index {0}")]
    RowOutOfRange(usize),

    #[error("No record is being edited")]
    EditorClosed,

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Asset unavailable offline: {0}")]
    AssetUnavailable(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
