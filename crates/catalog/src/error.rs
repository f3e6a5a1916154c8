//! Catalog sync error types.

use thiserror::Error;

/// Errors from the catalog client and sync jobs.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog URL: {0}")]
    Url(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("unexpected catalog payload: {0}")]
    Decode(String),

    #[error("checkpoint write lost to a concurrent run")]
    CheckpointLost,

    #[error("metadata error: {0}")]
    Metadata(#[from] pavilion_metadata::MetadataError),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
