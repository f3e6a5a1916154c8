//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    #[error("invalid rating: {0} (must be between 1 and 5)")]
    InvalidRating(u8),

    #[error("review too long: {len} bytes (max {max})")]
    ReviewTooLong { len: usize, max: usize },

    #[error("invalid reviewer kind: {0}")]
    InvalidReviewerKind(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
