//! Core domain types and shared logic for the Pavilion skills directory.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Application configuration
//! - API key scopes and authorization
//! - Tag normalization across catalog schema versions
//! - Review and rating aggregates

pub mod config;
pub mod error;
pub mod rating;
pub mod tags;
pub mod token;

pub use error::{Error, Result};
pub use rating::{RatingSummary, ReviewerKind, SkillRatings, validate_rating};
pub use tags::TagSet;
pub use token::{ApiKeyId, ApiToken, TokenScope};

/// Default number of records requested per catalog page.
pub const DEFAULT_CATALOG_PAGE_SIZE: u32 = 50;

/// Maximum number of records the catalog API will return per page.
pub const MAX_CATALOG_PAGE_SIZE: u32 = 200;

/// Maximum length of a review body in bytes.
pub const MAX_REVIEW_LEN: usize = 4096;

/// Valid rating range for reviews.
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
