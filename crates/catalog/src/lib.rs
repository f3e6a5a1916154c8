//! Catalog synchronization core for Pavilion.
//!
//! This crate owns the jobs that keep the local mirror fresh:
//! - Paginated catalog client with bounded retries
//! - Upsert reconciler that never clobbers locally-owned fields
//! - Sync run driver with a resumable CAS-guarded checkpoint
//! - Review stat backfill over bounded, contiguous batches
//! - AI-assisted categorization against a fixed vocabulary

pub mod backfill;
pub mod categorize;
pub mod client;
pub mod error;
pub mod reconcile;
pub mod sync;

pub use backfill::{BackfillOutcome, BackfillRunner};
pub use categorize::{CATEGORY_VOCABULARY, CategorizeRunner, LlmClient};
pub use client::{CatalogClient, CatalogPage};
pub use error::{CatalogError, CatalogResult};
pub use reconcile::{RawSkillRecord, Reconciler, SyncStats};
pub use sync::{SyncOutcome, SyncRunner};
