//! HTTP API server for the Pavilion skills directory.
//!
//! This crate provides the control plane:
//! - Agent registration and API key auth
//! - Skill listing and search over the local catalog mirror
//! - Rating/review submission with upsert semantics
//! - Fixed-window quota enforcement for agent write traffic
//! - Identity provider webhook ingestion
//! - Admin endpoints (keys, sync control, moderation)

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod quota;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedAgent, TraceId};
pub use error::{ApiError, ApiResult};
pub use quota::QuotaGate;
pub use routes::create_router;
pub use state::{AppState, JobTaskRegistry};
