//! HTTP API server for VaxTrack.
//!
//! This crate provides the HTTP surface over the record store:
//! - Registration with server-assigned certificate IDs
//! - Record lookup, listing and deletion
//! - Bulk import of pre-identified records
//! - Dashboard statistics
//! - Confirmation email delivery in the background

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod notify;
pub mod records;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use notify::NotificationQueue;
pub use records::{ImportSummary, RecordManager};
pub use routes::create_router;
pub use state::AppState;
