//! Core domain types and shared logic for VaxTrack.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Certificate identifiers and their generation
//! - Vaccination records and registration/import payloads
//! - Key layout of the record store and per-region counters
//! - Dashboard aggregation
//! - Configuration

pub mod cert_id;
pub mod config;
pub mod error;
pub mod keys;
pub mod record;
pub mod stats;

pub use cert_id::{CertId, CertIdSource, MAX_CERT_ID_ATTEMPTS, RandomCertIds};
pub use error::{Error, Result};
pub use keys::{DistrictCounter, StateCounter};
pub use record::{Gender, RecordDraft, RecordPayload, VaccinationRecord};
pub use stats::DashboardStats;
