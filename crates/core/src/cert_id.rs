//! Certificate identifiers and candidate generation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Date, OffsetDateTime};

/// Prefix shared by every generated certificate ID.
pub const CERT_ID_PREFIX: &str = "VAX";

/// Number of candidates tried before allocation gives up.
pub const MAX_CERT_ID_ATTEMPTS: usize = 10;

/// Upper bound (inclusive) of the random suffix.
const MAX_SUFFIX: u32 = 999_999;

/// Human-shareable identifier of a vaccination record.
///
/// Generated IDs always have the form `VAX-YYYYMMDD-NNNNNN`. Bulk-imported
/// records carry caller-assigned IDs, so the type itself only requires a
/// non-empty string; use [`CertId::parse`] when the generated format must hold.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertId(String);

impl CertId {
    /// Wrap a caller-assigned ID.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidCertId(
                "certificate id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Parse an ID, requiring the generated `VAX-YYYYMMDD-NNNNNN` format.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let invalid = || crate::Error::InvalidCertId(format!("expected VAX-YYYYMMDD-NNNNNN: {s}"));

        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if prefix != CERT_ID_PREFIX
            || date.len() != 8
            || suffix.len() != 6
            || !date.bytes().all(|b| b.is_ascii_digit())
            || !suffix.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }

    /// Build an ID from its date and numeric suffix.
    pub fn from_parts(date: Date, suffix: u32) -> Self {
        Self(format!(
            "{CERT_ID_PREFIX}-{:04}{:02}{:02}-{:06}",
            date.year(),
            u8::from(date.month()),
            date.day(),
            suffix.min(MAX_SUFFIX)
        ))
    }

    /// Draw a candidate for `date` with a uniform suffix in `[0, 999999]`.
    pub fn generate<R: Rng + ?Sized>(date: Date, rng: &mut R) -> Self {
        Self::from_parts(date, rng.random_range(0..=MAX_SUFFIX))
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for CertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertId({})", self.0)
    }
}

impl fmt::Display for CertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CertId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of candidate certificate IDs.
///
/// Candidates are not guaranteed unique; the caller claims each one against
/// the store and asks for another on collision.
pub trait CertIdSource: Send + Sync {
    /// Produce the next candidate.
    fn next_candidate(&self) -> CertId;
}

/// Candidates dated with the current UTC day and a thread-local random suffix.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCertIds;

impl CertIdSource for RandomCertIds {
    fn next_candidate(&self) -> CertId {
        CertId::generate(OffsetDateTime::now_utc().date(), &mut rand::rng())
    }
}
