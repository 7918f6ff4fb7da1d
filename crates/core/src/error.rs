//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid certificate id: {0}")]
    InvalidCertId(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("failed to generate a unique certificate id after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_lists_every_field() {
        let err = Error::MissingFields(vec!["name", "email"]);
        assert_eq!(err.to_string(), "missing required fields: name, email");
    }

    #[test]
    fn generation_exhausted_reports_attempts() {
        let err = Error::GenerationExhausted { attempts: 10 };
        assert!(err.to_string().contains("after 10 attempts"));
    }
}
