//! Key layout of the record store.
//!
//! ```text
//! vaccination:<certId>             -> VaccinationRecord
//! state:<state>                    -> StateCounter
//! district:<state>:<district>      -> DistrictCounter
//! ```

use crate::cert_id::CertId;
use serde::{Deserialize, Serialize};

pub const RECORD_PREFIX: &str = "vaccination:";
pub const STATE_PREFIX: &str = "state:";
pub const DISTRICT_PREFIX: &str = "district:";

pub fn record_key(cert_id: &CertId) -> String {
    format!("{RECORD_PREFIX}{cert_id}")
}

pub fn state_key(state: &str) -> String {
    format!("{STATE_PREFIX}{state}")
}

pub fn district_key(state: &str, district: &str) -> String {
    format!("{DISTRICT_PREFIX}{state}:{district}")
}

/// Per-state record count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounter {
    pub state: String,
    pub count: i64,
}

/// Per-district record count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictCounter {
    pub state: String,
    pub district: String,
    pub count: i64,
}

impl StateCounter {
    /// Initial value stored when the first record for `state` arrives.
    pub fn seed(state: &str) -> Self {
        Self {
            state: state.to_string(),
            count: 1,
        }
    }
}

impl DistrictCounter {
    /// Initial value stored when the first record for the district arrives.
    pub fn seed(state: &str, district: &str) -> Self {
        Self {
            state: state.to_string(),
            district: district.to_string(),
            count: 1,
        }
    }
}
