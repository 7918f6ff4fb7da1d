//! Test fixtures for generating test data.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};

/// Token accepted by `AuthConfig::for_testing()`.
pub const TEST_TOKEN: &str = "vaxtrack-test-token";

/// Counter for generating unique certificate IDs.
static CERT_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Compute SHA-256 hash of data as hex string.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    result.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A complete registration form submission.
#[allow(dead_code)]
pub fn registration(vaccine_type: &str, state: &str, district: &str) -> Value {
    json!({
        "name": "Anil Kumar",
        "email": "anil@example.com",
        "age": "45",
        "gender": "Male",
        "state": state,
        "district": district,
        "latitude": 28.6139,
        "longitude": 77.2090,
        "vaccineType": vaccine_type,
        "dose": "2",
        "dateAdministered": "2025-01-15",
        "administeringOfficer": ""
    })
}

/// A unique certificate ID in the canonical format.
#[allow(dead_code)]
pub fn unique_cert_id() -> String {
    let n = CERT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("VAX-20240610-{n:06}")
}

/// A bulk import element with a pre-assigned certificate ID.
#[allow(dead_code)]
pub fn import_record(cert_id: &str, state: &str, district: &str) -> Value {
    json!({
        "certId": cert_id,
        "name": "Imported Person",
        "state": state,
        "district": district,
        "vaccineType": "Covaxin",
        "dose": "Booster",
        "dateAdministered": "2024-06-10"
    })
}
