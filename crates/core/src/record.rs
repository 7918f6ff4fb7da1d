//! Vaccination records and the payloads that create them.

use crate::cert_id::CertId;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Dose value used for booster shots.
pub const BOOSTER_DOSE: &str = "Booster";

/// Gender as captured on the registration form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Parse a form value, ignoring ASCII case.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(crate::Error::InvalidRecord(format!("unknown gender: {s}"))),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted vaccination record.
///
/// Records are never updated in place: they are created by registration or
/// bulk import and removed by deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationRecord {
    pub cert_id: CertId,
    pub name: String,
    /// Always present for registered records; bulk imports may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    pub state: String,
    pub district: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub vaccine_type: String,
    pub dose: String,
    /// ISO 8601 calendar date, stored as submitted.
    pub date_administered: String,
    #[serde(default)]
    pub administering_officer: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl VaccinationRecord {
    /// Human-readable dose label ("Dose 2", "Booster").
    pub fn dose_label(&self) -> String {
        if self.dose == BOOSTER_DOSE {
            BOOSTER_DOSE.to_string()
        } else {
            format!("Dose {}", self.dose)
        }
    }

    /// Year-month bucket (`YYYY-MM`) derived from the administration date.
    ///
    /// Returns `None` for an empty date. Shorter dates are returned whole.
    pub fn month_bucket(&self) -> Option<&str> {
        let date = self.date_administered.as_str();
        if date.is_empty() {
            return None;
        }
        let end = date
            .char_indices()
            .nth(7)
            .map(|(idx, _)| idx)
            .unwrap_or(date.len());
        Some(&date[..end])
    }
}

/// Incoming record payload, as sent by registration and bulk import.
///
/// Every field is optional at this stage so that presence checks can report
/// all missing fields at once. Blank strings count as missing; numeric
/// fields also accept numeric strings, and `dose` accepts a JSON number.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub cert_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::age")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "lenient::gender")]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::coordinate")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub vaccine_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dose: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date_administered: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub administering_officer: Option<String>,
}

impl RecordPayload {
    /// Validate a registration payload. Any `certId` in the payload is ignored.
    pub fn into_registration(self) -> crate::Result<RecordDraft> {
        let mut missing = Vec::new();
        if self.email.is_none() {
            missing.push("email");
        }
        let (_, draft) = self.into_draft(missing)?;
        Ok(draft)
    }

    /// Validate a bulk-import payload, which must carry its own `certId`.
    pub fn into_import(self) -> crate::Result<(CertId, RecordDraft)> {
        let mut missing = Vec::new();
        if self.cert_id.is_none() {
            missing.push("certId");
        }
        let (cert_id, draft) = self.into_draft(missing)?;
        let cert_id = CertId::new(cert_id.unwrap_or_default())?;
        Ok((cert_id, draft))
    }

    fn into_draft(
        self,
        mut missing: Vec<&'static str>,
    ) -> crate::Result<(Option<String>, RecordDraft)> {
        let required = [
            ("name", self.name.is_none()),
            ("state", self.state.is_none()),
            ("district", self.district.is_none()),
            ("vaccineType", self.vaccine_type.is_none()),
            ("dose", self.dose.is_none()),
            ("dateAdministered", self.date_administered.is_none()),
        ];
        missing.extend(
            required
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(field, _)| *field),
        );

        let (
            Some(name),
            Some(state),
            Some(district),
            Some(vaccine_type),
            Some(dose),
            Some(date_administered),
        ) = (
            self.name,
            self.state,
            self.district,
            self.vaccine_type,
            self.dose,
            self.date_administered,
        )
        else {
            return Err(crate::Error::MissingFields(missing));
        };

        if !missing.is_empty() {
            return Err(crate::Error::MissingFields(missing));
        }

        Ok((
            self.cert_id,
            RecordDraft {
                name,
                email: self.email,
                age: self.age,
                gender: self.gender,
                state,
                district,
                latitude: self.latitude,
                longitude: self.longitude,
                vaccine_type,
                dose,
                date_administered,
                administering_officer: self.administering_officer,
            },
        ))
    }
}

/// A payload that passed presence checks and is waiting for its identity.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordDraft {
    pub name: String,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub state: String,
    pub district: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub vaccine_type: String,
    pub dose: String,
    pub date_administered: String,
    pub administering_officer: Option<String>,
}

impl RecordDraft {
    /// Attach the server-assigned identity.
    pub fn into_record(self, cert_id: CertId, created_at: OffsetDateTime) -> VaccinationRecord {
        VaccinationRecord {
            cert_id,
            name: self.name,
            email: self.email,
            age: self.age,
            gender: self.gender,
            state: self.state,
            district: self.district,
            latitude: self.latitude,
            longitude: self.longitude,
            vaccine_type: self.vaccine_type,
            dose: self.dose,
            date_administered: self.date_administered,
            administering_officer: self.administering_officer,
            created_at,
        }
    }
}

/// Deserializers for form-shaped JSON.
mod lenient {
    use super::Gender;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn blank_to_none(value: Option<Value>) -> Option<Value> {
        match value {
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::Null) | None => None,
            other => other,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match blank_to_none(Option::<Value>::deserialize(d)?) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected a string, got {other}"
            ))),
        }
    }

    pub fn age<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let parsed = match blank_to_none(Option::<Value>::deserialize(d)?) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            Some(_) => None,
        };
        parsed
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("age must be a non-negative integer"))
    }

    pub fn coordinate<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let parsed = match blank_to_none(Option::<Value>::deserialize(d)?) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        parsed
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom("coordinates must be decimal degrees"))
    }

    pub fn gender<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Gender>, D::Error> {
        match text(d)? {
            None => Ok(None),
            Some(s) => Gender::parse(&s).map(Some).map_err(D::Error::custom),
        }
    }
}
