//! Dashboard aggregation.

use crate::keys::{DistrictCounter, StateCounter};
use crate::record::{BOOSTER_DOSE, VaccinationRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dose buckets that are always reported, even when empty.
pub const STANDARD_DOSES: [&str; 4] = ["1", "2", "3", BOOSTER_DOSE];

/// Aggregate statistics over every stored record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_vaccinations: u64,
    pub vaccine_types: BTreeMap<String, u64>,
    pub dose_distribution: BTreeMap<String, u64>,
    pub monthly_data: BTreeMap<String, u64>,
    pub state_heatmap_data: Vec<StateCounter>,
    pub district_heatmap_data: Vec<DistrictCounter>,
}

impl DashboardStats {
    /// Compute statistics from a full scan of records and counters.
    pub fn aggregate<'a, I>(
        records: I,
        mut states: Vec<StateCounter>,
        mut districts: Vec<DistrictCounter>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a VaccinationRecord>,
    {
        let mut stats = Self {
            dose_distribution: STANDARD_DOSES
                .iter()
                .map(|dose| (dose.to_string(), 0))
                .collect(),
            ..Self::default()
        };

        for record in records {
            stats.total_vaccinations += 1;
            *stats
                .vaccine_types
                .entry(record.vaccine_type.clone())
                .or_default() += 1;
            *stats
                .dose_distribution
                .entry(record.dose.clone())
                .or_default() += 1;
            if let Some(month) = record.month_bucket() {
                *stats.monthly_data.entry(month.to_string()).or_default() += 1;
            }
        }

        states.sort_by(|a, b| a.state.cmp(&b.state));
        districts.sort_by(|a, b| (&a.state, &a.district).cmp(&(&b.state, &b.district)));
        stats.state_heatmap_data = states;
        stats.district_heatmap_data = districts;
        stats
    }
}
