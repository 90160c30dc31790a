use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::UnitId;

/// Per-unit influence weights. Replaced only as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub weights: BTreeMap<UnitId, f64>,
    /// `None` until the first accepted replacement
    pub updated_at: Option<DateTime<Utc>>,
}

impl WeightSet {
    /// Equal weights summing to one, never updated
    pub fn uniform<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        let units: Vec<UnitId> = units.into_iter().map(Into::into).collect();
        let share = if units.is_empty() {
            0.0
        } else {
            1.0 / units.len() as f64
        };

        Self {
            weights: units.into_iter().map(|u| (u, share)).collect(),
            updated_at: None,
        }
    }

    pub fn get(&self, unit: &str) -> Option<f64> {
        self.weights.get(unit).copied()
    }
}
