use chrono::{DateTime, Utc};
use magi_core::{UnitId, WeightSet};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightError {
    #[error("missing weight for unit '{0}'")]
    MissingUnit(UnitId),

    #[error("unknown unit '{0}'")]
    UnknownUnit(UnitId),

    #[error("weight for '{unit}' must be within [0, 1], got {value}")]
    OutOfRange { unit: UnitId, value: f64 },
}

/// Process-wide unit weights, replaced only as a complete set
pub struct WeightStore {
    required: Vec<UnitId>,
    current: RwLock<WeightSet>,
}

impl WeightStore {
    /// Starts with uniform weights over `required`
    pub fn new(required: Vec<UnitId>) -> Self {
        let current = WeightSet::uniform(required.iter().cloned());
        Self {
            required,
            current: RwLock::new(current),
        }
    }

    pub fn required_units(&self) -> &[UnitId] {
        &self.required
    }

    pub fn snapshot(&self) -> WeightSet {
        self.current.read().clone()
    }

    /// Validate and atomically replace the whole set.
    ///
    /// Every required unit must be present, no other unit may appear, and
    /// every value must be finite and within [0, 1]. On error nothing changes.
    pub fn replace(
        &self,
        weights: BTreeMap<UnitId, f64>,
        now: DateTime<Utc>,
    ) -> Result<WeightSet, WeightError> {
        if let Some(missing) = self.required.iter().find(|u| !weights.contains_key(*u)) {
            return Err(WeightError::MissingUnit(missing.clone()));
        }
        if let Some(unknown) = weights.keys().find(|u| !self.required.contains(*u)) {
            return Err(WeightError::UnknownUnit(unknown.clone()));
        }
        if let Some((unit, value)) = weights
            .iter()
            .find(|(_, v)| !v.is_finite() || !(0.0..=1.0).contains(*v))
        {
            return Err(WeightError::OutOfRange {
                unit: unit.clone(),
                value: *value,
            });
        }

        let updated = WeightSet {
            weights,
            updated_at: Some(now),
        };
        *self.current.write() = updated.clone();

        tracing::info!("Unit weights replaced: {:?}", updated.weights);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> WeightStore {
        WeightStore::new(vec![
            "balthasar".into(),
            "melchior".into(),
            "casper".into(),
            "sophia".into(),
        ])
    }

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<UnitId, f64> {
        pairs.iter().map(|(u, w)| (u.to_string(), *w)).collect()
    }

    #[test]
    fn test_starts_uniform() {
        let snapshot = store().snapshot();
        assert_eq!(snapshot.get("casper"), Some(0.25));
        assert!(snapshot.updated_at.is_none());
    }

    #[test]
    fn test_partial_set_rejected_and_state_unchanged() {
        let store = store();
        let before = store.snapshot();

        let err = store
            .replace(
                weights(&[("balthasar", 0.4), ("melchior", 0.3), ("casper", 0.3)]),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, WeightError::MissingUnit("sophia".into()));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_complete_set_accepted() {
        let store = store();
        let now = Utc::now();

        let updated = store
            .replace(
                weights(&[
                    ("balthasar", 0.4),
                    ("melchior", 0.2),
                    ("casper", 0.3),
                    ("sophia", 0.1),
                ]),
                now,
            )
            .unwrap();

        assert_eq!(updated.updated_at, Some(now));
        assert_eq!(store.snapshot().get("balthasar"), Some(0.4));
        assert_eq!(store.snapshot().updated_at, Some(now));
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let err = store()
            .replace(
                weights(&[
                    ("balthasar", 0.1),
                    ("melchior", 0.1),
                    ("casper", 0.1),
                    ("sophia", 0.1),
                    ("mary", 0.6),
                ]),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, WeightError::UnknownUnit("mary".into()));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let store = store();
        for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
            let result = store.replace(
                weights(&[
                    ("balthasar", bad),
                    ("melchior", 0.1),
                    ("casper", 0.1),
                    ("sophia", 0.1),
                ]),
                Utc::now(),
            );
            assert!(matches!(result, Err(WeightError::OutOfRange { .. })));
        }
        assert!(store.snapshot().updated_at.is_none());
    }
}
