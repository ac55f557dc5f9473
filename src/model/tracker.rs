//! Field Tracker Module
//!
//! Remembers the last persisted field values of a record so changed fields
//! can be reported before the next save.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::model::Fields;

// == Field Tracker ==
/// Baseline of field values as last loaded from or written to storage.
///
/// A tracker without a baseline belongs to a record that has never been
/// persisted; every field holding a value counts as changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTracker {
    baseline: Option<Fields>,
}

impl FieldTracker {
    // == Constructor ==
    /// Creates a tracker with no baseline.
    pub fn new() -> Self {
        Self { baseline: None }
    }

    /// Creates a tracker whose baseline is `fields`.
    pub fn armed(fields: &Fields) -> Self {
        Self {
            baseline: Some(fields.clone()),
        }
    }

    // == Arm ==
    /// Replaces the baseline with the given persisted state.
    pub fn arm(&mut self, fields: &Fields) {
        self.baseline = Some(fields.clone());
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    // == Changed ==
    /// Names of the fields whose value in `current` differs from the baseline.
    ///
    /// A field missing on one side compares as `null`.
    pub fn changed(&self, current: &Fields) -> BTreeSet<String> {
        match &self.baseline {
            None => current
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k.clone())
                .collect(),
            Some(baseline) => baseline
                .keys()
                .chain(current.keys())
                .filter(|k| {
                    baseline.get(*k).unwrap_or(&Value::Null)
                        != current.get(*k).unwrap_or(&Value::Null)
                })
                .cloned()
                .collect(),
        }
    }

    /// Whether `field` in `current` differs from the baseline.
    pub fn has_changed(&self, current: &Fields, field: &str) -> bool {
        let after = current.get(field).unwrap_or(&Value::Null);
        match &self.baseline {
            None => !after.is_null(),
            Some(baseline) => baseline.get(field).unwrap_or(&Value::Null) != after,
        }
    }
}
