//! Tiering and retention policy.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Thresholds governing tier placement, promotion, merging and pruning.
///
/// Retention is measured in logical ticks: the store advances its clock once
/// per stored record (and the orchestrator once per conversational event),
/// so pruning does not depend on wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Importance at or above which a new record goes straight to long-term
    pub direct_long_term_importance: f64,
    /// Reinforcements at which a short-term record is promoted
    pub promote_reference_count: u32,
    /// Importance at which a short-term record is promoted
    pub promote_importance: f64,
    /// Ticks a short-term record may stay untouched before pruning
    pub retention_window_ticks: u64,
    /// Maximum characters of merged content
    pub merged_content_cap: usize,
    /// Working tier capacity before overflow demotes to short-term
    pub working_capacity: usize,
    /// Multiplier on the record count bounding a consolidation pass
    pub max_iterations_per_record: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            direct_long_term_importance: 0.7,
            promote_reference_count: 3,
            promote_importance: 0.6,
            retention_window_ticks: 50,
            merged_content_cap: 2_000,
            working_capacity: 9,
            max_iterations_per_record: 4,
        }
    }
}

impl RetentionPolicy {
    /// Short retention window and small working tier, for tests.
    pub fn aggressive() -> Self {
        Self {
            retention_window_ticks: 5,
            working_capacity: 3,
            ..Self::default()
        }
    }

    /// Check thresholds are in range.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("direct_long_term_importance", self.direct_long_term_importance),
            ("promote_importance", self.promote_importance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within [0,1], got {}", name, value)));
            }
        }
        if self.promote_reference_count == 0 {
            return Err(Error::Config("promote_reference_count must be positive".into()));
        }
        if self.working_capacity == 0 || self.max_iterations_per_record == 0 {
            return Err(Error::Config(
                "working_capacity and max_iterations_per_record must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RetentionPolicy::default().validate().is_ok());
        assert!(RetentionPolicy::aggressive().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_importance_rejected() {
        let policy = RetentionPolicy {
            promote_importance: 1.5,
            ..RetentionPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(Error::Config(_))));
    }
}
