//! Phase completion criteria and phase-advance results.

use crate::concept::ConceptId;
use crate::learning::types::LearningPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantity a completion criterion is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMetric {
    /// Fraction of the phase's blocks at practiced or above
    ConceptCoverage,
    /// Mean assessed performance across all blocks
    AveragePerformance,
    /// Number of learning interactions
    Interactions,
    /// Number of element connections across context layers
    Connections,
    /// Number of blocks with a completed exercise
    ExercisesCompleted,
}

impl std::fmt::Display for CompletionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConceptCoverage => write!(f, "concept_coverage"),
            Self::AveragePerformance => write!(f, "average_performance"),
            Self::Interactions => write!(f, "interactions"),
            Self::Connections => write!(f, "connections"),
            Self::ExercisesCompleted => write!(f, "exercises_completed"),
        }
    }
}

/// Threshold a metric must reach before the phase can be left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionCriterion {
    pub metric: CompletionMetric,
    pub threshold: f64,
}

impl CompletionCriterion {
    pub const fn new(metric: CompletionMetric, threshold: f64) -> Self {
        Self { metric, threshold }
    }
}

/// Caller-supplied measurements. Metrics left out are measured from the
/// experience itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvidence {
    #[serde(default)]
    pub metrics: BTreeMap<CompletionMetric, f64>,
}

impl CompletionEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: CompletionMetric, value: f64) -> Self {
        self.metrics.insert(metric, value);
        self
    }

    pub fn get(&self, metric: CompletionMetric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }
}

/// Evaluation of one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionStatus {
    pub metric: CompletionMetric,
    pub threshold: f64,
    pub value: f64,
    pub met: bool,
}

/// Evaluation of every criterion of a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub phase: LearningPhase,
    pub criteria: Vec<CriterionStatus>,
}

impl CompletionStatus {
    pub fn evaluate(
        phase: LearningPhase,
        criteria: &[CompletionCriterion],
        measured: &CompletionEvidence,
        supplied: &CompletionEvidence,
    ) -> Self {
        let criteria = criteria
            .iter()
            .map(|c| {
                let value = supplied
                    .get(c.metric)
                    .or_else(|| measured.get(c.metric))
                    .unwrap_or(0.0);
                CriterionStatus {
                    metric: c.metric,
                    threshold: c.threshold,
                    value,
                    met: value >= c.threshold,
                }
            })
            .collect();
        Self { phase, criteria }
    }

    pub fn all_met(&self) -> bool {
        self.criteria.iter().all(|c| c.met)
    }

    /// Criteria still below threshold.
    pub fn unmet(&self) -> impl Iterator<Item = &CriterionStatus> {
        self.criteria.iter().filter(|c| !c.met)
    }

    /// Mean fraction of each threshold reached, capped at 1 per criterion.
    pub fn progress(&self) -> f64 {
        if self.criteria.is_empty() {
            return 1.0;
        }
        let sum: f64 = self
            .criteria
            .iter()
            .map(|c| {
                if c.threshold <= 0.0 {
                    1.0
                } else {
                    (c.value / c.threshold).clamp(0.0, 1.0)
                }
            })
            .sum();
        sum / self.criteria.len() as f64
    }
}

/// Result of an advance attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAdvance {
    pub advanced: bool,
    pub previous_phase: LearningPhase,
    pub current_phase: LearningPhase,
    pub completion_status: CompletionStatus,
    /// Concepts whose blocks the entered phase introduced
    pub new_concepts: Vec<ConceptId>,
}
