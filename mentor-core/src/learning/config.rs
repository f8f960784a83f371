//! Learning engine configuration and the default curriculum.

use crate::concept::ConceptId;
use crate::error::{Error, Result};
use crate::learning::phase::{CompletionCriterion, CompletionMetric};
use crate::learning::types::LearningPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A curriculum block: a concept and the concepts it builds on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub concept: ConceptId,
    #[serde(default)]
    pub prerequisites: Vec<ConceptId>,
}

/// Blocks and exit criteria of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTemplate {
    pub phase: LearningPhase,
    pub blocks: Vec<BlockTemplate>,
    pub criteria: Vec<CompletionCriterion>,
}

/// Configuration for the learning experience engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Performance counted as a success toward mastery
    pub success_threshold: f64,
    /// Consecutive successes needed to advance one mastery level
    pub success_streak: u32,
    /// Performance below which an interaction counts as struggling
    pub low_threshold: f64,
    /// Consecutive struggling interactions before easing difficulty
    pub low_streak: u32,
    /// Performance above which an interaction counts as excelling
    pub high_threshold: f64,
    /// Consecutive excelling interactions before raising difficulty
    pub high_streak: u32,
    /// Weight of a newly created element connection
    pub initial_connection_weight: f64,
    /// Weight added when a connection is co-mentioned again
    pub connection_step: f64,
    pub curriculum: Vec<PhaseTemplate>,
}

fn id(name: &str) -> ConceptId {
    ConceptId::parse(name).expect("built-in curriculum concept ids are valid")
}

fn block(concept: &str, prerequisites: &[&str]) -> BlockTemplate {
    BlockTemplate {
        concept: id(concept),
        prerequisites: prerequisites.iter().map(|p| id(p)).collect(),
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        use CompletionMetric::*;

        let curriculum = vec![
            PhaseTemplate {
                phase: LearningPhase::Foundation,
                blocks: vec![
                    block("variables", &[]),
                    block("functions", &[]),
                    block("control_flow", &[]),
                ],
                criteria: vec![
                    CompletionCriterion::new(ConceptCoverage, 0.6),
                    CompletionCriterion::new(AveragePerformance, 0.6),
                    CompletionCriterion::new(Interactions, 5.0),
                ],
            },
            PhaseTemplate {
                phase: LearningPhase::Building,
                blocks: vec![
                    block("data_structures", &["variables"]),
                    block("modules", &["functions"]),
                    block("error_handling", &["control_flow", "functions"]),
                ],
                criteria: vec![
                    CompletionCriterion::new(ConceptCoverage, 0.7),
                    CompletionCriterion::new(AveragePerformance, 0.65),
                    CompletionCriterion::new(Interactions, 10.0),
                ],
            },
            PhaseTemplate {
                phase: LearningPhase::Connecting,
                blocks: vec![
                    block("iterators", &["data_structures", "functions"]),
                    block("abstraction", &["modules"]),
                    block("testing", &["functions", "error_handling"]),
                ],
                criteria: vec![
                    CompletionCriterion::new(ConceptCoverage, 0.7),
                    CompletionCriterion::new(AveragePerformance, 0.7),
                    CompletionCriterion::new(Connections, 3.0),
                ],
            },
            PhaseTemplate {
                phase: LearningPhase::Applying,
                blocks: vec![
                    block("concurrency", &["abstraction", "error_handling"]),
                    block("project_structure", &["modules", "testing"]),
                ],
                criteria: vec![
                    CompletionCriterion::new(ConceptCoverage, 0.8),
                    CompletionCriterion::new(AveragePerformance, 0.75),
                    CompletionCriterion::new(ExercisesCompleted, 3.0),
                ],
            },
            PhaseTemplate {
                phase: LearningPhase::Mastering,
                blocks: vec![
                    block("performance_tuning", &["concurrency"]),
                    block("design_patterns", &["abstraction", "project_structure"]),
                ],
                criteria: vec![
                    CompletionCriterion::new(ConceptCoverage, 0.9),
                    CompletionCriterion::new(AveragePerformance, 0.85),
                ],
            },
        ];

        Self {
            success_threshold: 0.7,
            success_streak: 3,
            low_threshold: 0.5,
            low_streak: 2,
            high_threshold: 0.85,
            high_streak: 3,
            initial_connection_weight: 0.3,
            connection_step: 0.1,
            curriculum,
        }
    }
}

impl LearningConfig {
    /// Template of a phase, if the curriculum defines one.
    pub fn template(&self, phase: LearningPhase) -> Option<&PhaseTemplate> {
        self.curriculum.iter().find(|t| t.phase == phase)
    }

    /// Every concept named anywhere in the curriculum.
    pub fn curriculum_concepts(&self) -> BTreeSet<&ConceptId> {
        self.curriculum
            .iter()
            .flat_map(|t| t.blocks.iter().map(|b| &b.concept))
            .collect()
    }

    /// Check thresholds and that prerequisites only point at earlier or
    /// same-phase blocks, which keeps the block graph acyclic.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("success_threshold", self.success_threshold),
            ("low_threshold", self.low_threshold),
            ("high_threshold", self.high_threshold),
            ("initial_connection_weight", self.initial_connection_weight),
            ("connection_step", self.connection_step),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within [0,1], got {}", name, value)));
            }
        }
        if self.success_streak == 0 || self.low_streak == 0 || self.high_streak == 0 {
            return Err(Error::Config("streak lengths must be positive".into()));
        }

        let mut seen: BTreeSet<&ConceptId> = BTreeSet::new();
        for phase in LearningPhase::ALL {
            let Some(template) = self.template(phase) else {
                continue;
            };
            for block in &template.blocks {
                for prerequisite in &block.prerequisites {
                    if !seen.contains(prerequisite) && prerequisite != &block.concept {
                        let same_phase_earlier = template
                            .blocks
                            .iter()
                            .take_while(|b| b.concept != block.concept)
                            .any(|b| &b.concept == prerequisite);
                        if !same_phase_earlier {
                            return Err(Error::Config(format!(
                                "block `{}` requires `{}`, which is not introduced earlier",
                                block.concept, prerequisite
                            )));
                        }
                    }
                    if prerequisite == &block.concept {
                        return Err(Error::Config(format!(
                            "block `{}` lists itself as a prerequisite",
                            block.concept
                        )));
                    }
                }
                seen.insert(&block.concept);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_curriculum_is_valid() {
        let config = LearningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.curriculum.len(), LearningPhase::ALL.len());
    }

    #[test]
    fn test_forward_prerequisite_rejected() {
        let mut config = LearningConfig::default();
        config.curriculum[0].blocks[0]
            .prerequisites
            .push(id("concurrency"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
