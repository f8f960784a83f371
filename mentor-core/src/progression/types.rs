//! Skill assessment, suggestion and learning path types.

use crate::concept::ConceptId;
use crate::ids::PathId;
use crate::learning::ExperienceLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Skill assessment
// ============================================================================

/// A fixed group of concepts assessed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCategory {
    pub name: String,
    pub concepts: BTreeSet<ConceptId>,
}

impl SkillCategory {
    pub fn new(name: impl Into<String>, concepts: BTreeSet<ConceptId>) -> Self {
        Self {
            name: name.into(),
            concepts,
        }
    }
}

/// Assessed skill level of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Novice,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    /// Level for a confidence in [0,1].
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::Expert
        } else if confidence >= 0.7 {
            Self::Advanced
        } else if confidence >= 0.5 {
            Self::Intermediate
        } else if confidence >= 0.3 {
            Self::Beginner
        } else {
            Self::Novice
        }
    }
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Novice => write!(f, "novice"),
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
            Self::Expert => write!(f, "expert"),
        }
    }
}

/// Assessment of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssessment {
    pub category: String,
    pub confidence: f64,
    pub level: SkillLevel,
    pub demonstrated: Vec<ConceptId>,
    pub missing: Vec<ConceptId>,
}

/// Result of [`assess_current_skills`](super::assess_current_skills).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAssessment {
    /// Every concept the learner has shown or declared
    pub demonstrated: BTreeSet<ConceptId>,
    pub categories: Vec<CategoryAssessment>,
    /// Mean category confidence
    pub overall_confidence: f64,
    pub overall_level: SkillLevel,
}

impl SkillAssessment {
    pub fn category(&self, name: &str) -> Option<&CategoryAssessment> {
        self.categories.iter().find(|c| c.category == name)
    }

    /// Categories at intermediate or above.
    pub fn strengths(&self) -> impl Iterator<Item = &CategoryAssessment> {
        self.categories
            .iter()
            .filter(|c| c.level >= SkillLevel::Intermediate)
    }

    /// Categories below beginner.
    pub fn gaps(&self) -> impl Iterator<Item = &CategoryAssessment> {
        self.categories.iter().filter(|c| c.level == SkillLevel::Novice)
    }

    /// Level of the category containing `concept`, if any.
    pub fn level_of(&self, concept: &ConceptId, categories: &[SkillCategory]) -> Option<SkillLevel> {
        let name = &categories.iter().find(|c| c.concepts.contains(concept))?.name;
        self.category(name).map(|c| c.level)
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// What a suggestion asks the learner to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Start a concept whose prerequisites are in place
    NextConcept,
    /// Revisit a developing concept that has gone quiet
    Reinforcement,
    /// Apply a practiced concept in an exercise
    Application,
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NextConcept => write!(f, "next_concept"),
            Self::Reinforcement => write!(f, "reinforcement"),
            Self::Application => write!(f, "application"),
        }
    }
}

/// Priority, declared from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// A ranked, actionable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSuggestion {
    pub kind: SuggestionKind,
    pub concept: ConceptId,
    pub priority: SuggestionPriority,
    /// Machine-readable reason code, e.g. `prerequisites_met`
    pub reason: String,
}

// ============================================================================
// Paths
// ============================================================================

/// How fast the learner wants to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceHint {
    Relaxed,
    #[default]
    Steady,
    Intensive,
}

impl PaceHint {
    /// Turns budgeted per concept of a milestone.
    pub fn turns_per_concept(self) -> u32 {
        match self {
            Self::Relaxed => 6,
            Self::Steady => 4,
            Self::Intensive => 2,
        }
    }
}

/// One step of a learning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub title: String,
    pub concepts: Vec<ConceptId>,
    pub estimated_turns: u32,
    /// Number of goal keywords the milestone matched
    pub goal_matches: usize,
    pub completed: bool,
}

/// Completion tracking for a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressTracker {
    pub completed_milestones: usize,
    pub total_milestones: usize,
    /// Completed fraction in [0,1]
    pub completion: f64,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ProgressTracker {
    pub fn new(total_milestones: usize) -> Self {
        let now = Utc::now();
        Self {
            completed_milestones: 0,
            total_milestones,
            completion: 0.0,
            started_at: now,
            last_updated: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_milestones > 0 && self.completed_milestones >= self.total_milestones
    }
}

/// A personalized ordered list of milestones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: PathId,
    pub experience_level: ExperienceLevel,
    pub goals: Vec<String>,
    pub pace: PaceHint,
    pub milestones: Vec<Milestone>,
    pub progress: ProgressTracker,
}

impl LearningPath {
    /// First milestone not yet completed.
    pub fn next_milestone(&self) -> Option<&Milestone> {
        self.milestones.iter().find(|m| !m.completed)
    }

    pub fn estimated_turns(&self) -> u32 {
        self.milestones.iter().map(|m| m.estimated_turns).sum()
    }
}
