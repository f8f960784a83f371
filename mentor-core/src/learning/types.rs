//! Learner profile, building block, layer and adaptation types.

use crate::concept::ConceptId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Learner profile
// ============================================================================

/// Self-reported or inferred experience level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl ExperienceLevel {
    /// Parse the free-form level strings the upstream layer sends.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "beginner" | "novice" | "new" => Some(Self::Beginner),
            "intermediate" | "familiar" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
            Self::Expert => write!(f, "expert"),
        }
    }
}

/// What the caller knows about the learner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub known_concepts: Vec<ConceptId>,
    #[serde(default)]
    pub goals: Vec<String>,
}

impl LearnerProfile {
    pub fn new(experience_level: ExperienceLevel) -> Self {
        Self {
            experience_level,
            ..Self::default()
        }
    }

    pub fn with_known_concepts(mut self, concepts: Vec<ConceptId>) -> Self {
        self.known_concepts = concepts;
        self
    }

    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.goals = goals;
        self
    }

    pub fn knows(&self, concept: &ConceptId) -> bool {
        self.known_concepts.contains(concept)
    }
}

// ============================================================================
// Building blocks
// ============================================================================

/// Ordered depth of understanding of a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    Introduced,
    Developing,
    Practiced,
    Mastered,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 4] = [
        Self::Introduced,
        Self::Developing,
        Self::Practiced,
        Self::Mastered,
    ];

    /// The next level, or `None` at mastered.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Introduced => Some(Self::Developing),
            Self::Developing => Some(Self::Practiced),
            Self::Practiced => Some(Self::Mastered),
            Self::Mastered => None,
        }
    }

    /// Position in [0,1], used for averages.
    pub fn ratio(self) -> f64 {
        match self {
            Self::Introduced => 0.0,
            Self::Developing => 1.0 / 3.0,
            Self::Practiced => 2.0 / 3.0,
            Self::Mastered => 1.0,
        }
    }
}

impl std::fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Introduced => write!(f, "introduced"),
            Self::Developing => write!(f, "developing"),
            Self::Practiced => write!(f, "practiced"),
            Self::Mastered => write!(f, "mastered"),
        }
    }
}

/// Why a block's mastery changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryChangeReason {
    /// Sustained good performance
    Advanced,
    /// Explicit review event
    Review,
}

/// One entry of a block's mastery history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryChange {
    pub concept: ConceptId,
    pub from: MasteryLevel,
    pub to: MasteryLevel,
    pub reason: MasteryChangeReason,
    pub turn: u64,
}

/// Smallest trackable curriculum unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingBlock {
    pub concept: ConceptId,
    /// Phase whose curriculum introduced the block (current phase for ad hoc blocks)
    pub phase: LearningPhase,
    pub prerequisites: Vec<ConceptId>,
    pub dependents: Vec<ConceptId>,
    pub mastery: MasteryLevel,
    /// Consecutive interactions at or above the success threshold
    pub success_streak: u32,
    pub interactions: u32,
    pub performance_sum: f64,
    pub performance_count: u32,
    pub last_reinforced_turn: u64,
    pub exercise_completed: bool,
    pub introduced_at: DateTime<Utc>,
    pub history: Vec<MasteryChange>,
}

impl BuildingBlock {
    pub fn new(concept: ConceptId, phase: LearningPhase, prerequisites: Vec<ConceptId>, turn: u64) -> Self {
        Self {
            concept,
            phase,
            prerequisites,
            dependents: Vec::new(),
            mastery: MasteryLevel::Introduced,
            success_streak: 0,
            interactions: 0,
            performance_sum: 0.0,
            performance_count: 0,
            last_reinforced_turn: turn,
            exercise_completed: false,
            introduced_at: Utc::now(),
            history: Vec::new(),
        }
    }

    pub fn average_performance(&self) -> Option<f64> {
        if self.performance_count == 0 {
            None
        } else {
            Some(self.performance_sum / self.performance_count as f64)
        }
    }

    pub fn is_at_least(&self, level: MasteryLevel) -> bool {
        self.mastery >= level
    }
}

// ============================================================================
// Context layers
// ============================================================================

/// Kind of knowledge grouped by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// What things are
    Conceptual,
    /// How to do things
    Procedural,
    /// When and why to apply them
    Conditional,
    /// Awareness of one's own learning
    Metacognitive,
}

impl LayerType {
    /// Pick a layer from the upstream intent label.
    pub fn from_intent(intent: Option<&str>) -> Self {
        let Some(intent) = intent else {
            return Self::Conceptual;
        };
        let intent = intent.to_lowercase();
        if ["debug", "troubleshoot", "error", "compare", "choose"]
            .iter()
            .any(|k| intent.contains(k))
        {
            Self::Conditional
        } else if ["how", "practice", "implement", "build", "command"]
            .iter()
            .any(|k| intent.contains(k))
        {
            Self::Procedural
        } else if ["reflect", "review", "progress", "plan"]
            .iter()
            .any(|k| intent.contains(k))
        {
            Self::Metacognitive
        } else {
            Self::Conceptual
        }
    }
}

/// Weighted undirected association between two knowledge elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConnection {
    pub a: ConceptId,
    pub b: ConceptId,
    pub weight: f64,
    pub co_mentions: u32,
}

impl ElementConnection {
    /// Whether this connection joins `x` and `y` in either order.
    pub fn joins(&self, x: &ConceptId, y: &ConceptId) -> bool {
        (&self.a == x && &self.b == y) || (&self.a == y && &self.b == x)
    }
}

/// Grouping of knowledge elements and their associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextLayer {
    pub layer_type: LayerType,
    pub elements: BTreeSet<ConceptId>,
    pub connections: Vec<ElementConnection>,
}

impl ContextLayer {
    pub fn new(layer_type: LayerType) -> Self {
        Self {
            layer_type,
            elements: BTreeSet::new(),
            connections: Vec::new(),
        }
    }

    /// Connections per element, 0 for an empty layer.
    pub fn density(&self) -> f64 {
        if self.elements.is_empty() {
            0.0
        } else {
            self.connections.len() as f64 / self.elements.len() as f64
        }
    }
}

// ============================================================================
// Adaptive elements
// ============================================================================

/// Dimension along which the experience adapts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationDimension {
    Difficulty,
    Pace,
    Modality,
    Scaffolding,
    Feedback,
}

impl AdaptationDimension {
    pub const ALL: [AdaptationDimension; 5] = [
        Self::Difficulty,
        Self::Pace,
        Self::Modality,
        Self::Scaffolding,
        Self::Feedback,
    ];

    /// Label of a setting notch.
    pub fn label(self, setting: u8) -> &'static str {
        let labels: [&'static str; 5] = match self {
            Self::Difficulty => ["very_easy", "easy", "moderate", "hard", "very_hard"],
            Self::Pace => ["very_slow", "slow", "steady", "fast", "very_fast"],
            Self::Modality => ["text", "examples", "diagrams", "interactive", "mixed"],
            Self::Scaffolding => ["none", "hints", "guided", "worked_examples", "step_by_step"],
            Self::Feedback => ["summary", "brief", "standard", "detailed", "immediate"],
        };
        labels[usize::from(setting.min(MAX_SETTING))]
    }
}

impl std::fmt::Display for AdaptationDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Difficulty => write!(f, "difficulty"),
            Self::Pace => write!(f, "pace"),
            Self::Modality => write!(f, "modality"),
            Self::Scaffolding => write!(f, "scaffolding"),
            Self::Feedback => write!(f, "feedback"),
        }
    }
}

/// Highest notch of any adaptive element.
pub const MAX_SETTING: u8 = 4;

/// One recorded adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRecord {
    pub dimension: AdaptationDimension,
    pub from: u8,
    pub to: u8,
    pub reason: String,
    pub turn: u64,
}

/// A tunable aspect of the experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveElement {
    pub dimension: AdaptationDimension,
    /// Notch in 0..=MAX_SETTING
    pub setting: u8,
    pub history: Vec<AdaptationRecord>,
}

impl AdaptiveElement {
    pub fn new(dimension: AdaptationDimension, setting: u8) -> Self {
        Self {
            dimension,
            setting: setting.min(MAX_SETTING),
            history: Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.dimension.label(self.setting)
    }

    /// Move one notch up (`true`) or down; returns the record if it moved.
    pub fn shift(&mut self, up: bool, reason: &str, turn: u64) -> Option<AdaptationRecord> {
        let from = self.setting;
        let to = if up {
            (from + 1).min(MAX_SETTING)
        } else {
            from.saturating_sub(1)
        };
        if to == from {
            return None;
        }
        self.setting = to;
        let record = AdaptationRecord {
            dimension: self.dimension,
            from,
            to,
            reason: reason.to_string(),
            turn,
        };
        self.history.push(record.clone());
        Some(record)
    }
}

// ============================================================================
// Phases
// ============================================================================

/// Learning phase, visited strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningPhase {
    Foundation,
    Building,
    Connecting,
    Applying,
    Mastering,
}

impl LearningPhase {
    pub const ALL: [LearningPhase; 5] = [
        Self::Foundation,
        Self::Building,
        Self::Connecting,
        Self::Applying,
        Self::Mastering,
    ];

    /// Starting phase for a learner.
    pub fn initial_for(level: ExperienceLevel) -> Self {
        if level == ExperienceLevel::Beginner {
            Self::Foundation
        } else {
            Self::Building
        }
    }

    /// The single allowed successor, `None` at mastering.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Foundation => Some(Self::Building),
            Self::Building => Some(Self::Connecting),
            Self::Connecting => Some(Self::Applying),
            Self::Applying => Some(Self::Mastering),
            Self::Mastering => None,
        }
    }

    /// Layer the phase concentrates on.
    pub fn focus_layer(self) -> LayerType {
        match self {
            Self::Foundation => LayerType::Conceptual,
            Self::Building => LayerType::Procedural,
            Self::Connecting => LayerType::Conceptual,
            Self::Applying => LayerType::Conditional,
            Self::Mastering => LayerType::Metacognitive,
        }
    }
}

impl std::fmt::Display for LearningPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Foundation => write!(f, "foundation"),
            Self::Building => write!(f, "building"),
            Self::Connecting => write!(f, "connecting"),
            Self::Applying => write!(f, "applying"),
            Self::Mastering => write!(f, "mastering"),
        }
    }
}

/// A recorded phase transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: LearningPhase,
    pub to: LearningPhase,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Interaction input
// ============================================================================

/// One observed learning interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningDatum {
    pub concept: ConceptId,
    /// Performance in [0,1], if the interaction was assessed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<f64>,
    /// Concepts mentioned alongside the main one
    #[serde(default)]
    pub related: Vec<ConceptId>,
    /// Layer override; otherwise derived from the context intent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<LayerType>,
    #[serde(default)]
    pub exercise_completed: bool,
    #[serde(default)]
    pub turn: u64,
}

impl LearningDatum {
    pub fn new(concept: ConceptId) -> Self {
        Self {
            concept,
            performance: None,
            related: Vec::new(),
            layer: None,
            exercise_completed: false,
            turn: 0,
        }
    }

    pub fn with_performance(mut self, performance: f64) -> Self {
        self.performance = Some(performance);
        self
    }

    pub fn with_related(mut self, related: Vec<ConceptId>) -> Self {
        self.related = related;
        self
    }

    pub fn with_layer(mut self, layer: LayerType) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_exercise_completed(mut self) -> Self {
        self.exercise_completed = true;
        self
    }

    pub fn at_turn(mut self, turn: u64) -> Self {
        self.turn = turn;
        self
    }
}

/// Outcome of one incremental update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalUpdate {
    pub concept: ConceptId,
    pub block_created: bool,
    pub mastery_before: MasteryLevel,
    pub mastery_after: MasteryLevel,
    /// The streak qualified but a prerequisite was not yet practiced
    pub gated: bool,
    pub connections_created: usize,
    pub connections_strengthened: usize,
    pub adaptations: Vec<AdaptationRecord>,
}

impl IncrementalUpdate {
    pub fn advanced(&self) -> bool {
        self.mastery_after > self.mastery_before
    }
}
