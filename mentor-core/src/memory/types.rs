//! Memory record, tier and long-term entry types.

use crate::concept::ConceptId;
use crate::ids::MemoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of knowledge a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Facts and definitions
    Conceptual,
    /// How-to knowledge, commands, workflows
    Procedural,
    /// Something the learner did or saw happen
    Experiential,
}

/// Requested retention horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifespan {
    /// Dropped at session teardown
    Session,
    /// Kept until consolidation decides
    Short,
    /// Stored directly in long-term memory
    Long,
}

/// Urgency hint supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Normal
    }
}

/// Storage tier, ordered from most to least volatile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Working,
    ShortTerm,
    LongTerm,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Working => write!(f, "working"),
            Self::ShortTerm => write!(f, "short_term"),
            Self::LongTerm => write!(f, "long_term"),
        }
    }
}

/// Input for [`MemoryStore::store`](super::MemoryStore::store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: f64,
    #[serde(default)]
    pub urgency: Urgency,
    pub lifespan: Lifespan,
    pub concepts: Vec<ConceptId>,
    /// Override for the creation time (defaults to now)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMemory {
    /// Create a short-lived conceptual memory with importance 0.5.
    pub fn new(content: impl Into<String>, concepts: Vec<ConceptId>) -> Self {
        Self {
            content: content.into(),
            memory_type: MemoryType::Conceptual,
            importance: 0.5,
            urgency: Urgency::Normal,
            lifespan: Lifespan::Short,
            concepts,
            timestamp: None,
        }
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_lifespan(mut self, lifespan: Lifespan) -> Self {
        self.lifespan = lifespan;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A stored memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: f64,
    pub urgency: Urgency,
    pub lifespan: Lifespan,
    pub concepts: Vec<ConceptId>,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Times this record was stored, merged into or retrieved
    pub reinforcement_count: u32,
    /// Store-local insertion sequence, used as the final tie breaker
    pub sequence: u64,
    /// Logical tick of the last store/merge/retrieval touching this record
    pub last_touched_tick: u64,
}

impl MemoryRecord {
    /// The first concept tag, used to detect duplicates.
    pub fn primary_concept(&self) -> Option<&ConceptId> {
        self.concepts.first()
    }

    /// Concept tags as a set.
    pub fn concept_set(&self) -> BTreeSet<&ConceptId> {
        self.concepts.iter().collect()
    }

    /// Whether the record carries the given concept.
    pub fn has_concept(&self, concept: &ConceptId) -> bool {
        self.concepts.contains(concept)
    }

    /// Retention score for working-memory overflow; lower is evicted first.
    pub fn retention_score(&self) -> f64 {
        let urgency = match self.urgency {
            Urgency::Low => 0.0,
            Urgency::Normal => 0.1,
            Urgency::High => 0.25,
        };
        self.importance + urgency + (self.reinforcement_count as f64).ln_1p() * 0.1
    }
}

/// Kind of long-term entry produced by promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongTermKind {
    /// Knowledge about a concept
    Concept,
    /// Practiced, repeatable ability
    Skill,
}

/// A long-term concept or skill memory: the long-term tier's unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermEntry {
    pub concept: ConceptId,
    pub kind: LongTermKind,
    /// Mastery estimate in [0,1], grows with evidence
    pub mastery: f64,
    pub importance: f64,
    pub reinforcement_count: u32,
    pub last_reinforced: DateTime<Utc>,
    pub source_memories: Vec<MemoryId>,
}

impl LongTermEntry {
    /// Mastery estimate from accumulated evidence: 1 - 0.8^evidence.
    pub fn mastery_from_evidence(evidence: u32) -> f64 {
        1.0 - 0.8f64.powi(evidence.min(64) as i32)
    }

    /// Evidence count, alias of the reinforcement count.
    pub fn evidence_count(&self) -> u32 {
        self.reinforcement_count
    }
}

/// Ranking strategy for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Newest first
    Recency,
    /// Concept overlap weighted by importance and reinforcement
    Relevance,
    /// 0.6 relevance + 0.4 recency
    #[default]
    Comprehensive,
}

/// Retrieval query. Concepts come from explicit tags plus words of `text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub concepts: Vec<ConceptId>,
    #[serde(default)]
    pub strategy: RetrievalStrategy,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self::new("")
    }
}

impl MemoryQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            concepts: Vec::new(),
            strategy: RetrievalStrategy::default(),
            max_results: default_max_results(),
        }
    }

    pub fn with_concepts(mut self, concepts: Vec<ConceptId>) -> Self {
        self.concepts = concepts;
        self
    }

    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// A retrieved record with its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    /// Raw relevance score (0 when the query named no concepts)
    pub relevance: f64,
    /// Score used for ordering under the requested strategy
    pub score: f64,
}

/// Summary of one merged group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub concept: ConceptId,
    pub survivor: MemoryId,
    pub absorbed: Vec<MemoryId>,
}

/// Summary of one promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSummary {
    pub memory_id: MemoryId,
    pub concepts: Vec<ConceptId>,
    pub kind: LongTermKind,
    pub importance: f64,
    pub reinforcement_count: u32,
}

/// Outcome of a consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub promoted: Vec<PromotionSummary>,
    pub pruned: Vec<MemoryId>,
    pub merged: Vec<MergeSummary>,
    /// Decisions applied before cancellation, if the pass was cancelled
    pub cancelled: bool,
    pub iterations: usize,
}

impl ConsolidationReport {
    /// Whether the pass changed anything.
    pub fn is_noop(&self) -> bool {
        self.promoted.is_empty() && self.pruned.is_empty() && self.merged.is_empty()
    }

    /// Records strengthened by absorbing duplicates.
    pub fn strengthened(&self) -> usize {
        self.merged.len()
    }

    /// Memory ids that no longer exist after this pass.
    pub fn removed_ids(&self) -> impl Iterator<Item = &MemoryId> {
        self.pruned
            .iter()
            .chain(self.merged.iter().flat_map(|m| m.absorbed.iter()))
    }
}

/// Record counts per tier plus long-term entry counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDistribution {
    pub working: usize,
    pub short_term: usize,
    pub long_term: usize,
    pub concepts: usize,
    pub skills: usize,
}

impl MemoryDistribution {
    pub fn total_records(&self) -> usize {
        self.working + self.short_term + self.long_term
    }
}
