//! Request, response, connection and snapshot types.

use crate::concept::ConceptId;
use crate::error::{Error, Result};
use crate::ids::{ConnectionId, ExperienceId, MemoryId};
use crate::learning::{
    AdaptiveElement, BuildingBlock, CompletionEvidence, ContextLayer, LearnerProfile, LearningPhase,
    MasteryLevel,
};
use crate::memory::{LongTermEntry, MemoryDistribution, MemoryQuery, MemoryRecord, NewMemory};
use crate::progression::ProgressionSuggestion;
use crate::session::{ContextMap, ConversationTurn, NextStep, SessionMessage};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Requests and responses
// ============================================================================

/// One request routed to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PersistenceRequest {
    /// Create the session if absent; otherwise report the existing one
    Initialize {
        user_id: String,
        #[serde(default)]
        profile: LearnerProfile,
        #[serde(default)]
        goals: Vec<String>,
        #[serde(default)]
        context: Option<ContextMap>,
    },
    /// Store a memory and feed it to the learning experience
    Store {
        memory: NewMemory,
        /// Assessed performance of the interaction, if any
        #[serde(default)]
        performance: Option<f64>,
        #[serde(default)]
        exercise_completed: bool,
        #[serde(default)]
        context: Option<ContextMap>,
    },
    Retrieve { query: MemoryQuery },
    Consolidate,
    Advance {
        #[serde(default)]
        evidence: CompletionEvidence,
    },
    Snapshot,
}

impl PersistenceRequest {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Initialize { .. } => RequestType::Initialize,
            Self::Store { .. } => RequestType::Store,
            Self::Retrieve { .. } => RequestType::Retrieve,
            Self::Consolidate => RequestType::Consolidate,
            Self::Advance { .. } => RequestType::Advance,
            Self::Snapshot => RequestType::Snapshot,
        }
    }

    /// Shorthand for an initialize request with a default profile.
    pub fn initialize(user_id: impl Into<String>) -> Self {
        Self::Initialize {
            user_id: user_id.into(),
            profile: LearnerProfile::default(),
            goals: Vec::new(),
            context: None,
        }
    }

    /// Shorthand for a store request without performance data.
    pub fn store(memory: NewMemory) -> Self {
        Self::Store {
            memory,
            performance: None,
            exercise_completed: false,
            context: None,
        }
    }
}

/// Kind of request, carried on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Initialize,
    Store,
    Retrieve,
    Consolidate,
    Advance,
    Snapshot,
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialize => write!(f, "initialize"),
            Self::Store => write!(f, "store"),
            Self::Retrieve => write!(f, "retrieve"),
            Self::Consolidate => write!(f, "consolidate"),
            Self::Advance => write!(f, "advance"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Structured result of a request. Failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceResponse {
    pub success: bool,
    pub request_type: RequestType,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PersistenceResponse {
    pub fn ok(request_type: RequestType, session_id: &str, data: Value) -> Self {
        Self {
            success: true,
            request_type,
            session_id: session_id.to_string(),
            data: Some(data),
            recommendations: Vec::new(),
            error: None,
        }
    }

    /// Failure response; `error` should already carry request context.
    pub fn failure(request_type: RequestType, session_id: &str, error: &Error) -> Self {
        Self {
            success: false,
            request_type,
            session_id: session_id.to_string(),
            data: None,
            recommendations: error.recommendations(),
            error: Some(error.to_string()),
        }
    }

    /// Deserialize the payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| Error::Serialization("response carries no data".into()))?;
        Ok(serde_json::from_value(data)?)
    }
}

/// Payload of an initialize response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeOutcome {
    pub session_id: String,
    pub user_id: String,
    pub experience_id: ExperienceId,
    pub phase: LearningPhase,
    /// False when the session already existed
    pub created: bool,
}

/// Payload of a store response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub memory_id: MemoryId,
    pub connection_id: ConnectionId,
    pub concept: ConceptId,
    pub mastery: MasteryLevel,
    pub mastery_advanced: bool,
}

// ============================================================================
// Connections and events
// ============================================================================

/// Tunables for memory/learning connections.
///
/// Decay is counted in memory ticks: every stored record advances the
/// clock by one. A connection keeps its strength for `grace_ticks` after
/// its last reinforcement, then loses `decay_per_tick` per tick, never
/// going below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    pub initial_strength: f64,
    pub reinforce_step: f64,
    pub decay_per_tick: f64,
    pub grace_ticks: u64,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            initial_strength: 0.7,
            reinforce_step: 0.1,
            decay_per_tick: 0.02,
            grace_ticks: 10,
        }
    }
}

impl ConnectionPolicy {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("initial_strength", self.initial_strength),
            ("reinforce_step", self.reinforce_step),
            ("decay_per_tick", self.decay_per_tick),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within [0,1], got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Bidirectional link between a memory record and a learning experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConnection {
    pub id: ConnectionId,
    pub memory_id: MemoryId,
    pub experience_id: ExperienceId,
    pub concepts: Vec<ConceptId>,
    /// Strength in [0,1]
    pub strength: f64,
    pub created_tick: u64,
    pub last_reinforced_tick: u64,
    /// Tick up to which decay has been applied
    pub decayed_through_tick: u64,
}

impl ContextConnection {
    pub fn new(
        memory_id: MemoryId,
        experience_id: ExperienceId,
        concepts: Vec<ConceptId>,
        tick: u64,
        policy: &ConnectionPolicy,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            memory_id,
            experience_id,
            concepts,
            strength: policy.initial_strength.clamp(0.0, 1.0),
            created_tick: tick,
            last_reinforced_tick: tick,
            decayed_through_tick: tick,
        }
    }

    pub fn reinforce(&mut self, tick: u64, policy: &ConnectionPolicy) {
        self.strength = (self.strength + policy.reinforce_step).min(1.0);
        self.last_reinforced_tick = tick;
        self.decayed_through_tick = tick;
    }

    /// Apply decay up to `tick`; returns the strength lost.
    pub fn decay(&mut self, tick: u64, policy: &ConnectionPolicy) -> f64 {
        let start = self
            .decayed_through_tick
            .max(self.last_reinforced_tick.saturating_add(policy.grace_ticks));
        if tick <= start {
            return 0.0;
        }
        let before = self.strength;
        self.strength = (self.strength - policy.decay_per_tick * (tick - start) as f64).max(0.0);
        self.decayed_through_tick = tick;
        before - self.strength
    }
}

/// Observation logged while keeping the connection graph consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInsight {
    pub connection_id: ConnectionId,
    pub memory_id: MemoryId,
    pub detail: String,
    pub tick: u64,
    pub at: DateTime<Utc>,
}

/// Record of one consolidation's effect on the learner context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationEvent {
    pub tick: u64,
    pub at: DateTime<Utc>,
    pub promoted: usize,
    pub merged: usize,
    pub pruned: usize,
    pub reinforced_concepts: Vec<ConceptId>,
    pub connections_strengthened: usize,
    pub connections_removed: usize,
    pub cancelled: bool,
}

// ============================================================================
// Snapshots and persisted state
// ============================================================================

/// Component scores behind the composite progress figure, each in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeProgress {
    /// Share of records that reached long-term memory
    pub memory_efficiency: f64,
    /// Mastery advancements per interaction, relative to the fastest
    /// possible rate
    pub learning_velocity: f64,
    /// Mean of connection strength and capped layer density
    pub contextual_understanding: f64,
    /// Mean of the three components
    pub overall: f64,
}

/// Immutable view of a session at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub session_id: String,
    pub taken_at: DateTime<Utc>,
    pub tick: u64,
    pub memory: MemoryDistribution,
    pub phase: LearningPhase,
    pub mastery: BTreeMap<MasteryLevel, usize>,
    pub connections: Vec<ContextConnection>,
    pub progress: CompositeProgress,
}

/// Long-term layer of the persisted memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTermLayer {
    pub concepts: Vec<LongTermEntry>,
    pub skills: Vec<LongTermEntry>,
}

/// Persisted memory tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryLayers {
    pub working: Vec<MemoryRecord>,
    pub short_term: Vec<MemoryRecord>,
    /// Records promoted to or stored in long-term memory
    pub long_term_records: Vec<MemoryRecord>,
    pub long_term: LongTermLayer,
}

/// Everything a session owns, in a serializable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSessionState {
    pub session_id: String,
    pub user_id: String,
    pub messages: Vec<SessionMessage>,
    pub turns: Vec<ConversationTurn>,
    pub memory_layers: MemoryLayers,
    pub building_blocks: Vec<BuildingBlock>,
    pub context_layers: Vec<ContextLayer>,
    pub adaptive_elements: Vec<AdaptiveElement>,
    pub current_phase: LearningPhase,
    pub connections: Vec<ContextConnection>,
    pub adaptation_history: Vec<AdaptationEvent>,
}

/// Response-shaped structure for the upstream layer. The text is left
/// empty for the caller to fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseScaffold {
    pub text: String,
    /// Learner questions still waiting for an answer
    pub follow_up_questions: Vec<String>,
    /// `dimension:setting` labels of the adaptive elements
    pub hints: Vec<String>,
    pub progression_suggestions: Vec<ProgressionSuggestion>,
    pub next_steps: Vec<NextStep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_waits_for_grace_and_floors_at_zero() {
        let policy = ConnectionPolicy::default();
        let mut conn = ContextConnection::new(MemoryId::new(), ExperienceId::new(), Vec::new(), 0, &policy);

        assert_eq!(conn.decay(10, &policy), 0.0);
        assert!((conn.strength - 0.7).abs() < 1e-9);

        conn.decay(15, &policy);
        assert!((conn.strength - 0.6).abs() < 1e-9);
        // decay is not applied twice for the same ticks
        conn.decay(15, &policy);
        assert!((conn.strength - 0.6).abs() < 1e-9);

        conn.decay(1_000, &policy);
        assert_eq!(conn.strength, 0.0);
    }

    #[test]
    fn test_reinforce_caps_at_one() {
        let policy = ConnectionPolicy::default();
        let mut conn = ContextConnection::new(MemoryId::new(), ExperienceId::new(), Vec::new(), 0, &policy);
        for tick in 1..=5 {
            conn.reinforce(tick, &policy);
        }
        assert_eq!(conn.strength, 1.0);
    }

    #[test]
    fn test_request_serde_tag() {
        let request: PersistenceRequest = serde_json::from_str(r#"{"type":"snapshot"}"#).unwrap();
        assert_eq!(request.request_type(), RequestType::Snapshot);
        let request: PersistenceRequest =
            serde_json::from_str(r#"{"type":"initialize","user_id":"ada"}"#).unwrap();
        assert_eq!(request.request_type(), RequestType::Initialize);
    }
}
