//! Everything one session owns, and the operations over it.

use crate::concept::{ConceptId, ConceptTag};
use crate::config::MentorConfig;
use crate::error::{Error, Result};
use crate::ids::MemoryId;
use crate::learning::{
    CompletionEvidence, LearnerProfile, LearningDatum, LearningExperience, MasteryChange,
    PhaseAdvance,
};
use crate::memory::{
    CancelFlag, ConsolidationReport, MemoryQuery, MemoryStore, MemoryType, NewMemory, ScoredRecord,
    Tier,
};
use crate::orchestrator::types::*;
use crate::progression::{assess_current_skills, generate_progression_suggestions};
use crate::session::{
    context_experience_level, context_intent, ContextMap, ConversationTurn, ConversationalSession,
    MessageMetadata,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Importance added to memories of concepts a newly entered phase covers.
pub const PHASE_ENTRY_BOOST: f64 = 0.2;

/// Importance of memories recorded from conversation tags.
const TURN_TAG_IMPORTANCE: f64 = 0.4;

/// Payload of an advance response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    #[serde(flatten)]
    pub advance: PhaseAdvance,
    /// Records whose importance was boosted for the entered phase
    pub boosted: Vec<MemoryId>,
}

/// Payload of a consolidate response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidateOutcome {
    pub report: ConsolidationReport,
    pub event: AdaptationEvent,
}

/// A session's memory partition, learning experience and cross-links.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session: ConversationalSession,
    pub experience: LearningExperience,
    pub memory: MemoryStore,
    pub connections: Vec<ContextConnection>,
    pub adaptation_history: Vec<AdaptationEvent>,
    pub insights: Vec<MemoryInsight>,
}

impl SessionState {
    pub fn new(
        session_id: &str,
        user_id: &str,
        profile: LearnerProfile,
        goals: Vec<String>,
        context: Option<&ContextMap>,
        config: &MentorConfig,
    ) -> Self {
        let mut profile = profile;
        if let Some(level) = context.and_then(context_experience_level) {
            profile.experience_level = level;
        }
        let mut goals = goals;
        for goal in &profile.goals {
            if !goals.contains(goal) {
                goals.push(goal.clone());
            }
        }

        let mut session = ConversationalSession::new(session_id, user_id, config.session.clone()).with_goals(goals);
        if let Some(ctx) = context {
            session.current_context = ctx.clone();
        }

        Self {
            session,
            experience: LearningExperience::bootstrap(user_id, profile, &config.learning),
            memory: MemoryStore::new(config.memory.clone()),
            connections: Vec::new(),
            adaptation_history: Vec::new(),
            insights: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn initialize_outcome(&self, created: bool) -> InitializeOutcome {
        InitializeOutcome {
            session_id: self.session.session_id.clone(),
            user_id: self.session.user_id.clone(),
            experience_id: self.experience.id,
            phase: self.experience.phase,
            created,
        }
    }

    // ==================== Store ====================

    /// Store a memory, feed its concepts to the experience and link the two.
    pub fn store(
        &mut self,
        memory: NewMemory,
        performance: Option<f64>,
        exercise_completed: bool,
        context: Option<&ContextMap>,
        config: &MentorConfig,
    ) -> Result<StoreOutcome> {
        let memory_id = self.memory.store(memory)?;
        let tick = self.memory.tick();
        let concepts = self
            .memory
            .get(&memory_id)
            .map(|r| r.concepts.clone())
            .unwrap_or_default();
        let Some((primary, related)) = concepts.split_first() else {
            return Err(Error::Internal(format!(
                "stored record {} has no concepts",
                memory_id
            )));
        };

        let mut datum = LearningDatum::new(primary.clone())
            .with_related(related.to_vec())
            .at_turn(tick);
        datum.performance = performance;
        datum.exercise_completed = exercise_completed;

        let intent = context
            .and_then(context_intent)
            .or_else(|| context_intent(&self.session.current_context));
        let update = self
            .experience
            .build_incremental_context(&datum, intent.as_deref(), &config.learning)?;

        let connection = ContextConnection::new(
            memory_id,
            self.experience.id,
            concepts.clone(),
            tick,
            &config.connections,
        );
        let connection_id = connection.id;
        self.connections.push(connection);

        debug!(
            session_id = %self.session.session_id,
            memory_id = %memory_id,
            concept = %primary,
            mastery = %update.mastery_after,
            "Stored and linked memory"
        );
        Ok(StoreOutcome {
            memory_id,
            connection_id,
            concept: primary.clone(),
            mastery: update.mastery_after,
            mastery_advanced: update.advanced(),
        })
    }

    pub fn retrieve(&mut self, query: &MemoryQuery) -> Result<Vec<ScoredRecord>> {
        self.memory.retrieve(query)
    }

    // ==================== Consolidate ====================

    /// Consolidate memory and carry the result into the learner context.
    ///
    /// Promoted and merged concepts reinforce their blocks. Connections to
    /// promoted or merge-surviving records are strengthened, connections to
    /// records that no longer exist are removed, and the rest decay.
    pub fn consolidate(&mut self, cancel: &CancelFlag, config: &MentorConfig) -> Result<ConsolidateOutcome> {
        let report = self.memory.consolidate(cancel)?;
        let tick = self.memory.tick();

        let mut reinforced: Vec<ConceptId> = Vec::new();
        let promoted_concepts = report.promoted.iter().flat_map(|p| p.concepts.iter());
        let merged_concepts = report.merged.iter().map(|m| &m.concept);
        for concept in promoted_concepts.chain(merged_concepts) {
            if !reinforced.contains(concept) {
                reinforced.push(concept.clone());
            }
        }
        for concept in &reinforced {
            self.experience.reinforce(concept, tick);
        }

        let removed = self.drop_dangling_connections(tick);

        let touched: BTreeSet<MemoryId> = report
            .promoted
            .iter()
            .map(|p| p.memory_id)
            .chain(report.merged.iter().map(|m| m.survivor))
            .collect();
        let mut strengthened = 0;
        for connection in &mut self.connections {
            if touched.contains(&connection.memory_id) {
                connection.reinforce(tick, &config.connections);
                strengthened += 1;
            } else {
                connection.decay(tick, &config.connections);
            }
        }

        let event = AdaptationEvent {
            tick,
            at: Utc::now(),
            promoted: report.promoted.len(),
            merged: report.merged.len(),
            pruned: report.pruned.len(),
            reinforced_concepts: reinforced,
            connections_strengthened: strengthened,
            connections_removed: removed,
            cancelled: report.cancelled,
        };
        self.adaptation_history.push(event.clone());
        Ok(ConsolidateOutcome { report, event })
    }

    /// Remove connections whose memory record is gone, logging an insight
    /// for each.
    pub fn drop_dangling_connections(&mut self, tick: u64) -> usize {
        let (kept, dangling): (Vec<ContextConnection>, Vec<ContextConnection>) =
            std::mem::take(&mut self.connections)
                .into_iter()
                .partition(|c| self.memory.contains(&c.memory_id));
        self.connections = kept;

        for connection in &dangling {
            warn!(
                session_id = %self.session.session_id,
                connection_id = %connection.id,
                memory_id = %connection.memory_id,
                "Removed dangling context connection"
            );
            self.insights.push(MemoryInsight {
                connection_id: connection.id,
                memory_id: connection.memory_id,
                detail: "memory record no longer exists; connection removed".to_string(),
                tick,
                at: Utc::now(),
            });
        }
        dangling.len()
    }

    // ==================== Advance ====================

    pub fn advance(&mut self, evidence: &CompletionEvidence, config: &MentorConfig) -> Result<AdvanceOutcome> {
        let advance = self.experience.advance_phase(evidence, &config.learning)?;
        let mut boosted = Vec::new();
        if advance.advanced {
            let relevant: Vec<ConceptId> = config
                .learning
                .template(advance.current_phase)
                .map(|t| t.blocks.iter().map(|b| b.concept.clone()).collect())
                .unwrap_or_default();
            boosted = self.memory.boost_concepts(&relevant, PHASE_ENTRY_BOOST);
        }
        Ok(AdvanceOutcome { advance, boosted })
    }

    /// Explicit review of a concept: its block drops back to developing
    /// and counts as reinforced now. `None` when it was not above
    /// developing.
    pub fn review(&mut self, concept: &ConceptId) -> Result<Option<MasteryChange>> {
        let tick = self.memory.tick();
        let change = self.experience.review_block(concept, tick)?;
        if let Some(change) = &change {
            debug!(
                session_id = %self.session.session_id,
                concept = %concept,
                from = %change.from,
                "Reviewed building block"
            );
        }
        Ok(change)
    }

    // ==================== Turns ====================

    /// Record a conversation turn and store one memory per tag the
    /// assistant used. Commands are stored as procedural knowledge,
    /// patterns as conceptual.
    pub fn record_turn(
        &mut self,
        user: &str,
        assistant: &str,
        context: Option<ContextMap>,
        metadata: Option<MessageMetadata>,
        config: &MentorConfig,
    ) -> Result<ConversationTurn> {
        let turn = self.session.create_turn(user, assistant, context, metadata)?.clone();
        for point in &turn.learning_points {
            let memory_type = match point.tag {
                ConceptTag::Command(_) => MemoryType::Procedural,
                ConceptTag::Pattern(_) => MemoryType::Conceptual,
            };
            let memory = NewMemory::new(turn.assistant.content.clone(), vec![point.tag.concept().clone()])
                .with_type(memory_type)
                .with_importance(TURN_TAG_IMPORTANCE)
                .with_timestamp(turn.created_at);
            self.store(memory, None, false, None, config)?;
        }
        Ok(turn)
    }

    // ==================== Views ====================

    pub fn snapshot(&self, config: &MentorConfig) -> ContextSnapshot {
        let memory = self.memory.distribution();
        let memory_efficiency = if memory.total_records() == 0 {
            0.0
        } else {
            memory.long_term as f64 / memory.total_records() as f64
        };

        let learning_velocity = if self.experience.interactions == 0 {
            0.0
        } else {
            let fastest = 1.0 / f64::from(config.learning.success_streak.max(1));
            let rate = self.experience.mastery_advancements as f64 / self.experience.interactions as f64;
            (rate / fastest).clamp(0.0, 1.0)
        };

        let strength = if self.connections.is_empty() {
            0.0
        } else {
            self.connections.iter().map(|c| c.strength).sum::<f64>() / self.connections.len() as f64
        };
        let elements: usize = self.experience.layers.iter().map(|l| l.elements.len()).sum();
        let links: usize = self.experience.layers.iter().map(|l| l.connections.len()).sum();
        let density = if elements == 0 {
            0.0
        } else {
            (links as f64 / elements as f64).min(1.0)
        };
        let contextual_understanding = (strength + density) / 2.0;

        ContextSnapshot {
            session_id: self.session.session_id.clone(),
            taken_at: Utc::now(),
            tick: self.memory.tick(),
            memory,
            phase: self.experience.phase,
            mastery: self.experience.mastery_distribution(),
            connections: self.connections.clone(),
            progress: CompositeProgress {
                memory_efficiency,
                learning_velocity,
                contextual_understanding,
                overall: (memory_efficiency + learning_velocity + contextual_understanding) / 3.0,
            },
        }
    }

    pub fn export(&self) -> PersistedSessionState {
        PersistedSessionState {
            session_id: self.session.session_id.clone(),
            user_id: self.session.user_id.clone(),
            messages: self.session.messages.clone(),
            turns: self.session.turns.clone(),
            memory_layers: MemoryLayers {
                working: self.memory.records_in(Tier::Working).cloned().collect(),
                short_term: self.memory.records_in(Tier::ShortTerm).cloned().collect(),
                long_term_records: self.memory.records_in(Tier::LongTerm).cloned().collect(),
                long_term: LongTermLayer {
                    concepts: self.memory.long_term_concepts().cloned().collect(),
                    skills: self.memory.long_term_skills().cloned().collect(),
                },
            },
            building_blocks: self.experience.blocks.values().cloned().collect(),
            context_layers: self.experience.layers.clone(),
            adaptive_elements: self.experience.adaptive.clone(),
            current_phase: self.experience.phase,
            connections: self.connections.clone(),
            adaptation_history: self.adaptation_history.clone(),
        }
    }

    pub fn response_scaffold(&self, config: &MentorConfig) -> ResponseScaffold {
        let follow_up_questions = self
            .session
            .pending_questions
            .iter()
            .filter_map(|idx| self.session.messages.get(*idx))
            .map(|m| m.content.clone())
            .collect();
        let hints = self
            .experience
            .adaptive
            .iter()
            .map(|e| format!("{}:{}", e.dimension, e.label()))
            .collect();

        let assessment = assess_current_skills(
            &self.experience.profile,
            &self.session.messages,
            &config.progression.categories,
        );
        let progression_suggestions = generate_progression_suggestions(
            &self.experience,
            &assessment,
            self.memory.tick(),
            &config.progression,
        );
        let next_steps = self
            .session
            .turns
            .last()
            .map(|t| t.next_steps.clone())
            .unwrap_or_default();

        ResponseScaffold {
            text: String::new(),
            follow_up_questions,
            hints,
            progression_suggestions,
            next_steps,
        }
    }
}
