//! A learner's experience: building blocks, context layers, adaptive
//! elements and the phase state machine.

use crate::concept::ConceptId;
use crate::error::{Error, Result};
use crate::ids::ExperienceId;
use crate::learning::config::LearningConfig;
use crate::learning::phase::{CompletionEvidence, CompletionMetric, CompletionStatus, PhaseAdvance};
use crate::learning::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-learner learning state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningExperience {
    pub id: ExperienceId,
    pub user_id: String,
    pub profile: LearnerProfile,
    pub phase: LearningPhase,
    pub phase_history: Vec<PhaseTransition>,
    pub blocks: BTreeMap<ConceptId, BuildingBlock>,
    pub layers: Vec<ContextLayer>,
    pub adaptive: Vec<AdaptiveElement>,
    /// Consecutive interactions below the low threshold
    pub low_streak: u32,
    /// Consecutive interactions above the high threshold
    pub high_streak: u32,
    pub interactions: u64,
    pub mastery_advancements: u64,
    pub created_at: DateTime<Utc>,
}

impl LearningExperience {
    /// Bootstrap an experience for a learner.
    ///
    /// Blocks of every phase up to the starting one are created. Blocks of
    /// phases the learner skips by experience level, and blocks for concepts
    /// the profile already lists, start at practiced.
    pub fn bootstrap(user_id: impl Into<String>, profile: LearnerProfile, config: &LearningConfig) -> Self {
        let phase = LearningPhase::initial_for(profile.experience_level);
        let starting = if profile.experience_level == ExperienceLevel::Beginner { 1 } else { 2 };

        let adaptive = AdaptationDimension::ALL
            .iter()
            .map(|d| {
                let setting = match (d, profile.experience_level) {
                    (AdaptationDimension::Difficulty, ExperienceLevel::Beginner) => 1,
                    (AdaptationDimension::Scaffolding, ExperienceLevel::Beginner) => 3,
                    (AdaptationDimension::Difficulty, ExperienceLevel::Advanced | ExperienceLevel::Expert) => 3,
                    (AdaptationDimension::Scaffolding, ExperienceLevel::Advanced | ExperienceLevel::Expert) => 1,
                    _ => 2,
                };
                AdaptiveElement::new(*d, setting)
            })
            .collect();

        let mut experience = Self {
            id: ExperienceId::new(),
            user_id: user_id.into(),
            profile,
            phase,
            phase_history: Vec::new(),
            blocks: BTreeMap::new(),
            layers: vec![ContextLayer::new(phase.focus_layer())],
            adaptive,
            low_streak: 0,
            high_streak: 0,
            interactions: 0,
            mastery_advancements: 0,
            created_at: Utc::now(),
        };

        for template_phase in LearningPhase::ALL.iter().take(starting).copied() {
            experience.add_phase_blocks(template_phase, config, 0);
        }
        let known: Vec<ConceptId> = experience.profile.known_concepts.clone();
        for block in experience.blocks.values_mut() {
            let skipped = block.phase < phase;
            if skipped || known.contains(&block.concept) {
                block.mastery = MasteryLevel::Practiced;
            }
        }
        experience
    }

    /// Create curriculum blocks for `phase`; returns the concepts added.
    fn add_phase_blocks(&mut self, phase: LearningPhase, config: &LearningConfig, turn: u64) -> Vec<ConceptId> {
        let Some(template) = config.template(phase) else {
            return Vec::new();
        };
        let mut added = Vec::new();
        for template_block in &template.blocks {
            if self.blocks.contains_key(&template_block.concept) {
                continue;
            }
            self.insert_block(BuildingBlock::new(
                template_block.concept.clone(),
                phase,
                template_block.prerequisites.clone(),
                turn,
            ));
            added.push(template_block.concept.clone());
        }
        added
    }

    fn insert_block(&mut self, block: BuildingBlock) {
        for prerequisite in &block.prerequisites {
            if let Some(parent) = self.blocks.get_mut(prerequisite) {
                if !parent.dependents.contains(&block.concept) {
                    parent.dependents.push(block.concept.clone());
                }
            }
        }
        let concept = block.concept.clone();
        let dependents: Vec<ConceptId> = self
            .blocks
            .values()
            .filter(|b| b.prerequisites.contains(&concept))
            .map(|b| b.concept.clone())
            .collect();
        let mut block = block;
        for dependent in dependents {
            if !block.dependents.contains(&dependent) {
                block.dependents.push(dependent);
            }
        }
        self.blocks.insert(concept, block);
    }

    pub fn block(&self, concept: &ConceptId) -> Option<&BuildingBlock> {
        self.blocks.get(concept)
    }

    /// Whether every prerequisite of `concept` is at least practiced.
    /// Prerequisites without a block are not satisfied.
    pub fn prerequisites_met(&self, concept: &ConceptId) -> bool {
        let Some(block) = self.blocks.get(concept) else {
            return false;
        };
        block.prerequisites.iter().all(|p| {
            self.blocks
                .get(p)
                .map(|b| b.is_at_least(MasteryLevel::Practiced))
                .unwrap_or(false)
        })
    }

    // ==================== Mastery transitions ====================

    /// Move a block to `target`.
    ///
    /// Forward moves must be exactly one level and, into developing, need
    /// every prerequisite practiced. Backward moves are only allowed for
    /// [`MasteryChangeReason::Review`].
    pub fn transition_block(
        &mut self,
        concept: &ConceptId,
        target: MasteryLevel,
        reason: MasteryChangeReason,
        turn: u64,
    ) -> Result<Option<MasteryChange>> {
        let current = self
            .blocks
            .get(concept)
            .map(|b| b.mastery)
            .ok_or_else(|| Error::not_found("building block", concept))?;

        if target == current {
            return Ok(None);
        }
        match reason {
            MasteryChangeReason::Advanced => {
                if target < current {
                    return Err(Error::state_conflict(format!(
                        "mastery of `{}` cannot regress from {} to {} without a review",
                        concept, current, target
                    )));
                }
                if current.next() != Some(target) {
                    return Err(Error::state_conflict(format!(
                        "mastery of `{}` cannot skip from {} to {}",
                        concept, current, target
                    )));
                }
                if target == MasteryLevel::Developing && !self.prerequisites_met(concept) {
                    return Err(Error::state_conflict(format!(
                        "`{}` cannot enter developing before its prerequisites are practiced",
                        concept
                    )));
                }
            }
            MasteryChangeReason::Review => {
                if target > current {
                    return Err(Error::state_conflict(format!(
                        "a review cannot raise mastery of `{}`",
                        concept
                    )));
                }
            }
        }

        let change = MasteryChange {
            concept: concept.clone(),
            from: current,
            to: target,
            reason,
            turn,
        };
        if let Some(block) = self.blocks.get_mut(concept) {
            block.mastery = target;
            block.success_streak = 0;
            block.history.push(change.clone());
        }
        if reason == MasteryChangeReason::Advanced {
            self.mastery_advancements += 1;
        }
        debug!(concept = %concept, from = %current, to = %target, "Block mastery changed");
        Ok(Some(change))
    }

    /// Explicit review event: drop a block back to developing.
    pub fn review_block(&mut self, concept: &ConceptId, turn: u64) -> Result<Option<MasteryChange>> {
        let current = self
            .blocks
            .get(concept)
            .map(|b| b.mastery)
            .ok_or_else(|| Error::not_found("building block", concept))?;
        if current <= MasteryLevel::Developing {
            return Ok(None);
        }
        let change = self.transition_block(concept, MasteryLevel::Developing, MasteryChangeReason::Review, turn)?;
        if let Some(block) = self.blocks.get_mut(concept) {
            block.last_reinforced_turn = turn;
        }
        Ok(change)
    }

    /// Mark a concept as reinforced without an assessed interaction.
    pub fn reinforce(&mut self, concept: &ConceptId, turn: u64) {
        if !self.blocks.contains_key(concept) {
            let phase = self.phase;
            self.insert_block(BuildingBlock::new(concept.clone(), phase, Vec::new(), turn));
        }
        if let Some(block) = self.blocks.get_mut(concept) {
            block.last_reinforced_turn = block.last_reinforced_turn.max(turn);
        }
    }

    // ==================== Incremental context ====================

    /// Apply one learning interaction.
    pub fn build_incremental_context(
        &mut self,
        datum: &LearningDatum,
        intent: Option<&str>,
        config: &LearningConfig,
    ) -> Result<IncrementalUpdate> {
        if let Some(p) = datum.performance {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(Error::validation("performance", format!("must be within [0,1], got {}", p)));
            }
        }

        let concept = &datum.concept;
        let block_created = !self.blocks.contains_key(concept);
        if block_created {
            let phase = self.phase;
            self.insert_block(BuildingBlock::new(concept.clone(), phase, Vec::new(), datum.turn));
        }
        for related in &datum.related {
            if !self.blocks.contains_key(related) {
                let phase = self.phase;
                self.insert_block(BuildingBlock::new(related.clone(), phase, Vec::new(), datum.turn));
            }
        }

        let mastery_before = self.blocks[concept].mastery;
        let mut gated = false;
        self.interactions += 1;

        let streak_ready = {
            let block = self
                .blocks
                .get_mut(concept)
                .ok_or_else(|| Error::Internal(format!("block `{}` vanished", concept)))?;
            block.interactions += 1;
            block.last_reinforced_turn = block.last_reinforced_turn.max(datum.turn);
            if datum.exercise_completed {
                block.exercise_completed = true;
            }
            match datum.performance {
                Some(p) => {
                    block.performance_sum += p;
                    block.performance_count += 1;
                    if p >= config.success_threshold {
                        block.success_streak += 1;
                    } else {
                        block.success_streak = 0;
                    }
                    block.success_streak >= config.success_streak
                }
                None => false,
            }
        };

        if streak_ready {
            if let Some(target) = mastery_before.next() {
                if target == MasteryLevel::Developing && !self.prerequisites_met(concept) {
                    gated = true;
                    debug!(concept = %concept, "Mastery advance gated on prerequisites");
                } else {
                    self.transition_block(concept, target, MasteryChangeReason::Advanced, datum.turn)?;
                }
            }
        }

        let layer_type = datum.layer.unwrap_or_else(|| LayerType::from_intent(intent));
        let (connections_created, connections_strengthened) =
            self.connect_elements(layer_type, concept, &datum.related, config);

        let adaptations = match datum.performance {
            Some(p) => self.tune_adaptive(p, datum.turn, config),
            None => Vec::new(),
        };

        Ok(IncrementalUpdate {
            concept: concept.clone(),
            block_created,
            mastery_before,
            mastery_after: self.blocks[concept].mastery,
            gated,
            connections_created,
            connections_strengthened,
            adaptations,
        })
    }

    fn layer_mut(&mut self, layer_type: LayerType) -> &mut ContextLayer {
        if let Some(pos) = self.layers.iter().position(|l| l.layer_type == layer_type) {
            &mut self.layers[pos]
        } else {
            self.layers.push(ContextLayer::new(layer_type));
            let last = self.layers.len() - 1;
            &mut self.layers[last]
        }
    }

    /// Add elements to a layer and link every co-mentioned pair.
    fn connect_elements(
        &mut self,
        layer_type: LayerType,
        concept: &ConceptId,
        related: &[ConceptId],
        config: &LearningConfig,
    ) -> (usize, usize) {
        let mut elements: Vec<ConceptId> = vec![concept.clone()];
        for r in related {
            if !elements.contains(r) {
                elements.push(r.clone());
            }
        }

        let layer = self.layer_mut(layer_type);
        layer.elements.extend(elements.iter().cloned());

        let (mut created, mut strengthened) = (0, 0);
        for (i, x) in elements.iter().enumerate() {
            for y in &elements[i + 1..] {
                match layer.connections.iter_mut().find(|c| c.joins(x, y)) {
                    Some(existing) => {
                        existing.weight = (existing.weight + config.connection_step).min(1.0);
                        existing.co_mentions += 1;
                        strengthened += 1;
                    }
                    None => {
                        let (a, b) = if x <= y { (x, y) } else { (y, x) };
                        layer.connections.push(ElementConnection {
                            a: a.clone(),
                            b: b.clone(),
                            weight: config.initial_connection_weight,
                            co_mentions: 1,
                        });
                        created += 1;
                    }
                }
            }
        }
        (created, strengthened)
    }

    /// Ease off after repeated struggle, push after repeated success.
    ///
    /// Difficulty and pace move together; scaffolding moves the opposite way.
    fn tune_adaptive(&mut self, performance: f64, turn: u64, config: &LearningConfig) -> Vec<AdaptationRecord> {
        if performance < config.low_threshold {
            self.low_streak += 1;
        } else {
            self.low_streak = 0;
        }
        if performance > config.high_threshold {
            self.high_streak += 1;
        } else {
            self.high_streak = 0;
        }

        let direction = if self.low_streak >= config.low_streak {
            self.low_streak = 0;
            Some((false, "repeated low performance"))
        } else if self.high_streak >= config.high_streak {
            self.high_streak = 0;
            Some((true, "sustained high performance"))
        } else {
            None
        };

        let Some((harder, reason)) = direction else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for element in &mut self.adaptive {
            let shifted = match element.dimension {
                AdaptationDimension::Difficulty | AdaptationDimension::Pace => {
                    element.shift(harder, reason, turn)
                }
                AdaptationDimension::Scaffolding => element.shift(!harder, reason, turn),
                AdaptationDimension::Modality | AdaptationDimension::Feedback => None,
            };
            records.extend(shifted);
        }
        if !records.is_empty() {
            debug!(harder, changes = records.len(), "Adapted experience");
        }
        records
    }

    pub fn adaptive_element(&self, dimension: AdaptationDimension) -> Option<&AdaptiveElement> {
        self.adaptive.iter().find(|e| e.dimension == dimension)
    }

    // ==================== Phases ====================

    /// Metrics measured from the current state.
    pub fn measured_evidence(&self, config: &LearningConfig) -> CompletionEvidence {
        let phase_blocks: Vec<&BuildingBlock> = match config.template(self.phase) {
            Some(template) => template
                .blocks
                .iter()
                .filter_map(|t| self.blocks.get(&t.concept))
                .collect(),
            None => self.blocks.values().filter(|b| b.phase == self.phase).collect(),
        };
        let coverage = if phase_blocks.is_empty() {
            0.0
        } else {
            phase_blocks
                .iter()
                .filter(|b| b.is_at_least(MasteryLevel::Practiced))
                .count() as f64
                / phase_blocks.len() as f64
        };

        let (sum, count) = self
            .blocks
            .values()
            .fold((0.0, 0u32), |(s, c), b| (s + b.performance_sum, c + b.performance_count));
        let average_performance = if count == 0 { 0.0 } else { sum / count as f64 };

        let connections: usize = self.layers.iter().map(|l| l.connections.len()).sum();
        let exercises = self.blocks.values().filter(|b| b.exercise_completed).count();

        CompletionEvidence::new()
            .with(CompletionMetric::ConceptCoverage, coverage)
            .with(CompletionMetric::AveragePerformance, average_performance)
            .with(CompletionMetric::Interactions, self.interactions as f64)
            .with(CompletionMetric::Connections, connections as f64)
            .with(CompletionMetric::ExercisesCompleted, exercises as f64)
    }

    /// Evaluate the current phase's exit criteria.
    pub fn completion_status(&self, evidence: &CompletionEvidence, config: &LearningConfig) -> CompletionStatus {
        let criteria = config
            .template(self.phase)
            .map(|t| t.criteria.as_slice())
            .unwrap_or(&[]);
        CompletionStatus::evaluate(self.phase, criteria, &self.measured_evidence(config), evidence)
    }

    /// Move to the next phase if every criterion of the current one is met.
    pub fn advance_phase(&mut self, evidence: &CompletionEvidence, config: &LearningConfig) -> Result<PhaseAdvance> {
        let status = self.completion_status(evidence, config);
        let previous = self.phase;

        let Some(next) = previous.next() else {
            debug!("Already in the terminal phase");
            return Ok(PhaseAdvance {
                advanced: false,
                previous_phase: previous,
                current_phase: previous,
                completion_status: status,
                new_concepts: Vec::new(),
            });
        };

        if !status.all_met() {
            return Ok(PhaseAdvance {
                advanced: false,
                previous_phase: previous,
                current_phase: previous,
                completion_status: status,
                new_concepts: Vec::new(),
            });
        }

        let new_concepts = self.enter_phase(next, config)?;
        Ok(PhaseAdvance {
            advanced: true,
            previous_phase: previous,
            current_phase: next,
            completion_status: status,
            new_concepts,
        })
    }

    /// Enter `target`, which must be the immediate successor of the
    /// current phase. Regenerates the phase's blocks and focus layer.
    pub fn enter_phase(&mut self, target: LearningPhase, config: &LearningConfig) -> Result<Vec<ConceptId>> {
        if self.phase.next() != Some(target) {
            return Err(Error::state_conflict(format!(
                "cannot move from phase {} to {}",
                self.phase, target
            )));
        }
        let turn = self.blocks.values().map(|b| b.last_reinforced_turn).max().unwrap_or(0);
        let from = self.phase;
        self.phase = target;
        self.phase_history.push(PhaseTransition {
            from,
            to: target,
            at: Utc::now(),
        });
        let added = self.add_phase_blocks(target, config, turn);
        self.layer_mut(target.focus_layer());

        info!(experience_id = %self.id, from = %from, to = %target, new_blocks = added.len(), "Entered learning phase");
        Ok(added)
    }

    /// Number of blocks at each mastery level.
    pub fn mastery_distribution(&self) -> BTreeMap<MasteryLevel, usize> {
        let mut distribution: BTreeMap<MasteryLevel, usize> =
            MasteryLevel::ALL.iter().map(|l| (*l, 0)).collect();
        for block in self.blocks.values() {
            *distribution.entry(block.mastery).or_default() += 1;
        }
        distribution
    }

    /// Every adaptation made so far, oldest first.
    pub fn adaptation_history(&self) -> Vec<&AdaptationRecord> {
        let mut all: Vec<&AdaptationRecord> = self.adaptive.iter().flat_map(|e| e.history.iter()).collect();
        all.sort_by_key(|r| r.turn);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn concept(name: &str) -> ConceptId {
        ConceptId::parse(name).unwrap()
    }

    fn beginner() -> LearningExperience {
        LearningExperience::bootstrap("u-1", LearnerProfile::default(), &LearningConfig::default())
    }

    fn practice(exp: &mut LearningExperience, name: &str, performance: f64, times: usize) {
        let config = LearningConfig::default();
        for _ in 0..times {
            exp.build_incremental_context(
                &LearningDatum::new(concept(name)).with_performance(performance),
                None,
                &config,
            )
            .unwrap();
        }
    }

    #[test]
    fn test_beginner_bootstrap() {
        let exp = beginner();
        assert_eq!(exp.phase, LearningPhase::Foundation);
        assert_eq!(exp.blocks.len(), 3);
        assert!(exp.blocks.values().all(|b| b.mastery == MasteryLevel::Introduced));
    }

    #[test]
    fn test_intermediate_starts_in_building() {
        let exp = LearningExperience::bootstrap(
            "u-2",
            LearnerProfile::new(ExperienceLevel::Intermediate),
            &LearningConfig::default(),
        );
        assert_eq!(exp.phase, LearningPhase::Building);
        assert_eq!(exp.block(&concept("variables")).unwrap().mastery, MasteryLevel::Practiced);
        assert_eq!(exp.block(&concept("modules")).unwrap().mastery, MasteryLevel::Introduced);
        assert!(exp
            .block(&concept("functions"))
            .unwrap()
            .dependents
            .contains(&concept("modules")));
    }

    #[test]
    fn test_advance_after_three_successes() {
        let mut exp = beginner();
        practice(&mut exp, "variables", 0.8, 2);
        assert_eq!(exp.block(&concept("variables")).unwrap().mastery, MasteryLevel::Introduced);
        practice(&mut exp, "variables", 0.8, 1);
        assert_eq!(exp.block(&concept("variables")).unwrap().mastery, MasteryLevel::Developing);
    }

    #[test]
    fn test_failure_resets_streak() {
        let mut exp = beginner();
        practice(&mut exp, "variables", 0.8, 2);
        practice(&mut exp, "variables", 0.6, 1);
        practice(&mut exp, "variables", 0.8, 2);
        assert_eq!(exp.block(&concept("variables")).unwrap().mastery, MasteryLevel::Introduced);
    }

    #[test]
    fn test_dependent_gated_on_prerequisites() {
        let config = LearningConfig::default();
        let mut exp = beginner();
        exp.enter_phase(LearningPhase::Building, &config).unwrap();

        let update = exp
            .build_incremental_context(
                &LearningDatum::new(concept("data_structures")).with_performance(0.9),
                None,
                &config,
            )
            .unwrap();
        assert!(!update.gated);
        practice(&mut exp, "data_structures", 0.9, 2);
        let block = exp.block(&concept("data_structures")).unwrap();
        assert_eq!(block.mastery, MasteryLevel::Introduced);

        // variables -> practiced takes two levels of three successes each
        practice(&mut exp, "variables", 0.9, 6);
        assert_eq!(exp.block(&concept("variables")).unwrap().mastery, MasteryLevel::Practiced);

        practice(&mut exp, "data_structures", 0.9, 1);
        assert_eq!(exp.block(&concept("data_structures")).unwrap().mastery, MasteryLevel::Developing);
    }

    #[test]
    fn test_transition_rejects_regression_and_skip() {
        let mut exp = beginner();
        let err = exp
            .transition_block(&concept("variables"), MasteryLevel::Practiced, MasteryChangeReason::Advanced, 1)
            .unwrap_err();
        assert!(matches!(err, Error::StateConflict(_)));

        practice(&mut exp, "variables", 0.9, 3);
        let err = exp
            .transition_block(&concept("variables"), MasteryLevel::Introduced, MasteryChangeReason::Advanced, 2)
            .unwrap_err();
        assert!(matches!(err, Error::StateConflict(_)));
    }

    #[test]
    fn test_review_resets_to_developing() {
        let mut exp = beginner();
        practice(&mut exp, "variables", 0.9, 6);
        assert_eq!(exp.block(&concept("variables")).unwrap().mastery, MasteryLevel::Practiced);

        let change = exp.review_block(&concept("variables"), 7).unwrap().unwrap();
        assert_eq!(change.to, MasteryLevel::Developing);
        assert_eq!(change.reason, MasteryChangeReason::Review);
        assert!(exp.review_block(&concept("variables"), 8).unwrap().is_none());
    }

    #[test]
    fn test_difficulty_eases_after_two_lows() {
        let mut exp = beginner();
        let before = exp.adaptive_element(AdaptationDimension::Difficulty).unwrap().setting;
        practice(&mut exp, "functions", 0.3, 1);
        assert_eq!(exp.adaptive_element(AdaptationDimension::Difficulty).unwrap().setting, before);
        practice(&mut exp, "functions", 0.3, 1);
        assert_eq!(
            exp.adaptive_element(AdaptationDimension::Difficulty).unwrap().setting,
            before - 1
        );
        assert_eq!(
            exp.adaptive_element(AdaptationDimension::Scaffolding).unwrap().setting,
            4
        );
    }

    #[test]
    fn test_difficulty_rises_after_three_highs() {
        let mut exp = beginner();
        let before = exp.adaptive_element(AdaptationDimension::Difficulty).unwrap().setting;
        practice(&mut exp, "functions", 0.95, 3);
        assert_eq!(
            exp.adaptive_element(AdaptationDimension::Difficulty).unwrap().setting,
            before + 1
        );
        assert_eq!(exp.adaptation_history().len(), 3);
    }

    #[test]
    fn test_co_mentions_create_then_strengthen() {
        let config = LearningConfig::default();
        let mut exp = beginner();
        let datum = LearningDatum::new(concept("functions"))
            .with_related(vec![concept("variables"), concept("closures")])
            .with_layer(LayerType::Procedural);

        let first = exp.build_incremental_context(&datum, None, &config).unwrap();
        assert_eq!(first.connections_created, 3);
        assert!(exp.block(&concept("closures")).is_some());

        let second = exp.build_incremental_context(&datum, None, &config).unwrap();
        assert_eq!(second.connections_strengthened, 3);
        let layer = exp.layers.iter().find(|l| l.layer_type == LayerType::Procedural).unwrap();
        assert!((layer.connections[0].weight - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_phase_advance_requires_all_criteria() {
        let config = LearningConfig::default();
        let mut exp = beginner();
        let partial = CompletionEvidence::new()
            .with(CompletionMetric::ConceptCoverage, 1.0)
            .with(CompletionMetric::AveragePerformance, 0.9);

        let result = exp.advance_phase(&partial, &config).unwrap();
        assert!(!result.advanced);
        assert_eq!(result.completion_status.unmet().count(), 1);

        let full = partial.with(CompletionMetric::Interactions, 5.0);
        let result = exp.advance_phase(&full, &config).unwrap();
        assert!(result.advanced);
        assert_eq!(result.current_phase, LearningPhase::Building);
        assert_eq!(result.new_concepts.len(), 3);
    }

    #[test]
    fn test_enter_phase_rejects_skip() {
        let mut exp = beginner();
        let err = exp
            .enter_phase(LearningPhase::Connecting, &LearningConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::StateConflict(_)));
    }
}
