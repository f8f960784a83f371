//! Registry of learning experiences, addressed by experience id.

use crate::concept::ConceptId;
use crate::error::{Error, Result};
use crate::ids::ExperienceId;
use crate::learning::config::LearningConfig;
use crate::learning::experience::LearningExperience;
use crate::learning::phase::{CompletionEvidence, PhaseAdvance};
use crate::learning::types::{IncrementalUpdate, LearnerProfile, LearningDatum, MasteryChange};
use crate::session::{context_intent, context_experience_level, ContextMap};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Owns every learner's experience.
#[derive(Debug, Clone, Default)]
pub struct LearningExperienceEngine {
    config: LearningConfig,
    experiences: BTreeMap<ExperienceId, LearningExperience>,
    by_user: HashMap<String, ExperienceId>,
}

impl LearningExperienceEngine {
    pub fn new(config: LearningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            experiences: BTreeMap::new(),
            by_user: HashMap::new(),
        })
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Create the learner's experience, or return the existing one.
    ///
    /// An `experience_level` in `context` overrides the profile's level.
    pub fn initialize(
        &mut self,
        user_id: &str,
        profile: LearnerProfile,
        context: Option<&ContextMap>,
    ) -> Result<&LearningExperience> {
        if user_id.trim().is_empty() {
            return Err(Error::validation("user_id", "must not be empty"));
        }
        if let Some(id) = self.by_user.get(user_id).copied() {
            debug!(user_id, experience_id = %id, "Experience already initialized");
            return self.get(&id);
        }

        let mut profile = profile;
        if let Some(level) = context.and_then(context_experience_level) {
            profile.experience_level = level;
        }
        let experience = LearningExperience::bootstrap(user_id, profile, &self.config);
        let id = experience.id;
        info!(
            user_id,
            experience_id = %id,
            phase = %experience.phase,
            blocks = experience.blocks.len(),
            "Initialized learning experience"
        );
        self.by_user.insert(user_id.to_string(), id);
        self.experiences.insert(id, experience);
        self.get(&id)
    }

    pub fn get(&self, id: &ExperienceId) -> Result<&LearningExperience> {
        self.experiences
            .get(id)
            .ok_or_else(|| Error::not_found("learning experience", id))
    }

    fn get_mut(&mut self, id: &ExperienceId) -> Result<&mut LearningExperience> {
        self.experiences
            .get_mut(id)
            .ok_or_else(|| Error::not_found("learning experience", id))
    }

    pub fn build_incremental_context(
        &mut self,
        id: &ExperienceId,
        datum: &LearningDatum,
        context: Option<&ContextMap>,
    ) -> Result<IncrementalUpdate> {
        let intent = context.and_then(context_intent);
        let config = self.config.clone();
        let experience = self.get_mut(id)?;
        // Work on a copy so a rejected interaction leaves nothing behind.
        let mut draft = experience.clone();
        let update = draft.build_incremental_context(datum, intent.as_deref(), &config)?;
        *experience = draft;
        Ok(update)
    }

    pub fn advance_learning_phase(&mut self, id: &ExperienceId, evidence: &CompletionEvidence) -> Result<PhaseAdvance> {
        let config = self.config.clone();
        let experience = self.get_mut(id)?;
        let mut draft = experience.clone();
        let result = draft.advance_phase(evidence, &config)?;
        *experience = draft;
        Ok(result)
    }

    pub fn review_block(&mut self, id: &ExperienceId, concept: &ConceptId, turn: u64) -> Result<Option<MasteryChange>> {
        self.get_mut(id)?.review_block(concept, turn)
    }

    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::phase::CompletionMetric;
    use crate::learning::types::{ExperienceLevel, LayerType, LearningPhase, MasteryLevel};
    use serde_json::json;

    #[test]
    fn test_initialize_is_idempotent_per_user() {
        let mut engine = LearningExperienceEngine::default();
        let first = engine.initialize("ada", LearnerProfile::default(), None).unwrap().id;
        let second = engine
            .initialize("ada", LearnerProfile::new(ExperienceLevel::Expert), None)
            .unwrap()
            .id;
        assert_eq!(first, second);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_context_level_overrides_profile() {
        let mut engine = LearningExperienceEngine::default();
        let context: ContextMap = json!({"experience_level": "advanced"})
            .as_object()
            .cloned()
            .unwrap();
        let experience = engine
            .initialize("grace", LearnerProfile::default(), Some(&context))
            .unwrap();
        assert_eq!(experience.phase, LearningPhase::Building);
    }

    #[test]
    fn test_unknown_experience_is_not_found() {
        let mut engine = LearningExperienceEngine::default();
        let err = engine
            .advance_learning_phase(&ExperienceId::new(), &CompletionEvidence::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_beginner_advances_to_building_with_evidence() {
        let mut engine = LearningExperienceEngine::default();
        let id = engine.initialize("lin", LearnerProfile::default(), None).unwrap().id;
        assert_eq!(engine.get(&id).unwrap().phase, LearningPhase::Foundation);

        let evidence = CompletionEvidence::new()
            .with(CompletionMetric::ConceptCoverage, 0.8)
            .with(CompletionMetric::AveragePerformance, 0.75)
            .with(CompletionMetric::Interactions, 6.0);
        let result = engine.advance_learning_phase(&id, &evidence).unwrap();
        assert!(result.advanced);
        assert_eq!(result.current_phase, LearningPhase::Building);
    }

    #[test]
    fn test_invalid_performance_leaves_state_untouched() {
        let mut engine = LearningExperienceEngine::default();
        let id = engine.initialize("kim", LearnerProfile::default(), None).unwrap().id;
        let before = engine.get(&id).unwrap().clone();

        let datum = LearningDatum::new(ConceptId::parse("closures").unwrap()).with_performance(1.5);
        assert!(engine.build_incremental_context(&id, &datum, None).is_err());
        assert_eq!(engine.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_intent_routes_connections_to_layer() {
        let mut engine = LearningExperienceEngine::default();
        let id = engine.initialize("sam", LearnerProfile::default(), None).unwrap().id;
        let context: ContextMap = json!({"intent": "debug_error"}).as_object().cloned().unwrap();
        let datum = LearningDatum::new(ConceptId::parse("functions").unwrap())
            .with_related(vec![ConceptId::parse("variables").unwrap()]);
        engine.build_incremental_context(&id, &datum, Some(&context)).unwrap();

        let experience = engine.get(&id).unwrap();
        let layer = experience
            .layers
            .iter()
            .find(|l| l.layer_type == LayerType::Conditional)
            .unwrap();
        assert_eq!(layer.connections.len(), 1);
        assert_eq!(
            experience.block(&ConceptId::parse("functions").unwrap()).unwrap().mastery,
            MasteryLevel::Introduced
        );
    }
}
