//! Ranked next-step suggestions.

use crate::learning::{BuildingBlock, LearningExperience, MasteryLevel};
use crate::progression::config::ProgressionConfig;
use crate::progression::types::*;

/// Suggest what to study or practice next.
///
/// Candidates are generated per block in concept order: next concepts
/// first, then reinforcement, then application. A block yields at most
/// one suggestion. The list is stably sorted by priority and capped at
/// `config.max_suggestions`.
///
/// Priorities:
/// - next concept: critical when the block is in the current phase and
///   unlocks two or more dependents, high when in the current phase,
///   medium otherwise
/// - reinforcement: high once unreinforced for twice the threshold,
///   medium otherwise
/// - application: medium when the concept's category is assessed at
///   intermediate or above, low otherwise
pub fn generate_progression_suggestions(
    experience: &LearningExperience,
    assessment: &SkillAssessment,
    current_turn: u64,
    config: &ProgressionConfig,
) -> Vec<ProgressionSuggestion> {
    let threshold = config.reinforcement_after_turns;
    let mut next_concepts = Vec::new();
    let mut reinforcement = Vec::new();
    let mut application = Vec::new();

    for block in experience.blocks.values() {
        let idle = current_turn.saturating_sub(block.last_reinforced_turn);

        if block.mastery == MasteryLevel::Developing && idle >= threshold {
            let priority = if idle >= threshold.saturating_mul(2) {
                SuggestionPriority::High
            } else {
                SuggestionPriority::Medium
            };
            reinforcement.push(suggestion(block, SuggestionKind::Reinforcement, priority, "stale_developing"));
        } else if block.mastery < MasteryLevel::Practiced && experience.prerequisites_met(&block.concept) {
            let in_phase = block.phase == experience.phase;
            let (priority, reason) = if in_phase && block.dependents.len() >= 2 {
                (SuggestionPriority::Critical, "unlocks_dependents")
            } else if in_phase {
                (SuggestionPriority::High, "prerequisites_met")
            } else {
                (SuggestionPriority::Medium, "prerequisites_met")
            };
            next_concepts.push(suggestion(block, SuggestionKind::NextConcept, priority, reason));
        } else if block.mastery == MasteryLevel::Practiced && !block.exercise_completed {
            let confident = assessment
                .level_of(&block.concept, &config.categories)
                .map(|level| level >= SkillLevel::Intermediate)
                .unwrap_or(false);
            let priority = if confident {
                SuggestionPriority::Medium
            } else {
                SuggestionPriority::Low
            };
            application.push(suggestion(block, SuggestionKind::Application, priority, "needs_exercise"));
        }
    }

    let mut all: Vec<ProgressionSuggestion> = next_concepts
        .into_iter()
        .chain(reinforcement)
        .chain(application)
        .collect();
    // sort_by_key is stable, so equal priorities keep generation order
    all.sort_by_key(|s| s.priority);
    all.truncate(config.max_suggestions);
    all
}

fn suggestion(
    block: &BuildingBlock,
    kind: SuggestionKind,
    priority: SuggestionPriority,
    reason: &str,
) -> ProgressionSuggestion {
    ProgressionSuggestion {
        kind,
        concept: block.concept.clone(),
        priority,
        reason: reason.to_string(),
    }
}
