//! Personalized learning paths.

use crate::concept::{extract_candidates, ConceptId};
use crate::error::{Error, Result};
use crate::ids::PathId;
use crate::learning::LearnerProfile;
use crate::progression::config::{MilestoneTemplate, ProgressionConfig};
use crate::progression::types::*;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Build a path from the template for the learner's level.
///
/// Milestones matching more goal keywords move to the front; ties keep
/// template order. Progress starts at zero.
pub fn create_personalized_path(
    profile: &LearnerProfile,
    goals: &[String],
    pace: PaceHint,
    config: &ProgressionConfig,
) -> Result<LearningPath> {
    let template = config
        .path_template(profile.experience_level)
        .ok_or_else(|| Error::not_found("path template", profile.experience_level))?;

    let keywords: BTreeSet<ConceptId> = goals.iter().flat_map(|g| extract_candidates(g)).collect();

    let mut milestones: Vec<Milestone> = template
        .milestones
        .iter()
        .map(|t| Milestone {
            title: t.title.clone(),
            concepts: t.concepts.clone(),
            estimated_turns: pace.turns_per_concept() * t.concepts.len().max(1) as u32,
            goal_matches: goal_matches(t, &keywords),
            completed: false,
        })
        .collect();
    milestones.sort_by(|a, b| b.goal_matches.cmp(&a.goal_matches));

    Ok(LearningPath {
        id: PathId::new(),
        experience_level: profile.experience_level,
        goals: goals.to_vec(),
        pace,
        progress: ProgressTracker::new(milestones.len()),
        milestones,
    })
}

/// Keywords found in the milestone's title or concept names.
fn goal_matches(template: &MilestoneTemplate, keywords: &BTreeSet<ConceptId>) -> usize {
    let title_words = extract_candidates(&template.title);
    keywords
        .iter()
        .filter(|k| {
            title_words.contains(*k)
                || template
                    .concepts
                    .iter()
                    .any(|c| c == *k || c.as_str().split('_').any(|part| part == k.as_str()))
        })
        .count()
}

/// Paths created for learners, addressed by id.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    paths: BTreeMap<PathId, LearningPath>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a path and keep it.
    pub fn create(
        &mut self,
        profile: &LearnerProfile,
        goals: &[String],
        pace: PaceHint,
        config: &ProgressionConfig,
    ) -> Result<&LearningPath> {
        let path = create_personalized_path(profile, goals, pace, config)?;
        let id = path.id;
        info!(path_id = %id, milestones = path.milestones.len(), "Created learning path");
        self.paths.insert(id, path);
        self.get(&id)
    }

    pub fn get(&self, id: &PathId) -> Result<&LearningPath> {
        self.paths.get(id).ok_or_else(|| Error::not_found("learning path", id))
    }

    /// Mark the milestone at `index` complete. Completing one twice is a no-op.
    pub fn complete_milestone(&mut self, id: &PathId, index: usize) -> Result<&ProgressTracker> {
        let path = self
            .paths
            .get_mut(id)
            .ok_or_else(|| Error::not_found("learning path", id))?;
        let total = path.milestones.len();
        let milestone = path.milestones.get_mut(index).ok_or_else(|| {
            Error::validation("milestone", format!("index {} out of range for {} milestones", index, total))
        })?;

        if !milestone.completed {
            milestone.completed = true;
            let done = path.milestones.iter().filter(|m| m.completed).count();
            path.progress.completed_milestones = done;
            path.progress.completion = done as f64 / total as f64;
            path.progress.last_updated = Utc::now();
        }
        Ok(&path.progress)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::ExperienceLevel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_starts_at_zero() {
        let config = ProgressionConfig::default();
        let path = create_personalized_path(&LearnerProfile::default(), &[], PaceHint::Steady, &config).unwrap();
        assert_eq!(path.progress.completion, 0.0);
        assert_eq!(path.progress.total_milestones, path.milestones.len());
        assert_eq!(path.milestones[0].title, "Core syntax");
    }

    #[test]
    fn test_goals_reorder_milestones() {
        let config = ProgressionConfig::default();
        let goals = vec!["get better at error handling".to_string()];
        let path = create_personalized_path(&LearnerProfile::default(), &goals, PaceHint::Steady, &config).unwrap();
        assert_eq!(path.milestones[0].title, "Handling errors");
        assert!(path.milestones[0].goal_matches >= 1);
        // unmatched milestones keep template order
        assert_eq!(path.milestones[1].title, "Core syntax");
    }

    #[test]
    fn test_pace_scales_estimate() {
        let config = ProgressionConfig::default();
        let profile = LearnerProfile::new(ExperienceLevel::Expert);
        let relaxed = create_personalized_path(&profile, &[], PaceHint::Relaxed, &config).unwrap();
        let intensive = create_personalized_path(&profile, &[], PaceHint::Intensive, &config).unwrap();
        assert_eq!(relaxed.estimated_turns(), 3 * intensive.estimated_turns());
    }

    #[test]
    fn test_registry_completes_milestones() {
        let config = ProgressionConfig::default();
        let mut registry = PathRegistry::new();
        let id = registry
            .create(&LearnerProfile::new(ExperienceLevel::Expert), &[], PaceHint::Steady, &config)
            .unwrap()
            .id;

        let progress = registry.complete_milestone(&id, 0).unwrap();
        assert_eq!(progress.completed_milestones, 1);
        let progress = registry.complete_milestone(&id, 0).unwrap();
        assert_eq!(progress.completed_milestones, 1);

        assert!(matches!(registry.complete_milestone(&id, 9), Err(Error::Validation { .. })));
        assert!(matches!(
            registry.complete_milestone(&PathId::new(), 0),
            Err(Error::NotFound { .. })
        ));
    }
}
