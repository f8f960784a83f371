//! Skill assessment from session history.

use crate::concept::ConceptId;
use crate::learning::LearnerProfile;
use crate::progression::types::{CategoryAssessment, SkillAssessment, SkillCategory, SkillLevel};
use crate::session::SessionMessage;
use std::collections::BTreeSet;

/// Assess the learner against each skill category.
///
/// Demonstrated concepts are every tag in message metadata plus the
/// profile's known concepts. A category's confidence is the fraction of
/// its concepts demonstrated.
pub fn assess_current_skills(
    profile: &LearnerProfile,
    history: &[SessionMessage],
    categories: &[SkillCategory],
) -> SkillAssessment {
    let mut demonstrated: BTreeSet<ConceptId> = history
        .iter()
        .flat_map(|m| m.metadata.concepts().cloned())
        .collect();
    demonstrated.extend(profile.known_concepts.iter().cloned());

    let assessed: Vec<CategoryAssessment> = categories
        .iter()
        .map(|category| {
            let (shown, missing): (Vec<ConceptId>, Vec<ConceptId>) = category
                .concepts
                .iter()
                .cloned()
                .partition(|c| demonstrated.contains(c));
            let confidence = if category.concepts.is_empty() {
                0.0
            } else {
                (shown.len() as f64 / category.concepts.len() as f64).clamp(0.0, 1.0)
            };
            CategoryAssessment {
                category: category.name.clone(),
                confidence,
                level: SkillLevel::from_confidence(confidence),
                demonstrated: shown,
                missing,
            }
        })
        .collect();

    let overall_confidence = if assessed.is_empty() {
        0.0
    } else {
        assessed.iter().map(|c| c.confidence).sum::<f64>() / assessed.len() as f64
    };

    SkillAssessment {
        demonstrated,
        categories: assessed,
        overall_confidence,
        overall_level: SkillLevel::from_confidence(overall_confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ProgressionConfig;
    use crate::session::{ConversationalSession, MessageMetadata, SessionConfig};

    fn id(name: &str) -> ConceptId {
        ConceptId::parse(name).unwrap()
    }

    #[test]
    fn test_empty_learner_is_novice() {
        let config = ProgressionConfig::default();
        let assessment = assess_current_skills(&LearnerProfile::default(), &[], &config.categories);
        assert!(assessment.demonstrated.is_empty());
        assert_eq!(assessment.overall_level, SkillLevel::Novice);
        assert_eq!(assessment.gaps().count(), config.categories.len());
    }

    #[test]
    fn test_history_and_profile_are_unioned() {
        let config = ProgressionConfig::default();
        let mut session = ConversationalSession::new("s", "u", SessionConfig::default());
        session
            .create_turn(
                "loop?",
                "use a for loop",
                None,
                Some(MessageMetadata::new().with_pattern(id("control_flow"))),
            )
            .unwrap();
        let profile = LearnerProfile::default().with_known_concepts(vec![id("variables"), id("functions")]);

        let assessment = assess_current_skills(&profile, &session.messages, &config.categories);
        let fundamentals = assessment.category("fundamentals").unwrap();
        assert_eq!(fundamentals.confidence, 1.0);
        assert_eq!(fundamentals.level, SkillLevel::Expert);
        assert!(fundamentals.missing.is_empty());
        assert_eq!(assessment.category("data").unwrap().level, SkillLevel::Novice);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(SkillLevel::from_confidence(0.9), SkillLevel::Expert);
        assert_eq!(SkillLevel::from_confidence(0.7), SkillLevel::Advanced);
        assert_eq!(SkillLevel::from_confidence(0.5), SkillLevel::Intermediate);
        assert_eq!(SkillLevel::from_confidence(0.3), SkillLevel::Beginner);
        assert_eq!(SkillLevel::from_confidence(0.29), SkillLevel::Novice);
    }
}
