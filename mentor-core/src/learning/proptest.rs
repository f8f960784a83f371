//! Property-based tests for mastery monotonicity and phase ordering.

use proptest::prelude::*;

use crate::concept::ConceptId;
use crate::learning::{
    CompletionEvidence, CompletionMetric, LearnerProfile, LearningConfig, LearningDatum,
    LearningExperience, LearningPhase, MasteryChangeReason,
};

const CONCEPTS: [&str; 5] = ["variables", "functions", "control_flow", "data_structures", "closures"];

#[derive(Debug, Clone)]
enum Step {
    Interact { concept: usize, performance: f64 },
    Review { concept: usize },
    Advance { coverage: f64, performance: f64, interactions: f64 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => (0..CONCEPTS.len(), 0.0f64..=1.0)
            .prop_map(|(concept, performance)| Step::Interact { concept, performance }),
        1 => (0..CONCEPTS.len()).prop_map(|concept| Step::Review { concept }),
        2 => (0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..20.0)
            .prop_map(|(coverage, performance, interactions)| Step::Advance { coverage, performance, interactions }),
    ]
}

proptest! {
    /// Mastery only drops through review events, and phases never skip.
    #[test]
    fn mastery_monotone_and_phases_ordered(steps in prop::collection::vec(step(), 1..60)) {
        let config = LearningConfig::default();
        let mut exp = LearningExperience::bootstrap("prop", LearnerProfile::default(), &config);
        let mut phases = vec![exp.phase];

        for (turn, step) in steps.into_iter().enumerate() {
            let before: Vec<_> = exp.blocks.iter().map(|(c, b)| (c.clone(), b.mastery)).collect();
            let mut reviewed: Option<ConceptId> = None;

            match step {
                Step::Interact { concept, performance } => {
                    let datum = LearningDatum::new(ConceptId::parse(CONCEPTS[concept]).unwrap())
                        .with_performance(performance)
                        .at_turn(turn as u64);
                    exp.build_incremental_context(&datum, None, &config).unwrap();
                }
                Step::Review { concept } => {
                    let concept = ConceptId::parse(CONCEPTS[concept]).unwrap();
                    if exp.block(&concept).is_some() {
                        exp.review_block(&concept, turn as u64).unwrap();
                        reviewed = Some(concept);
                    }
                }
                Step::Advance { coverage, performance, interactions } => {
                    let evidence = CompletionEvidence::new()
                        .with(CompletionMetric::ConceptCoverage, coverage)
                        .with(CompletionMetric::AveragePerformance, performance)
                        .with(CompletionMetric::Interactions, interactions);
                    let result = exp.advance_phase(&evidence, &config).unwrap();
                    if result.advanced {
                        phases.push(result.current_phase);
                    }
                }
            }

            for (concept, old) in before {
                let block = exp.block(&concept).unwrap();
                if reviewed.as_ref() != Some(&concept) {
                    prop_assert!(block.mastery >= old, "{} regressed", concept);
                }
            }
            for block in exp.blocks.values() {
                for change in &block.history {
                    if change.to < change.from {
                        prop_assert_eq!(change.reason, MasteryChangeReason::Review);
                    }
                }
            }
        }

        for pair in phases.windows(2) {
            prop_assert_eq!(pair[0].next(), Some(pair[1]));
        }
        prop_assert_eq!(phases[0], LearningPhase::Foundation);
    }
}
