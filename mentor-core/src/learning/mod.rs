//! Learning experience engine.
//!
//! Tracks how a learner's understanding grows:
//!
//! - **Building blocks**: one per concept, with a mastery state machine
//!   (introduced, developing, practiced, mastered) gated on prerequisites
//! - **Context layers**: co-mentioned concepts linked by weighted connections
//! - **Adaptive elements**: difficulty, pace and scaffolding tuned from
//!   performance streaks
//! - **Phases**: foundation to mastering, advanced only when every exit
//!   criterion of the current phase is met
//!
//! ## Example
//!
//! ```rust,ignore
//! use mentor_core::learning::{CompletionEvidence, LearnerProfile, LearningDatum, LearningExperienceEngine};
//! use mentor_core::ConceptId;
//!
//! let mut engine = LearningExperienceEngine::default();
//! let id = engine.initialize("ada", LearnerProfile::default(), None)?.id;
//!
//! let datum = LearningDatum::new(ConceptId::parse("variables")?).with_performance(0.8);
//! let update = engine.build_incremental_context(&id, &datum, None)?;
//!
//! let advance = engine.advance_learning_phase(&id, &CompletionEvidence::new())?;
//! if !advance.advanced {
//!     for unmet in advance.completion_status.unmet() {
//!         println!("{} at {:.2}/{:.2}", unmet.metric, unmet.value, unmet.threshold);
//!     }
//! }
//! ```

mod config;
mod engine;
mod experience;
mod phase;
mod types;

#[cfg(test)]
mod proptest;

pub use config::{BlockTemplate, LearningConfig, PhaseTemplate};
pub use engine::LearningExperienceEngine;
pub use experience::LearningExperience;
pub use phase::{
    CompletionCriterion, CompletionEvidence, CompletionMetric, CompletionStatus, CriterionStatus,
    PhaseAdvance,
};
pub use types::{
    AdaptationDimension, AdaptationRecord, AdaptiveElement, BuildingBlock, ContextLayer,
    ElementConnection, ExperienceLevel, IncrementalUpdate, LayerType, LearnerProfile,
    LearningDatum, LearningPhase, MasteryChange, MasteryChangeReason, MasteryLevel,
    PhaseTransition, MAX_SETTING,
};
