//! Progression suggestion engine.
//!
//! Reads the combined learner state and answers "what next?":
//!
//! - [`assess_current_skills`] scores a fixed skill catalogue
//! - [`generate_progression_suggestions`] ranks next concepts,
//!   reinforcement and application work
//! - [`create_personalized_path`] and [`PathRegistry`] lay out and track
//!   milestone paths

mod assess;
mod config;
mod path;
mod suggest;
mod types;

pub use assess::assess_current_skills;
pub use config::{MilestoneTemplate, PathTemplate, ProgressionConfig};
pub use path::{create_personalized_path, PathRegistry};
pub use suggest::generate_progression_suggestions;
pub use types::{
    CategoryAssessment, LearningPath, Milestone, PaceHint, ProgressTracker, ProgressionSuggestion,
    SkillAssessment, SkillCategory, SkillLevel, SuggestionKind, SuggestionPriority,
};
