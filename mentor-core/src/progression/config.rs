//! Progression engine configuration: skill catalogue and path templates.

use crate::concept::ConceptId;
use crate::error::{Error, Result};
use crate::learning::ExperienceLevel;
use crate::progression::types::SkillCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Milestone of a path template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneTemplate {
    pub title: String,
    pub concepts: Vec<ConceptId>,
}

/// Base path for one experience level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTemplate {
    pub experience_level: ExperienceLevel,
    pub milestones: Vec<MilestoneTemplate>,
}

/// Configuration for the progression suggestion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub categories: Vec<SkillCategory>,
    /// Turns without reinforcement before a developing block needs review
    pub reinforcement_after_turns: u64,
    pub max_suggestions: usize,
    pub path_templates: Vec<PathTemplate>,
}

fn ids(names: &[&str]) -> Vec<ConceptId> {
    names
        .iter()
        .map(|n| ConceptId::parse(n).expect("built-in catalogue concept ids are valid"))
        .collect()
}

fn category(name: &str, concepts: &[&str]) -> SkillCategory {
    SkillCategory::new(name, ids(concepts).into_iter().collect())
}

fn milestone(title: &str, concepts: &[&str]) -> MilestoneTemplate {
    MilestoneTemplate {
        title: title.to_string(),
        concepts: ids(concepts),
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        let categories = vec![
            category("fundamentals", &["variables", "functions", "control_flow"]),
            category("data", &["data_structures", "iterators"]),
            category("organization", &["modules", "abstraction", "project_structure"]),
            category("reliability", &["error_handling", "testing"]),
            category("advanced", &["concurrency", "performance_tuning", "design_patterns"]),
        ];

        let beginner = vec![
            milestone("Core syntax", &["variables", "control_flow"]),
            milestone("Functions", &["functions"]),
            milestone("Working with data", &["data_structures", "iterators"]),
            milestone("Handling errors", &["error_handling"]),
            milestone("Organizing code", &["modules"]),
        ];
        let intermediate = vec![
            milestone("Organizing code", &["modules", "abstraction"]),
            milestone("Handling errors", &["error_handling", "testing"]),
            milestone("Iterating over data", &["iterators", "data_structures"]),
            milestone("Project layout", &["project_structure"]),
            milestone("Concurrency basics", &["concurrency"]),
        ];
        let advanced = vec![
            milestone("Testing strategy", &["testing", "project_structure"]),
            milestone("Concurrency", &["concurrency"]),
            milestone("Design patterns", &["design_patterns", "abstraction"]),
            milestone("Performance", &["performance_tuning"]),
        ];
        let expert = vec![
            milestone("Concurrency", &["concurrency"]),
            milestone("Performance", &["performance_tuning"]),
            milestone("Design patterns", &["design_patterns"]),
        ];

        Self {
            categories,
            reinforcement_after_turns: 5,
            max_suggestions: 10,
            path_templates: vec![
                PathTemplate {
                    experience_level: ExperienceLevel::Beginner,
                    milestones: beginner,
                },
                PathTemplate {
                    experience_level: ExperienceLevel::Intermediate,
                    milestones: intermediate,
                },
                PathTemplate {
                    experience_level: ExperienceLevel::Advanced,
                    milestones: advanced,
                },
                PathTemplate {
                    experience_level: ExperienceLevel::Expert,
                    milestones: expert,
                },
            ],
        }
    }
}

impl ProgressionConfig {
    /// Template for a level, falling back to the closest lower level.
    pub fn path_template(&self, level: ExperienceLevel) -> Option<&PathTemplate> {
        self.path_templates
            .iter()
            .filter(|t| t.experience_level <= level)
            .max_by_key(|t| t.experience_level)
            .or_else(|| self.path_templates.first())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_suggestions == 0 {
            return Err(Error::Config("max_suggestions must be positive".into()));
        }
        let mut names = BTreeSet::new();
        for category in &self.categories {
            if category.concepts.is_empty() {
                return Err(Error::Config(format!("skill category `{}` has no concepts", category.name)));
            }
            if !names.insert(category.name.as_str()) {
                return Err(Error::Config(format!("duplicate skill category `{}`", category.name)));
            }
        }
        if self.path_templates.is_empty() {
            return Err(Error::Config("at least one path template is required".into()));
        }
        Ok(())
    }
}
