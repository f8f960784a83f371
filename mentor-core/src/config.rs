//! Aggregate configuration for every component.

use crate::error::{Error, Result};
use crate::learning::LearningConfig;
use crate::memory::RetentionPolicy;
use crate::orchestrator::ConnectionPolicy;
use crate::progression::ProgressionConfig;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration of a [`ContextOrchestrator`](crate::ContextOrchestrator).
///
/// Every section has defaults, so a JSON document only needs the fields
/// it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentorConfig {
    pub memory: RetentionPolicy,
    pub learning: LearningConfig,
    pub progression: ProgressionConfig,
    pub session: SessionConfig,
    pub connections: ConnectionPolicy,
}

impl MentorConfig {
    /// Small capacities and short windows so tests hit every transition quickly.
    pub fn testing() -> Self {
        Self {
            memory: RetentionPolicy::aggressive(),
            connections: ConnectionPolicy {
                grace_ticks: 2,
                ..ConnectionPolicy::default()
            },
            ..Self::default()
        }
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.memory.validate()?;
        self.learning.validate()?;
        self.progression.validate()?;
        self.session.validate()?;
        self.connections.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
