//! # mentor-core
//!
//! A learner-context engine for conversational tutoring assistants. It keeps
//! what a learner has seen, how well they know it and what they should do
//! next, one session at a time.
//!
//! ## Core Components
//!
//! - **Memory**: Tiered memory store with consolidation and retention policy
//! - **Learning**: Building blocks, mastery levels, phases and adaptation
//! - **Progression**: Skill assessment, ranked suggestions and learning paths
//! - **Session**: Conversation log, turns, pending questions and goals
//! - **Orchestrator**: Per-session routing of typed requests over all of the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use mentor_core::{ConceptId, ContextOrchestrator, MentorConfig, NewMemory, PersistenceRequest};
//!
//! let orchestrator = ContextOrchestrator::new(MentorConfig::default())?;
//! orchestrator.handle("s-1", PersistenceRequest::initialize("ada")).await;
//!
//! let caching = ConceptId::parse("caching")?;
//! orchestrator
//!     .handle("s-1", PersistenceRequest::store(NewMemory::new("LRU evicts cold keys", vec![caching])))
//!     .await;
//!
//! let snapshot = orchestrator.handle("s-1", PersistenceRequest::Snapshot).await;
//! println!("{:?}", snapshot.data);
//! ```

pub mod concept;
pub mod config;
pub mod error;
pub mod ids;
pub mod learning;
pub mod memory;
pub mod orchestrator;
pub mod progression;
pub mod session;

// Re-exports for convenience
pub use concept::{ConceptId, ConceptTag};
pub use config::MentorConfig;
pub use error::{Error, Result};
pub use ids::{ConnectionId, ExperienceId, MemoryId, PathId};
pub use learning::{
    CompletionEvidence, CompletionMetric, ExperienceLevel, LearnerProfile, LearningConfig,
    LearningExperience, LearningExperienceEngine, LearningPhase, MasteryLevel,
};
pub use memory::{
    CancelFlag, MemoryQuery, MemoryStore, MemoryType, NewMemory, RetentionPolicy, RetrievalStrategy,
    Tier,
};
pub use orchestrator::{
    ContextOrchestrator, ContextSnapshot, InMemorySnapshotSink, PersistedSessionState,
    PersistenceRequest, PersistenceResponse, RequestType, ResponseScaffold, SnapshotSink,
};
pub use progression::{
    assess_current_skills, create_personalized_path, generate_progression_suggestions,
    ProgressionConfig, ProgressionSuggestion,
};
pub use session::{ContextMap, ConversationalSession, MessageMetadata, MessageType, SessionConfig};
