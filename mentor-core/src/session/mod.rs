//! Conversational session log.
//!
//! A [`ConversationalSession`] is the event source for the rest of the
//! crate: every message and turn it records carries typed concept tags that
//! feed memory, learning and progression.

mod conversation;
mod types;

pub use conversation::{ConversationalSession, SessionConfig};
pub use types::{
    context_experience_level, context_intent, ContextEvolution, ContextMap, ContinuationDecision,
    ConversationTurn, LearningPoint, MessageMetadata, MessageType, NextStep, SessionMessage,
    TurnMastery,
};
