//! Session message, turn and continuation types.

use crate::concept::{ConceptId, ConceptTag};
use crate::learning::ExperienceLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form context supplied by the upstream layer.
pub type ContextMap = serde_json::Map<String, Value>;

/// Intent label of a context, if present.
pub fn context_intent(context: &ContextMap) -> Option<String> {
    context
        .get("intent")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Experience level of a context, read from `experience_level` or `expertise`.
pub fn context_experience_level(context: &ContextMap) -> Option<ExperienceLevel> {
    ["experience_level", "expertise", "user_level"]
        .iter()
        .filter_map(|key| context.get(*key).and_then(Value::as_str))
        .find_map(ExperienceLevel::from_label)
}

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Learner input
    User,
    /// Assistant response
    Assistant,
    /// Upstream system notes
    System,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::User => write!(f, "user"),
            MessageType::Assistant => write!(f, "assistant"),
            MessageType::System => write!(f, "system"),
        }
    }
}

/// Structured message metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Commands used and patterns detected in the message
    #[serde(default)]
    pub tags: Vec<ConceptTag>,
    /// Anything else the caller attached
    #[serde(default, flatten)]
    pub extra: ContextMap,
}

impl MessageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, concept: ConceptId) -> Self {
        self.push_tag(ConceptTag::Command(concept));
        self
    }

    pub fn with_pattern(mut self, concept: ConceptId) -> Self {
        self.push_tag(ConceptTag::Pattern(concept));
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn push_tag(&mut self, tag: ConceptTag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Concepts of every tag.
    pub fn concepts(&self) -> impl Iterator<Item = &ConceptId> {
        self.tags.iter().map(ConceptTag::concept)
    }
}

/// A message in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Position in the session log
    pub index: usize,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextMap>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl SessionMessage {
    pub fn is_question(&self) -> bool {
        self.message_type == MessageType::User && self.content.trim_end().ends_with('?')
    }
}

/// How the context moved across one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextEvolution {
    pub intent_before: Option<String>,
    pub intent_after: Option<String>,
    pub expertise_before: Option<ExperienceLevel>,
    pub expertise_after: Option<ExperienceLevel>,
    /// Context keys added or changed by the turn
    pub changed_keys: Vec<String>,
}

impl ContextEvolution {
    pub fn intent_changed(&self) -> bool {
        self.intent_before != self.intent_after
    }

    pub fn expertise_changed(&self) -> bool {
        self.expertise_before != self.expertise_after
    }
}

/// Familiarity with a tag judged from how often it appeared before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMastery {
    Unknown,
    Learning,
    Familiar,
    Expert,
}

impl TurnMastery {
    /// 0 unknown, 1-2 learning, 3-5 familiar, more expert.
    pub fn from_prior_occurrences(count: usize) -> Self {
        match count {
            0 => Self::Unknown,
            1..=2 => Self::Learning,
            3..=5 => Self::Familiar,
            _ => Self::Expert,
        }
    }
}

/// One command or pattern the assistant used in a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPoint {
    pub tag: ConceptTag,
    pub mastery: TurnMastery,
    pub prior_occurrences: usize,
}

/// Suggested follow-up after a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum NextStep {
    /// Try a command that is still new to the learner
    PracticeCommand(ConceptId),
    /// Study a pattern that is still new to the learner
    StudyPattern(ConceptId),
    /// Close out unanswered questions
    ResolveQuestions(usize),
    /// Continue toward an open goal
    PursueGoal(String),
}

/// A user message paired with the assistant's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub index: usize,
    pub user: SessionMessage,
    pub assistant: SessionMessage,
    pub context_evolution: ContextEvolution,
    pub learning_points: Vec<LearningPoint>,
    pub next_steps: Vec<NextStep>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Concepts touched by the turn, user tags first.
    pub fn concepts(&self) -> Vec<ConceptId> {
        let mut concepts: Vec<ConceptId> = Vec::new();
        for concept in self.user.metadata.concepts().chain(self.assistant.metadata.concepts()) {
            if !concepts.contains(concept) {
                concepts.push(concept.clone());
            }
        }
        concepts
    }
}

/// Whether the session should keep going.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationDecision {
    #[serde(rename = "continue")]
    pub should_continue: bool,
    pub reason: String,
    pub idle_minutes: i64,
}
