//! Append-only conversation log with a mutable context snapshot.

use crate::concept::ConceptTag;
use crate::error::{Error, Result};
use crate::session::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Configuration for conversational sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session with open work stops
    pub idle_timeout_minutes: i64,
    /// Upper bound on next steps suggested per turn
    pub max_next_steps: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
            max_next_steps: 3,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_minutes <= 0 {
            return Err(Error::Config("idle_timeout_minutes must be positive".into()));
        }
        if self.max_next_steps == 0 {
            return Err(Error::Config("max_next_steps must be positive".into()));
        }
        Ok(())
    }
}

/// One learner's conversation.
///
/// Messages and turns are only ever appended. A user message ending in a
/// question mark opens a pending question; the next assistant message
/// answers the oldest one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationalSession {
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<SessionMessage>,
    pub turns: Vec<ConversationTurn>,
    pub current_context: ContextMap,
    pub pending_questions: VecDeque<usize>,
    pub learning_goals: Vec<String>,
    pub config: SessionConfig,
}

impl ConversationalSession {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>, config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            started_at: now,
            last_activity: now,
            messages: Vec::new(),
            turns: Vec::new(),
            current_context: ContextMap::new(),
            pending_questions: VecDeque::new(),
            learning_goals: Vec::new(),
            config,
        }
    }

    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.learning_goals = goals;
        self
    }

    /// Append a message and shallow-merge `context` into the current
    /// context; keys from `context` win.
    pub fn add_message(
        &mut self,
        message_type: MessageType,
        content: impl Into<String>,
        context: Option<ContextMap>,
        metadata: Option<MessageMetadata>,
    ) -> Result<&SessionMessage> {
        self.add_message_at(message_type, content, context, metadata, Utc::now())
    }

    /// [`add_message`](Self::add_message) with an explicit timestamp.
    pub fn add_message_at(
        &mut self,
        message_type: MessageType,
        content: impl Into<String>,
        context: Option<ContextMap>,
        metadata: Option<MessageMetadata>,
        at: DateTime<Utc>,
    ) -> Result<&SessionMessage> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::validation("content", "message content must not be empty"));
        }

        if let Some(ctx) = &context {
            for (key, value) in ctx {
                self.current_context.insert(key.clone(), value.clone());
            }
        }

        let message = SessionMessage {
            index: self.messages.len(),
            message_type,
            content,
            timestamp: at,
            context,
            metadata: metadata.unwrap_or_default(),
        };

        if message.is_question() {
            self.pending_questions.push_back(message.index);
        } else if message_type == MessageType::Assistant {
            self.pending_questions.pop_front();
        }

        self.last_activity = self.last_activity.max(at);
        debug!(
            session_id = %self.session_id,
            index = message.index,
            message_type = %message_type,
            tags = message.metadata.tags.len(),
            "Appended message"
        );
        self.messages.push(message);
        let last = self.messages.len() - 1;
        Ok(&self.messages[last])
    }

    /// Record a user message and the assistant's reply as one turn.
    pub fn create_turn(
        &mut self,
        user_content: impl Into<String>,
        assistant_content: impl Into<String>,
        context: Option<ContextMap>,
        metadata: Option<MessageMetadata>,
    ) -> Result<&ConversationTurn> {
        let user_content = user_content.into();
        let assistant_content = assistant_content.into();
        if user_content.trim().is_empty() || assistant_content.trim().is_empty() {
            return Err(Error::validation("content", "both sides of a turn need content"));
        }

        let intent_before = context_intent(&self.current_context);
        let expertise_before = context_experience_level(&self.current_context);
        let changed_keys: Vec<String> = context
            .iter()
            .flat_map(|ctx| ctx.iter())
            .filter(|(k, v)| self.current_context.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        let history_len = self.messages.len();

        let user = self.add_message(MessageType::User, user_content, context, None)?.clone();
        let assistant = self
            .add_message(MessageType::Assistant, assistant_content, None, metadata)?
            .clone();

        let context_evolution = ContextEvolution {
            intent_before,
            intent_after: context_intent(&self.current_context),
            expertise_before,
            expertise_after: context_experience_level(&self.current_context),
            changed_keys,
        };

        let learning_points: Vec<LearningPoint> = assistant
            .metadata
            .tags
            .iter()
            .map(|tag| {
                let prior = self.prior_occurrences(tag, history_len);
                LearningPoint {
                    tag: tag.clone(),
                    mastery: TurnMastery::from_prior_occurrences(prior),
                    prior_occurrences: prior,
                }
            })
            .collect();

        let next_steps = self.next_steps(&learning_points);
        let turn = ConversationTurn {
            index: self.turns.len(),
            created_at: assistant.timestamp,
            user,
            assistant,
            context_evolution,
            learning_points,
            next_steps,
        };
        debug!(
            session_id = %self.session_id,
            turn = turn.index,
            learning_points = turn.learning_points.len(),
            "Created turn"
        );
        self.turns.push(turn);
        let last = self.turns.len() - 1;
        Ok(&self.turns[last])
    }

    /// Messages before `upto` whose metadata carry `tag`.
    fn prior_occurrences(&self, tag: &ConceptTag, upto: usize) -> usize {
        self.messages[..upto.min(self.messages.len())]
            .iter()
            .filter(|m| m.metadata.tags.contains(tag))
            .count()
    }

    /// New tags first, in tag order, then open questions, then the first
    /// open goal.
    fn next_steps(&self, points: &[LearningPoint]) -> Vec<NextStep> {
        let mut steps: Vec<NextStep> = points
            .iter()
            .filter(|p| p.mastery <= TurnMastery::Learning)
            .map(|p| match &p.tag {
                ConceptTag::Command(id) => NextStep::PracticeCommand(id.clone()),
                ConceptTag::Pattern(id) => NextStep::StudyPattern(id.clone()),
            })
            .collect();
        if !self.pending_questions.is_empty() {
            steps.push(NextStep::ResolveQuestions(self.pending_questions.len()));
        }
        if let Some(goal) = self.learning_goals.first() {
            steps.push(NextStep::PursueGoal(goal.clone()));
        }
        steps.truncate(self.config.max_next_steps);
        steps
    }

    /// Mark a goal as reached; returns whether it was open.
    pub fn complete_goal(&mut self, goal: &str) -> bool {
        let before = self.learning_goals.len();
        self.learning_goals.retain(|g| g != goal);
        before != self.learning_goals.len()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.pending_questions.is_empty() || !self.learning_goals.is_empty()
    }

    /// Decide whether to keep the session going at `now`.
    ///
    /// With nothing left to do the session stops as completed, however
    /// long it has been idle; with open work it stops only once idle past
    /// the timeout.
    pub fn should_continue_session(&self, now: DateTime<Utc>) -> ContinuationDecision {
        let idle_minutes = (now - self.last_activity).num_minutes().max(0);

        if !self.has_pending_work() {
            return ContinuationDecision {
                should_continue: false,
                reason: "Learning objectives completed".to_string(),
                idle_minutes,
            };
        }
        if idle_minutes > self.config.idle_timeout_minutes {
            return ContinuationDecision {
                should_continue: false,
                reason: format!("Session idle for {} minutes", idle_minutes),
                idle_minutes,
            };
        }
        let reason = if self.pending_questions.is_empty() {
            format!("{} learning goal(s) remaining", self.learning_goals.len())
        } else {
            format!("{} unresolved question(s)", self.pending_questions.len())
        };
        ContinuationDecision {
            should_continue: true,
            reason,
            idle_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::ConceptId;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session() -> ConversationalSession {
        ConversationalSession::new("s-1", "u-1", SessionConfig::default())
    }

    fn ctx(value: serde_json::Value) -> ContextMap {
        value.as_object().cloned().unwrap()
    }

    fn cargo_build() -> MessageMetadata {
        MessageMetadata::new().with_command(ConceptId::parse("cargo build").unwrap())
    }

    #[test]
    fn test_context_merge_new_keys_win() {
        let mut s = session();
        s.add_message(MessageType::User, "hi", Some(ctx(json!({"intent": "learn", "topic": "rust"}))), None)
            .unwrap();
        s.add_message(MessageType::User, "more", Some(ctx(json!({"intent": "debug"}))), None)
            .unwrap();
        assert_eq!(s.current_context.get("intent"), Some(&json!("debug")));
        assert_eq!(s.current_context.get("topic"), Some(&json!("rust")));
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut s = session();
        assert!(matches!(
            s.add_message(MessageType::User, "  ", None, None),
            Err(Error::Validation { .. })
        ));
        assert!(s.messages.is_empty());
    }

    #[test]
    fn test_turn_learning_point_mastery_by_prior_count() {
        let mut s = session();
        let first = s.create_turn("how?", "run it", None, Some(cargo_build())).unwrap();
        assert_eq!(first.learning_points[0].mastery, TurnMastery::Unknown);

        for _ in 0..3 {
            s.create_turn("again", "run it", None, Some(cargo_build())).unwrap();
        }
        let fifth = s.create_turn("again", "run it", None, Some(cargo_build())).unwrap();
        assert_eq!(fifth.learning_points[0].prior_occurrences, 4);
        assert_eq!(fifth.learning_points[0].mastery, TurnMastery::Familiar);
    }

    #[test]
    fn test_turn_context_evolution() {
        let mut s = session();
        s.add_message(MessageType::System, "start", Some(ctx(json!({"intent": "learn"}))), None)
            .unwrap();
        let turn = s
            .create_turn(
                "it broke",
                "let's look",
                Some(ctx(json!({"intent": "debug", "experience_level": "intermediate"}))),
                None,
            )
            .unwrap();
        let evolution = &turn.context_evolution;
        assert!(evolution.intent_changed());
        assert_eq!(evolution.intent_after.as_deref(), Some("debug"));
        assert_eq!(evolution.expertise_after, Some(crate::learning::ExperienceLevel::Intermediate));
        assert_eq!(evolution.changed_keys.len(), 2);
    }

    #[test]
    fn test_next_steps_capped_at_three() {
        let mut s = session().with_goals(vec!["ship a cli".into()]);
        let metadata = MessageMetadata::new()
            .with_command(ConceptId::parse("cargo_new").unwrap())
            .with_pattern(ConceptId::parse("builder").unwrap())
            .with_pattern(ConceptId::parse("newtype").unwrap());
        let turn = s.create_turn("show me", "here", None, Some(metadata)).unwrap();
        assert_eq!(turn.next_steps.len(), 3);
        assert_eq!(
            turn.next_steps[0],
            NextStep::PracticeCommand(ConceptId::parse("cargo_new").unwrap())
        );
    }

    #[test]
    fn test_questions_open_and_resolve() {
        let mut s = session();
        s.add_message(MessageType::User, "what is a trait?", None, None).unwrap();
        assert_eq!(s.pending_questions.len(), 1);
        s.add_message(MessageType::Assistant, "a shared interface", None, None)
            .unwrap();
        assert!(s.pending_questions.is_empty());
    }

    #[test]
    fn test_idle_without_pending_work_is_completed() {
        let s = session();
        let decision = s.should_continue_session(s.last_activity + Duration::minutes(31));
        assert!(!decision.should_continue);
        assert_eq!(decision.reason, "Learning objectives completed");
    }

    #[test]
    fn test_idle_with_pending_work_stops() {
        let mut s = session().with_goals(vec!["closures".into()]);
        s.add_message(MessageType::User, "hello", None, None).unwrap();

        let fresh = s.should_continue_session(s.last_activity + Duration::minutes(5));
        assert!(fresh.should_continue);

        let stale = s.should_continue_session(s.last_activity + Duration::minutes(31));
        assert!(!stale.should_continue);
        assert!(stale.reason.contains("idle"));
    }

    #[test]
    fn test_decision_serializes_continue_key() {
        let decision = session().should_continue_session(Utc::now());
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["continue"], json!(false));
    }
}
