//! Per-session orchestration of memory, learning and conversation.
//!
//! The [`ContextOrchestrator`] owns one [`SessionState`] per session id and
//! routes typed [`PersistenceRequest`]s to it:
//!
//! - **initialize**: create the session if absent
//! - **store / retrieve**: memory access, with learning updates on store
//! - **consolidate**: memory consolidation carried into the learner context
//! - **advance**: phase advancement with importance boosts
//! - **snapshot**: an immutable view with composite progress
//!
//! Requests for one session are serialized by a per-session async mutex;
//! different sessions proceed in parallel. Mutating requests work on a
//! draft copy that replaces the live state only on success, so a failed
//! request leaves the session exactly as it was.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mentor_core::orchestrator::{ContextOrchestrator, PersistenceRequest};
//! use mentor_core::{ConceptId, MentorConfig, NewMemory};
//!
//! let orchestrator = ContextOrchestrator::new(MentorConfig::default())?;
//! orchestrator.handle("s-1", PersistenceRequest::initialize("ada")).await;
//!
//! let caching = ConceptId::parse("caching")?;
//! let response = orchestrator
//!     .handle("s-1", PersistenceRequest::store(NewMemory::new("LRU evicts cold keys", vec![caching])))
//!     .await;
//! assert!(response.success);
//! ```

mod sink;
mod state;
mod types;

pub use sink::{InMemorySnapshotSink, SnapshotSink};
pub use state::{AdvanceOutcome, ConsolidateOutcome, SessionState, PHASE_ENTRY_BOOST};
pub use types::*;

use crate::concept::ConceptId;
use crate::config::MentorConfig;
use crate::error::{Error, Result};
use crate::learning::MasteryChange;
use crate::memory::CancelFlag;
use crate::session::{ContextMap, ContinuationDecision, ConversationTurn, MessageMetadata};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

type SessionHandle = Arc<Mutex<SessionState>>;

/// Session arena and request router.
pub struct ContextOrchestrator {
    config: Arc<MentorConfig>,
    sessions: DashMap<String, SessionHandle>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl std::fmt::Debug for ContextOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextOrchestrator")
            .field("sessions", &self.sessions.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl ContextOrchestrator {
    /// Create an orchestrator after validating `config`.
    pub fn new(config: MentorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sessions: DashMap::new(),
            sink: None,
        })
    }

    /// Hand torn-down sessions to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &MentorConfig {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    // ==================== Requests ====================

    /// Handle one request. Never fails; errors come back as a response
    /// with `success: false`.
    pub async fn handle(&self, session_id: &str, request: PersistenceRequest) -> PersistenceResponse {
        self.handle_with_cancel(session_id, request, &CancelFlag::new()).await
    }

    /// [`handle`](Self::handle) with a cancellation flag for consolidation.
    #[instrument(skip(self, request, cancel), fields(request_type = %request.request_type()))]
    pub async fn handle_with_cancel(
        &self,
        session_id: &str,
        request: PersistenceRequest,
        cancel: &CancelFlag,
    ) -> PersistenceResponse {
        let request_type = request.request_type();
        match self.dispatch(session_id, request, cancel).await {
            Ok(data) => PersistenceResponse::ok(request_type, session_id, data),
            Err(err) => {
                let err = err.in_request(request_type.to_string(), session_id);
                warn!(session_id, kind = err.kind(), error = %err, "Request failed");
                PersistenceResponse::failure(request_type, session_id, &err)
            }
        }
    }

    /// Handle a batch. Requests for the same session run in the given
    /// order; different sessions run concurrently. Responses come back in
    /// input order.
    pub async fn handle_many(&self, requests: Vec<(String, PersistenceRequest)>) -> Vec<PersistenceResponse> {
        let total = requests.len();
        let mut groups: Vec<(String, Vec<(usize, PersistenceRequest)>)> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();
        for (pos, (session_id, request)) in requests.into_iter().enumerate() {
            let group = *group_of.entry(session_id.clone()).or_insert_with(|| {
                groups.push((session_id, Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push((pos, request));
        }
        debug!(requests = total, sessions = groups.len(), "Handling request batch");

        let runs = groups.into_iter().map(|(session_id, batch)| async move {
            let mut responses = Vec::with_capacity(batch.len());
            for (pos, request) in batch {
                responses.push((pos, self.handle(&session_id, request).await));
            }
            responses
        });

        let mut slots: Vec<Option<PersistenceResponse>> = vec![None; total];
        for (pos, response) in join_all(runs).await.into_iter().flatten() {
            slots[pos] = Some(response);
        }
        slots.into_iter().flatten().collect()
    }

    async fn dispatch(&self, session_id: &str, request: PersistenceRequest, cancel: &CancelFlag) -> Result<Value> {
        if session_id.trim().is_empty() {
            return Err(Error::validation("session_id", "must not be empty"));
        }

        match request {
            PersistenceRequest::Initialize {
                user_id,
                profile,
                goals,
                context,
            } => {
                let outcome = self.initialize(session_id, &user_id, profile, goals, context).await?;
                Ok(serde_json::to_value(outcome)?)
            }
            PersistenceRequest::Store {
                memory,
                performance,
                exercise_completed,
                context,
            } => {
                let outcome = self
                    .mutate(session_id, |state, config| {
                        state.store(memory, performance, exercise_completed, context.as_ref(), config)
                    })
                    .await?;
                Ok(serde_json::to_value(outcome)?)
            }
            PersistenceRequest::Retrieve { query } => {
                if !self.contains(session_id) {
                    return Ok(json!([]));
                }
                let results = self.mutate(session_id, |state, _| state.retrieve(&query)).await?;
                Ok(serde_json::to_value(results)?)
            }
            PersistenceRequest::Consolidate => {
                let outcome = self
                    .mutate(session_id, |state, config| state.consolidate(cancel, config))
                    .await?;
                Ok(serde_json::to_value(outcome)?)
            }
            PersistenceRequest::Advance { evidence } => {
                let outcome = self
                    .mutate(session_id, |state, config| state.advance(&evidence, config))
                    .await?;
                Ok(serde_json::to_value(outcome)?)
            }
            PersistenceRequest::Snapshot => {
                let state = self.lock_session(session_id).await?;
                Ok(serde_json::to_value(state.snapshot(&self.config))?)
            }
        }
    }

    async fn initialize(
        &self,
        session_id: &str,
        user_id: &str,
        profile: crate::learning::LearnerProfile,
        goals: Vec<String>,
        context: Option<ContextMap>,
    ) -> Result<InitializeOutcome> {
        if user_id.trim().is_empty() {
            return Err(Error::validation("user_id", "must not be empty"));
        }

        let mut created = false;
        let handle = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(SessionState::new(
                    session_id,
                    user_id,
                    profile,
                    goals,
                    context.as_ref(),
                    &self.config,
                )))
            })
            .value()
            .clone();

        let state = handle.lock().await;
        if state.session.user_id != user_id {
            return Err(Error::state_conflict(format!(
                "session {} belongs to user {}",
                session_id, state.session.user_id
            )));
        }
        if created {
            info!(session_id, user_id, phase = %state.experience.phase, "Initialized session");
        } else {
            debug!(session_id, "Session already initialized");
        }
        Ok(state.initialize_outcome(created))
    }

    // ==================== Session access ====================

    /// Lock a live session. A session torn down while waiting for the lock
    /// counts as unknown.
    async fn lock_session(&self, session_id: &str) -> Result<OwnedMutexGuard<SessionState>> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found("session", session_id))?;

        let guard = handle.clone().lock_owned().await;
        let live = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::ptr_eq(entry.value(), &handle))
            .unwrap_or(false);
        if !live {
            return Err(Error::not_found("session", session_id));
        }
        Ok(guard)
    }

    /// Run `op` against a draft of the session and commit it on success.
    async fn mutate<T, F>(&self, session_id: &str, op: F) -> Result<T>
    where
        F: FnOnce(&mut SessionState, &MentorConfig) -> Result<T>,
    {
        let mut guard = self.lock_session(session_id).await?;
        let mut draft = guard.clone();
        let out = op(&mut draft, &self.config)?;
        *guard = draft;
        Ok(out)
    }

    // ==================== Session operations ====================

    /// Record a conversation turn and store the concepts it tagged.
    pub async fn record_turn(
        &self,
        session_id: &str,
        user: &str,
        assistant: &str,
        context: Option<ContextMap>,
        metadata: Option<MessageMetadata>,
    ) -> Result<ConversationTurn> {
        self.mutate(session_id, |state, config| {
            state.record_turn(user, assistant, context, metadata, config)
        })
        .await
        .map_err(|e| e.in_request("record_turn", session_id))
    }

    /// Response shape for the upstream layer to fill in.
    pub async fn response_scaffold(&self, session_id: &str) -> Result<ResponseScaffold> {
        let state = self.lock_session(session_id).await?;
        Ok(state.response_scaffold(&self.config))
    }

    pub async fn should_continue(&self, session_id: &str, now: DateTime<Utc>) -> Result<ContinuationDecision> {
        let state = self.lock_session(session_id).await?;
        Ok(state.session.should_continue_session(now))
    }

    pub async fn complete_goal(&self, session_id: &str, goal: &str) -> Result<bool> {
        self.mutate(session_id, |state, _| Ok(state.session.complete_goal(goal)))
            .await
    }

    /// Explicit review event for a concept; the only way mastery goes down.
    pub async fn review_block(&self, session_id: &str, concept: &ConceptId) -> Result<Option<MasteryChange>> {
        self.mutate(session_id, |state, _| state.review(concept))
            .await
            .map_err(|e| e.in_request("review", session_id))
    }

    pub async fn export_state(&self, session_id: &str) -> Result<PersistedSessionState> {
        let state = self.lock_session(session_id).await?;
        Ok(state.export())
    }

    /// End a session: purge session-scoped memory, hand the final state to
    /// the sink and drop the session. If the sink fails the session stays
    /// live and untouched.
    #[instrument(skip(self))]
    pub async fn teardown(&self, session_id: &str) -> Result<PersistedSessionState> {
        let mut guard = self
            .lock_session(session_id)
            .await
            .map_err(|e| e.in_request("teardown", session_id))?;

        let mut draft = guard.clone();
        let purged = draft.memory.purge_session_scoped();
        let tick = draft.memory.tick();
        draft.drop_dangling_connections(tick);
        let exported = draft.export();

        if let Some(sink) = &self.sink {
            sink.persist(&exported)
                .await
                .map_err(|e| e.in_request("teardown", session_id))?;
        }

        *guard = draft;
        self.sessions.remove(session_id);
        info!(session_id, purged = purged.len(), "Tore down session");
        Ok(exported)
    }
}
