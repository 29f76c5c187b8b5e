//! Tamper-evident, causally-linked action trace for agents.
//!
//! Flow for every record: build (normalize + derive) → validate → chain
//! (prev_hash/frame_hash under the session lock) → store append.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use axiom_chain::{verify_sessions, ChainHeads};
use axiom_schema::FrameScope;
use axiom_store::{FrameStore, JsonlFrameStore, MemoryFrameStore, StoreError};
use serde_json::Value;
use thiserror::Error;

pub mod action;
pub mod builder;
pub mod config;
pub mod quick;
pub mod session;
pub mod traced;

pub use action::ActionInput;
pub use builder::{build_frame, SessionContext};
pub use config::{ConfigError, TraceConfig};
pub use quick::QuickTrace;
pub use session::SessionRecorder;
pub use traced::{trace_call, trace_call_async};

pub use axiom_chain::{compute_frame_hash, verify_chain, ChainIntegrityError};
pub use axiom_graph::{CausalityGraph, DanglingReferenceError, GraphError};
pub use axiom_schema::{validate_frame, validate_frame_in, ValidationError};
pub use axiom_types::{Actor, ActorKind, Frame, FrameInput};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Integrity(#[from] ChainIntegrityError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Ids of every frame committed through this trace, any session.
#[derive(Default)]
struct CommittedIds(RwLock<HashSet<String>>);

impl CommittedIds {
    fn insert(&self, frame_id: String) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).insert(frame_id);
    }
}

impl FrameScope for CommittedIds {
    fn contains(&self, frame_id: &str) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(frame_id)
    }
}

/// Recording handle over one frame store.
pub struct AxiomTrace {
    store: Arc<dyn FrameStore>,
    heads: ChainHeads,
    committed: CommittedIds,
    context: SessionContext,
}

impl AxiomTrace {
    /// File-backed trace at `config.frames_path()`, resuming any existing chain.
    pub fn open(config: TraceConfig) -> Result<Self, TraceError> {
        let store = JsonlFrameStore::open(config.frames_path(), config.auto_flush)?;
        Self::with_store(Arc::new(store), &config)
    }

    /// Non-durable trace with default settings.
    pub fn in_memory() -> Self {
        let config = TraceConfig::default();
        Self {
            store: Arc::new(MemoryFrameStore::new()),
            heads: ChainHeads::new(),
            committed: CommittedIds::default(),
            context: default_context(&config),
        }
    }

    /// Trace over any store. Frames already in the store restore chain heads
    /// and the set of citable frame ids.
    pub fn with_store(store: Arc<dyn FrameStore>, config: &TraceConfig) -> Result<Self, TraceError> {
        let existing = parse_frames(store.read_all()?)?;
        let heads = ChainHeads::resume(&existing);
        let committed = CommittedIds::default();
        for frame in &existing {
            committed.insert(frame.frame_id.clone());
        }
        let context = default_context(config);
        tracing::info!(
            frames = existing.len(),
            session_id = %context.session_id,
            "trace opened"
        );
        Ok(Self {
            store,
            heads,
            committed,
            context,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    /// Build, validate, chain and persist a frame in the default session.
    pub fn record(&self, input: Value) -> Result<String, TraceError> {
        self.record_in(&self.context, input)
    }

    pub fn record_in(&self, ctx: &SessionContext, input: Value) -> Result<String, TraceError> {
        Ok(self.commit(ctx, input)?.frame_id)
    }

    pub fn record_input(&self, input: FrameInput) -> Result<String, TraceError> {
        self.record(input.into_value())
    }

    pub fn record_action(&self, action: ActionInput) -> Result<String, TraceError> {
        self.record_input(action.into_frame_input())
    }

    /// Record and return the committed frame, linkage included.
    pub fn commit(&self, ctx: &SessionContext, input: Value) -> Result<Frame, TraceError> {
        let frame = build_frame(input, ctx, &self.committed).inspect_err(|e| {
            tracing::warn!(errors = e.errors.len(), "frame rejected: {e}");
        })?;

        let store = &self.store;
        let frame = self.heads.commit(frame, |f| -> Result<(), TraceError> {
            store.append(&f.to_line()?)?;
            Ok(())
        })?;
        self.committed.insert(frame.frame_id.clone());

        tracing::debug!(
            session_id = %frame.session_id,
            frame_id = %frame.frame_id,
            event_type = %frame.event_type,
            "frame committed"
        );
        Ok(frame)
    }

    /// Recorder bound to `session_id`, using the default actor.
    pub fn session(&self, session_id: impl Into<String>) -> SessionRecorder<'_> {
        self.session_with(SessionContext::new(session_id, self.context.actor.clone()))
    }

    pub fn new_session(&self) -> SessionRecorder<'_> {
        self.session_with(SessionContext::fresh(self.context.actor.clone()))
    }

    pub fn session_with(&self, ctx: SessionContext) -> SessionRecorder<'_> {
        SessionRecorder::new(self, ctx)
    }

    /// Every stored frame in append order.
    pub fn frames(&self) -> Result<Vec<Frame>, TraceError> {
        parse_frames(self.store.read_all()?)
    }

    pub fn session_frames(&self, session_id: &str) -> Result<Vec<Frame>, TraceError> {
        let mut frames = self.frames()?;
        frames.retain(|f| f.session_id == session_id);
        Ok(frames)
    }

    /// Verify one session's chain as currently stored.
    pub fn verify_session(&self, session_id: &str) -> Result<(), TraceError> {
        Ok(verify_chain(&self.session_frames(session_id)?)?)
    }

    /// Verify every session chain. Returns the number of sessions checked.
    pub fn verify(&self) -> Result<usize, TraceError> {
        Ok(verify_sessions(&self.frames()?)?)
    }

    /// Causality graph over everything committed so far.
    pub fn causality(&self) -> Result<CausalityGraph, TraceError> {
        Ok(CausalityGraph::from_frames(self.frames()?))
    }

    /// Root cause → `frame_id`.
    pub fn get_chain(&self, frame_id: &str) -> Result<Vec<Frame>, TraceError> {
        let graph = self.causality()?;
        let chain = graph.get_chain(frame_id)?;
        Ok(chain.into_iter().cloned().collect())
    }

    pub fn flush(&self) -> Result<(), TraceError> {
        Ok(self.store.flush()?)
    }

    pub fn close(&self) -> Result<(), TraceError> {
        Ok(self.store.close()?)
    }
}

fn default_context(config: &TraceConfig) -> SessionContext {
    match &config.default_session_id {
        Some(id) => SessionContext::new(id.clone(), config.default_actor.clone()),
        None => SessionContext::fresh(config.default_actor.clone()),
    }
}

fn parse_frames(lines: Vec<String>) -> Result<Vec<Frame>, TraceError> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            Frame::from_line(line).map_err(|e| {
                TraceError::Store(StoreError::Corrupt {
                    line: i + 1,
                    message: e.to_string(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_persists_one_line_per_frame() {
        let store = Arc::new(MemoryFrameStore::new());
        let trace = AxiomTrace::with_store(store.clone(), &TraceConfig::default()).unwrap();
        let id = trace
            .record(json!({
                "event_type": "tool_call",
                "content": {"text": "Calling API"},
                "success": true,
                "metadata": {"tool_name": "api_call"}
            }))
            .unwrap();

        let lines = store.read_all().unwrap();
        assert_eq!(lines.len(), 1);
        let stored: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(stored["frame_id"], id.as_str());
        assert_eq!(stored["success"], true);
        assert_eq!(stored["prev_hash"], "");
        let keys: Vec<&str> = stored.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(!keys.contains(&"caused_by"));
        assert!(!keys.contains(&"artifacts"));
    }

    #[test]
    fn rejected_frames_leave_no_trace() {
        let trace = AxiomTrace::in_memory();
        let err = trace
            .record(json!({"event_type": "thought", "content": {"text": "no summary"}}))
            .unwrap_err();
        assert!(matches!(err, TraceError::Validation(ref v) if v.mentions("rationale_summary")));
        assert!(trace.frames().unwrap().is_empty());

        // The chain head did not move either.
        let id = trace
            .record(json!({"event_type": "thought", "content": {"rationale_summary": "ok"}}))
            .unwrap();
        let frames = trace.frames().unwrap();
        assert_eq!(frames[0].frame_id, id);
        assert_eq!(frames[0].prev_hash, "");
    }

    #[test]
    fn caused_by_must_be_committed() {
        let trace = AxiomTrace::in_memory();
        let err = trace
            .record(json!({"event_type": "note", "caused_by": "not-yet"}))
            .unwrap_err();
        assert!(matches!(err, TraceError::Validation(ref v) if v.mentions("caused_by")));

        let first = trace.record(json!({"event_type": "user_input", "content": {"text": "hi"}})).unwrap();
        let other_session = trace.session("elsewhere");
        let second = other_session
            .record(json!({"event_type": "note", "caused_by": first}))
            .unwrap();
        let chain = trace.get_chain(&second).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn store_failures_propagate_unchanged() {
        let store = Arc::new(MemoryFrameStore::new());
        let trace = AxiomTrace::with_store(store.clone(), &TraceConfig::default()).unwrap();
        trace.close().unwrap();
        let err = trace.record(json!({"event_type": "note"})).unwrap_err();
        assert!(matches!(err, TraceError::Store(StoreError::Closed)));
    }
}
