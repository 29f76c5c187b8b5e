//! Minimal-ceremony recording on top of an owned trace handle.

use std::error::Error;

use axiom_schema::kinds;
use axiom_types::{Actor, FrameInput};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{AxiomTrace, SessionContext, SessionRecorder, TraceConfig, TraceError};

pub const LOG: &str = "log";
pub const TASK_COMPLETE: &str = "task_complete";

pub struct QuickTrace {
    trace: AxiomTrace,
    ctx: SessionContext,
}

impl QuickTrace {
    pub fn new(trace: AxiomTrace) -> Self {
        let ctx = trace.context().clone();
        Self { trace, ctx }
    }

    pub fn open(config: TraceConfig) -> Result<Self, TraceError> {
        Ok(Self::new(AxiomTrace::open(config)?))
    }

    /// Trace configured from `AXIOM_*` environment variables.
    pub fn from_env() -> Result<Self, TraceError> {
        Self::open(TraceConfig::from_env()?)
    }

    pub fn trace(&self) -> &AxiomTrace {
        &self.trace
    }

    pub fn session_id(&self) -> &str {
        &self.ctx.session_id
    }

    /// Switch to `session_id`, or a fresh one.
    pub fn start_session(&mut self, session_id: Option<&str>) -> &str {
        self.ctx.session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        &self.ctx.session_id
    }

    pub fn recorder(&self) -> SessionRecorder<'_> {
        self.trace.session_with(self.ctx.clone())
    }

    pub fn log(&self, message: &str, metadata: Map<String, Value>) -> Result<String, TraceError> {
        let mut input = FrameInput::new(LOG).content("text", message);
        input.metadata = metadata;
        self.record(input)
    }

    pub fn thought(&self, message: &str) -> Result<String, TraceError> {
        self.record(
            FrameInput::new(kinds::THOUGHT)
                .content("text", message)
                .content("rationale_summary", message),
        )
    }

    pub fn tool(&self, name: &str, args: Value, result: Option<Value>) -> Result<String, TraceError> {
        let mut input = FrameInput::new(kinds::TOOL_CALL)
            .content("text", format!("Calling {name}"))
            .content("json", args)
            .metadata("tool_name", name);
        if let Some(result) = result {
            input = input.content("output", result);
        }
        self.record(input)
    }

    pub fn done(&self, result: impl Into<Value>) -> Result<String, TraceError> {
        self.record(
            FrameInput::new(TASK_COMPLETE)
                .content("output", result)
                .success(true),
        )
    }

    pub fn error(&self, message: &str, err: Option<&dyn Error>) -> Result<String, TraceError> {
        let mut input = FrameInput::new(kinds::ERROR)
            .content("text", message)
            .success(false);
        if let Some(err) = err {
            let mut causes = Vec::new();
            let mut source = err.source();
            while let Some(cause) = source {
                causes.push(Value::String(cause.to_string()));
                source = cause.source();
            }
            input = input.content("output", err.to_string());
            if !causes.is_empty() {
                input = input.metadata("causes", Value::Array(causes));
            }
        }
        self.record(input)
    }

    pub fn input(&self, text: &str) -> Result<String, TraceError> {
        self.record(
            FrameInput::new(kinds::USER_INPUT)
                .actor(Actor::user("user"))
                .content("text", text),
        )
    }

    pub fn flush(&self) -> Result<(), TraceError> {
        self.trace.flush()
    }

    pub fn close(&self) -> Result<(), TraceError> {
        self.trace.close()
    }

    fn record(&self, input: FrameInput) -> Result<String, TraceError> {
        self.trace.record_in(&self.ctx, input.into_value())
    }
}
