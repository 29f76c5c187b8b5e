//! Session-scoped recording helpers.

use axiom_schema::kinds;
use axiom_types::{Actor, Frame, FrameInput};
use serde_json::Value;

use crate::{ActionInput, AxiomTrace, SessionContext, TraceError};

/// Records into one session of an [`AxiomTrace`].
pub struct SessionRecorder<'a> {
    trace: &'a AxiomTrace,
    ctx: SessionContext,
}

impl<'a> SessionRecorder<'a> {
    pub fn new(trace: &'a AxiomTrace, ctx: SessionContext) -> Self {
        Self { trace, ctx }
    }

    pub fn session_id(&self) -> &str {
        &self.ctx.session_id
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn trace(&self) -> &'a AxiomTrace {
        self.trace
    }

    pub fn record(&self, input: Value) -> Result<String, TraceError> {
        self.trace.record_in(&self.ctx, input)
    }

    pub fn record_input(&self, input: FrameInput) -> Result<String, TraceError> {
        self.record(input.into_value())
    }

    pub fn commit(&self, input: FrameInput) -> Result<Frame, TraceError> {
        self.trace.commit(&self.ctx, input.into_value())
    }

    pub fn record_action(&self, action: ActionInput) -> Result<String, TraceError> {
        self.record_input(action.into_frame_input())
    }

    pub fn record_thought(&self, summary: &str, text: Option<&str>) -> Result<String, TraceError> {
        let mut input = FrameInput::new(kinds::THOUGHT).content("rationale_summary", summary);
        if let Some(text) = text {
            input = input.content("text", text);
        }
        self.record_input(input)
    }

    pub fn record_tool_call(
        &self,
        tool: &str,
        args: Value,
        reasoning: Option<&str>,
    ) -> Result<String, TraceError> {
        let mut input = FrameInput::new(kinds::TOOL_CALL)
            .content("json", args)
            .metadata("tool_name", tool);
        if let Some(reasoning) = reasoning {
            input = input.content("reasoning", reasoning);
        }
        self.record_input(input)
    }

    pub fn record_tool_output(
        &self,
        tool: &str,
        output: impl Into<Value>,
        success: Option<bool>,
        artifacts: Option<Vec<String>>,
    ) -> Result<String, TraceError> {
        let mut input = FrameInput::new(kinds::TOOL_OUTPUT)
            .content("output", output)
            .metadata("tool_name", tool);
        input.success = success;
        input.artifacts = artifacts;
        self.record_input(input)
    }

    pub fn record_user_input(&self, text: &str) -> Result<String, TraceError> {
        self.record_input(
            FrameInput::new(kinds::USER_INPUT)
                .actor(Actor::user("user"))
                .content("text", text),
        )
    }

    pub fn record_error(&self, message: &str, detail: Option<&str>) -> Result<String, TraceError> {
        let mut input = FrameInput::new(kinds::ERROR)
            .content("text", message)
            .success(false);
        if let Some(detail) = detail {
            input = input.content("output", detail);
        }
        self.record_input(input)
    }
}
