use axiom_schema::kinds;
use axiom_types::FrameInput;
use serde_json::{Map, Value};

/// Flat description of one agent action, spread into `content` and
/// `metadata` on conversion.
#[derive(Clone, Debug, Default)]
pub struct ActionInput {
    pub event_type: String,
    pub text: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub reasoning: Option<String>,
    pub rationale_summary: Option<String>,
    pub tool_name: Option<String>,
    pub success: Option<bool>,
    pub caused_by: Option<String>,
    pub artifacts: Option<Vec<String>>,
    pub metadata: Map<String, Value>,
}

impl ActionInput {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn input(mut self, input: impl Into<Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn output(mut self, output: impl Into<Value>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn rationale_summary(mut self, summary: impl Into<String>) -> Self {
        self.rationale_summary = Some(summary.into());
        self
    }

    pub fn tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn caused_by(mut self, frame_id: impl Into<String>) -> Self {
        self.caused_by = Some(frame_id.into());
        self
    }

    pub fn artifacts<I, S>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts = Some(artifacts.into_iter().map(Into::into).collect());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn into_frame_input(self) -> FrameInput {
        let rationale = match self.rationale_summary {
            Some(summary) => Some(summary),
            // Thoughts recorded as actions summarise themselves.
            None if self.event_type == kinds::THOUGHT => self
                .reasoning
                .clone()
                .or_else(|| self.output.as_ref().and_then(Value::as_str).map(str::to_string))
                .or_else(|| self.text.clone()),
            None => None,
        };

        let mut content = Map::new();
        let fields = [
            ("text", self.text.map(Value::String)),
            ("input", self.input),
            ("output", self.output),
            ("reasoning", self.reasoning.map(Value::String)),
            ("rationale_summary", rationale.map(Value::String)),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                content.insert(key.to_string(), value);
            }
        }

        let mut metadata = self.metadata;
        if let Some(tool) = self.tool_name {
            metadata.insert("tool_name".into(), Value::String(tool));
        }

        FrameInput {
            event_type: self.event_type,
            content,
            metadata,
            success: self.success,
            caused_by: self.caused_by,
            artifacts: self.artifacts,
            ..FrameInput::default()
        }
    }
}
