use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fixed textual timestamp layout: UTC, millisecond precision, `Z` suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Fields every frame must carry, in canonical order.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "frame_id",
    "session_id",
    "timestamp",
    "event_type",
    "actor",
    "content",
    "metadata",
    "vector_key",
    "prev_hash",
    "frame_hash",
];

/// Optional agent-reflection fields. Absent unless the caller supplied them.
pub const OPTIONAL_FIELDS: [&str; 3] = ["success", "caused_by", "artifacts"];

/// Who produced a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Agent,
    User,
    System,
}

impl ActorKind {
    pub const ALL: [ActorKind; 3] = [ActorKind::Agent, ActorKind::User, ActorKind::System];

    pub const fn as_str(self) -> &'static str {
        match self {
            ActorKind::Agent => "agent",
            ActorKind::User => "user",
            ActorKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Actor {
    #[serde(rename = "type")]
    pub kind: ActorKind,
    pub id: String,
}

impl Actor {
    pub fn new(kind: ActorKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(ActorKind::Agent, id)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ActorKind::User, id)
    }

    pub fn system(id: impl Into<String>) -> Self {
        Self::new(ActorKind::System, id)
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::agent("agent")
    }
}

/// Atomic, immutable unit of the trace.
///
/// Field order here is the persisted key order. Optional fields are skipped
/// entirely when `None`, so a stored frame never carries `null` placeholders.
/// Parsing is strict: a line with extra keys or a `null` optional field is
/// not a frame, since neither would be covered by `frame_hash`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frame {
    pub frame_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub event_type: String,
    pub actor: Actor,
    pub content: Map<String, Value>,
    pub metadata: Map<String, Value>,
    pub vector_key: String,
    pub prev_hash: String,
    pub frame_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub caused_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub artifacts: Option<Vec<String>>,
}

/// Optional field that, when present, must hold a value (`null` is an error).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Frame {
    /// String-valued `content` entry, if present.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// String-valued `metadata` entry, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Serialize as one persisted line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Partial frame assembled by callers before the builder completes it.
///
/// Only `event_type` is mandatory; everything the core owns (ids, timestamp,
/// hashes, vector key) is filled in at build time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<String>>,
}

impl FrameInput {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn content(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.content.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
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

    /// Loose JSON object form consumed by the builder.
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Fresh globally-unique frame identifier.
pub fn new_frame_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC instant in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    // %.3f accepts any fraction width on parse, so pin the exact shape first.
    let bytes = s.as_bytes();
    if bytes.len() != 24 || bytes[19] != b'.' || bytes[23] != b'Z' {
        return None;
    }
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `"<event_type> | <summary>"`, summary by priority
/// `rationale_summary` > `output` > `text` > empty.
pub fn derive_vector_key(event_type: &str, content: &Map<String, Value>) -> String {
    let summary = ["rationale_summary", "output", "text"]
        .iter()
        .filter_map(|key| content.get(*key))
        .find_map(summary_text)
        .unwrap_or_default();
    format!("{event_type} | {summary}")
}

fn summary_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
