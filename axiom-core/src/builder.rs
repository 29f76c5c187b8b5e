//! Frame assembly: complete partial input into a canonical, validated frame.

use axiom_schema::{validate_frame_in, FrameScope, ValidationError};
use axiom_types::{
    derive_vector_key, new_frame_id, now_timestamp, Actor, Frame, OPTIONAL_FIELDS,
};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Who is recording, and into which chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub actor: Actor,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, actor: Actor) -> Self {
        Self {
            session_id: session_id.into(),
            actor,
        }
    }

    /// Context with a freshly generated session id.
    pub fn fresh(actor: Actor) -> Self {
        Self::new(Uuid::new_v4().to_string(), actor)
    }
}

/// Build a frame from loose caller input.
///
/// The core owns `frame_id`, `timestamp`, `vector_key` and both hash fields;
/// caller values for them are overwritten. Linkage is left empty for the
/// chain engine. Nothing is returned unless the result validates.
pub fn build_frame(
    input: Value,
    ctx: &SessionContext,
    scope: &dyn FrameScope,
) -> Result<Frame, ValidationError> {
    let Value::Object(mut obj) = input else {
        return Err(ValidationError::single("frame", "input must be an object"));
    };

    obj.insert("frame_id".into(), Value::String(new_frame_id()));
    obj.insert("timestamp".into(), Value::String(now_timestamp()));
    fill_missing(&mut obj, "session_id", || Value::String(ctx.session_id.clone()));
    fill_missing(&mut obj, "actor", || actor_value(&ctx.actor));
    fill_missing(&mut obj, "content", || Value::Object(Map::new()));
    fill_missing(&mut obj, "metadata", || Value::Object(Map::new()));

    // Absent and null both mean "not supplied".
    for field in OPTIONAL_FIELDS {
        if obj.get(field).is_some_and(Value::is_null) {
            obj.remove(field);
        }
    }

    let vector_key = match obj.get("event_type").and_then(Value::as_str) {
        Some(event_type) => {
            let empty = Map::new();
            let content = obj.get("content").and_then(Value::as_object).unwrap_or(&empty);
            derive_vector_key(event_type, content)
        }
        None => String::new(),
    };
    obj.insert("vector_key".into(), Value::String(vector_key));
    obj.insert("prev_hash".into(), Value::String(String::new()));
    obj.insert("frame_hash".into(), Value::String(String::new()));

    let candidate = Value::Object(obj);
    validate_frame_in(&candidate, scope)?;
    serde_json::from_value(candidate).map_err(|e| ValidationError::single("frame", e.to_string()))
}

fn fill_missing(obj: &mut Map<String, Value>, field: &str, default: impl FnOnce() -> Value) {
    if matches!(obj.get(field), None | Some(Value::Null)) {
        obj.insert(field.to_string(), default());
    }
}

fn actor_value(actor: &Actor) -> Value {
    let mut m = Map::new();
    m.insert("type".into(), Value::String(actor.kind.as_str().into()));
    m.insert("id".into(), Value::String(actor.id.clone()));
    Value::Object(m)
}
