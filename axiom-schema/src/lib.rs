#![forbid(unsafe_code)]
//! Frame schema validation.
//!
//! Validation is exhaustive: every violation is collected and reported in a
//! single [`ValidationError`], never fail-fast.

pub mod macros;

use std::fmt;

use axiom_types::{parse_timestamp, ActorKind, OPTIONAL_FIELDS, REQUIRED_FIELDS};
use serde_json::{Map, Value};
use thiserror::Error;

/// Upper bound on `content.reasoning`, in characters.
pub const MAX_REASONING_CHARS: usize = 5000;

/// Well-known kinds and their extra constraints.
pub mod generated {
    use crate::define_event_kinds;

    define_event_kinds! {
        kind THOUGHT = "thought" { content.rationale_summary },
        kind TOOL_CALL = "tool_call" { metadata.tool_name },
        kind TOOL_OUTPUT = "tool_output" { metadata.tool_name },
        kind USER_INPUT = "user_input" {},
        kind ERROR = "error" {},
    }
}

pub use generated::{kinds, requirements_for, KNOWN_EVENT_TYPES};

/// Which mapping a per-kind rule looks into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Section {
    Content,
    Metadata,
}

impl Section {
    pub const fn field(self) -> &'static str {
        match self {
            Section::Content => "content",
            Section::Metadata => "metadata",
        }
    }
}

/// A single extra constraint attached to an event kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Requirement {
    NonEmptyText { section: Section, key: &'static str },
}

impl Requirement {
    fn check(&self, frame: &Map<String, Value>, errors: &mut Vec<FieldError>) {
        match *self {
            Requirement::NonEmptyText { section, key } => {
                // A missing or non-object section is already reported by the universal pass.
                let Some(map) = frame.get(section.field()).and_then(Value::as_object) else {
                    return;
                };
                let field = format!("{}.{}", section.field(), key);
                match map.get(key) {
                    None | Some(Value::Null) => errors.push(FieldError::new(field, "required")),
                    Some(Value::String(s)) if s.is_empty() => {
                        errors.push(FieldError::new(field, "must be a non-empty string"))
                    }
                    Some(Value::String(_)) => {}
                    Some(_) => errors.push(FieldError::new(field, "must be a string")),
                }
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("frame validation failed: {}", join_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, reason)],
        }
    }

    /// True if any collected error names `field` (exact or as a dotted suffix).
    pub fn mentions(&self, field: &str) -> bool {
        self.errors
            .iter()
            .any(|e| e.field == field || e.field.ends_with(&format!(".{field}")))
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Frames already committed and therefore citable by `caused_by`.
pub trait FrameScope {
    fn contains(&self, frame_id: &str) -> bool;
}

impl FrameScope for std::collections::HashSet<String> {
    fn contains(&self, frame_id: &str) -> bool {
        std::collections::HashSet::contains(self, frame_id)
    }
}

/// Scope that knows no frames; every `caused_by` resolves as unknown.
pub struct EmptyScope;

impl FrameScope for EmptyScope {
    fn contains(&self, _frame_id: &str) -> bool {
        false
    }
}

/// Structural validation. Checks `caused_by` for self-reference only.
pub fn validate_frame(frame: &Value) -> Result<(), ValidationError> {
    finish(collect(frame))
}

/// Structural validation plus resolution of `caused_by` against `scope`.
pub fn validate_frame_in(frame: &Value, scope: &dyn FrameScope) -> Result<(), ValidationError> {
    let mut errors = collect(frame);
    if let Some(cause) = frame.get("caused_by").and_then(Value::as_str) {
        let is_self = frame.get("frame_id").and_then(Value::as_str) == Some(cause);
        if !cause.is_empty() && !is_self && !scope.contains(cause) {
            errors.push(FieldError::new(
                "caused_by",
                format!("references uncommitted frame {cause}"),
            ));
        }
    }
    finish(errors)
}

fn finish(errors: Vec<FieldError>) -> Result<(), ValidationError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn collect(frame: &Value) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let Some(obj) = frame.as_object() else {
        errors.push(FieldError::new("frame", "must be an object"));
        return errors;
    };

    for field in REQUIRED_FIELDS {
        if matches!(obj.get(field), None | Some(Value::Null)) {
            errors.push(FieldError::new(field, "required"));
        }
    }
    for key in obj.keys() {
        let known = REQUIRED_FIELDS.contains(&key.as_str()) || OPTIONAL_FIELDS.contains(&key.as_str());
        if !known {
            errors.push(FieldError::new(key.as_str(), "unknown field"));
        }
    }

    for field in [
        "frame_id",
        "session_id",
        "timestamp",
        "vector_key",
        "prev_hash",
        "frame_hash",
    ] {
        if let Some(v) = obj.get(field) {
            if !v.is_null() && !v.is_string() {
                errors.push(FieldError::new(field, "must be a string"));
            }
        }
    }
    for field in ["frame_id", "session_id"] {
        if obj.get(field).and_then(Value::as_str).is_some_and(str::is_empty) {
            errors.push(FieldError::new(field, "must be non-empty"));
        }
    }

    if let Some(ts) = obj.get("timestamp").and_then(Value::as_str) {
        if parse_timestamp(ts).is_none() {
            errors.push(FieldError::new(
                "timestamp",
                "must be UTC with millisecond precision (YYYY-MM-DDTHH:MM:SS.mmmZ)",
            ));
        }
    }

    check_event_type(obj, &mut errors);
    check_actor(obj, &mut errors);
    for field in ["content", "metadata"] {
        if let Some(v) = obj.get(field) {
            if !v.is_null() && !v.is_object() {
                errors.push(FieldError::new(field, "must be an object"));
            }
        }
    }
    check_content_limits(obj, &mut errors);
    check_optional(obj, &mut errors);

    if let Some(event_type) = obj.get("event_type").and_then(Value::as_str) {
        for rule in requirements_for(event_type) {
            rule.check(obj, &mut errors);
        }
    }

    errors
}

fn check_event_type(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    match obj.get("event_type") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.is_empty() => {
            errors.push(FieldError::new("event_type", "must be non-empty"))
        }
        Some(Value::String(_)) => {}
        Some(_) => errors.push(FieldError::new("event_type", "must be a string")),
    }
}

fn check_actor(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    let actor = match obj.get("actor") {
        None | Some(Value::Null) => return,
        Some(Value::Object(actor)) => actor,
        Some(_) => {
            errors.push(FieldError::new("actor", "must be an object"));
            return;
        }
    };

    match actor.get("type") {
        Some(Value::String(kind)) if ActorKind::parse(kind).is_some() => {}
        Some(Value::String(kind)) => errors.push(FieldError::new(
            "actor.type",
            format!("unknown actor type {kind:?}, expected agent, user or system"),
        )),
        None | Some(Value::Null) => errors.push(FieldError::new("actor.type", "required")),
        Some(_) => errors.push(FieldError::new("actor.type", "must be a string")),
    }

    match actor.get("id") {
        Some(Value::String(id)) if !id.is_empty() => {}
        Some(Value::String(_)) => errors.push(FieldError::new("actor.id", "must be non-empty")),
        None | Some(Value::Null) => errors.push(FieldError::new("actor.id", "required")),
        Some(_) => errors.push(FieldError::new("actor.id", "must be a string")),
    }
}

fn check_content_limits(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    let Some(content) = obj.get("content").and_then(Value::as_object) else {
        return;
    };
    match content.get("reasoning") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.chars().count() > MAX_REASONING_CHARS => errors.push(
            FieldError::new(
                "content.reasoning",
                format!("exceeds {MAX_REASONING_CHARS} characters"),
            ),
        ),
        Some(Value::String(_)) => {}
        Some(_) => errors.push(FieldError::new("content.reasoning", "must be a string")),
    }
}

fn check_optional(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    if let Some(v) = obj.get("success") {
        if !v.is_boolean() {
            errors.push(FieldError::new("success", "must be a boolean"));
        }
    }

    if let Some(v) = obj.get("caused_by") {
        match v.as_str() {
            Some("") => errors.push(FieldError::new("caused_by", "must be non-empty")),
            Some(cause) if obj.get("frame_id").and_then(Value::as_str) == Some(cause) => {
                errors.push(FieldError::new("caused_by", "frame cannot cause itself"))
            }
            Some(_) => {}
            None => errors.push(FieldError::new("caused_by", "must be a frame_id string")),
        }
    }

    if let Some(v) = obj.get("artifacts") {
        let all_strings = v
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            errors.push(FieldError::new("artifacts", "must be a list of strings"));
        }
    }
}
