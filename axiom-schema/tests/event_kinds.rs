use axiom_schema::*;
use serde_json::{json, Value};

fn frame_with(overrides: Value) -> Value {
    let mut frame = json!({
        "frame_id": "550e8400-e29b-41d4-a716-446655440000",
        "session_id": "660e8400-e29b-41d4-a716-446655440000",
        "timestamp": "2026-01-08T22:14:05.123Z",
        "event_type": "thought",
        "actor": {"type": "agent", "id": "test-agent"},
        "content": {"text": "This is a test thought", "rationale_summary": "Testing the system"},
        "metadata": {},
        "vector_key": "thought | Testing the system",
        "prev_hash": "",
        "frame_hash": "abc123"
    });
    if let (Some(base), Some(extra)) = (frame.as_object_mut(), overrides.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    frame
}

#[test]
fn every_universal_field_is_named_when_missing() {
    for field in axiom_types::REQUIRED_FIELDS {
        let mut frame = frame_with(json!({}));
        frame.as_object_mut().unwrap().remove(field);
        let err = validate_frame(&frame).unwrap_err();
        assert!(
            err.errors.iter().any(|e| e.field == field),
            "missing {field} not reported: {err}"
        );
    }
}

#[test]
fn thought_needs_rationale_summary() {
    let frame = frame_with(json!({"content": {"text": "Just a thought"}}));
    let err = validate_frame(&frame).unwrap_err();
    assert!(err.to_string().contains("rationale_summary"));

    let frame = frame_with(json!({"content": {"text": "Just a thought", "rationale_summary": "why"}}));
    validate_frame(&frame).unwrap();
}

#[test]
fn tool_frames_need_tool_name() {
    for kind in [kinds::TOOL_CALL, kinds::TOOL_OUTPUT] {
        let frame = frame_with(json!({
            "event_type": kind,
            "content": {"json": {"tool": "search"}},
            "metadata": {}
        }));
        let err = validate_frame(&frame).unwrap_err();
        assert!(err.to_string().contains("tool_name"), "{kind}: {err}");

        let frame = frame_with(json!({
            "event_type": kind,
            "content": {"json": {"tool": "search"}},
            "metadata": {"tool_name": "search"}
        }));
        validate_frame(&frame).unwrap();
    }
}

#[test]
fn custom_event_types_only_need_universal_fields() {
    let frame = frame_with(json!({
        "event_type": "custom_observation",
        "content": {"text": "Custom event"}
    }));
    validate_frame(&frame).unwrap();
}

#[test]
fn content_fields_are_not_mutually_exclusive() {
    let frame = frame_with(json!({
        "event_type": "tool_call",
        "content": {
            "text": "Some text",
            "json": {"key": "value"},
            "input": "User request",
            "output": "Result",
            "reasoning": "Needed to create file"
        },
        "metadata": {"tool_name": "test_tool"}
    }));
    validate_frame(&frame).unwrap();
}

#[test]
fn actor_must_be_recognised() {
    let frame = frame_with(json!({"actor": {"type": "invalid_actor", "id": "test"}}));
    assert!(validate_frame(&frame).unwrap_err().mentions("actor.type"));

    let frame = frame_with(json!({"actor": {"type": "agent"}}));
    assert!(validate_frame(&frame).unwrap_err().mentions("actor.id"));

    let frame = frame_with(json!({
        "event_type": "user_input",
        "actor": {"type": "user", "id": "user-1"},
        "content": {"text": "Hello agent"}
    }));
    validate_frame(&frame).unwrap();
}
