use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use axiom_chain::{compute_frame_hash, DivergenceKind};
use axiom_core::*;
use axiom_graph::GraphError;
use axiom_store::{FrameStore, MemoryFrameStore, StoreError};
use axiom_types::Frame;
use serde_json::{json, Value};

fn vault() -> (tempfile::TempDir, TraceConfig) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = TraceConfig::default()
        .with_vault_dir(dir.path())
        .with_auto_flush(false)
        .with_session_id("s-main");
    (dir, cfg)
}

fn stored_lines(trace: &AxiomTrace) -> Vec<Value> {
    trace.flush().unwrap();
    trace
        .frames()
        .unwrap()
        .iter()
        .map(|f| serde_json::to_value(f).unwrap())
        .collect()
}

#[test]
fn n_frames_form_a_verifiable_chain() {
    let (_dir, cfg) = vault();
    let trace = AxiomTrace::open(cfg).unwrap();
    for i in 0..10 {
        trace
            .record(json!({"event_type": "log", "content": {"text": format!("step {i}")}}))
            .unwrap();
    }

    let frames = trace.session_frames("s-main").unwrap();
    assert_eq!(frames.len(), 10);
    assert_eq!(frames[0].prev_hash, "");
    for pair in frames.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].frame_hash);
    }
    for frame in &frames {
        assert_eq!(compute_frame_hash(frame), frame.frame_hash);
    }
    trace.verify_session("s-main").unwrap();
}

#[test]
fn agent_fields_round_trip_through_the_file() {
    let (_dir, cfg) = vault();
    let trace = AxiomTrace::open(cfg).unwrap();

    let first = trace
        .record(json!({
            "event_type": "user_input",
            "actor": {"type": "user", "id": "u-1"},
            "content": {"text": "Build a REST API"}
        }))
        .unwrap();
    trace
        .record(json!({
            "event_type": "thought",
            "content": {"text": "Planning", "rationale_summary": "Need endpoints"},
            "caused_by": first,
            "artifacts": []
        }))
        .unwrap();
    trace
        .record(json!({
            "event_type": "tool_call",
            "content": {"text": "Created files", "input": "user model", "output": "done", "reasoning": "CRUD"},
            "artifacts": ["api/users.py", "api/routes.py"],
            "success": false,
            "metadata": {"tool_name": "write_file"}
        }))
        .unwrap();

    let lines = stored_lines(&trace);
    assert!(lines[0].get("success").is_none());
    assert!(lines[0].get("caused_by").is_none());
    assert!(lines[0].get("artifacts").is_none());
    assert_eq!(lines[1]["caused_by"], json!(first));
    assert_eq!(lines[1]["artifacts"], json!([]));
    assert_eq!(lines[2]["success"], json!(false));
    assert_eq!(lines[2]["artifacts"], json!(["api/users.py", "api/routes.py"]));
    assert_eq!(lines[2]["content"]["reasoning"], json!("CRUD"));
    assert_eq!(lines[2]["vector_key"], json!("tool_call | done"));
}

#[test]
fn floats_survive_the_file_round_trip() {
    let (_dir, cfg) = vault();
    let trace = AxiomTrace::open(cfg.clone()).unwrap();
    for score in [1.0715660391465826e-75, 0.1 + 0.2, 1e308, -2.5e-300, 0.30000000000000004] {
        trace
            .record(json!({"event_type": "log", "content": {"score": score}, "metadata": {"weight": score / 3.0}}))
            .unwrap();
    }
    assert_eq!(trace.verify().unwrap(), 1);
    trace.close().unwrap();

    let reopened = AxiomTrace::open(cfg).unwrap();
    assert_eq!(reopened.verify().unwrap(), 1);
    let frames = reopened.frames().unwrap();
    assert_eq!(frames[0].content["score"], json!(1.0715660391465826e-75));
}

#[test]
fn smuggled_keys_in_a_stored_line_are_corruption() {
    let (dir, cfg) = vault();
    {
        let trace = AxiomTrace::open(cfg.clone()).unwrap();
        trace.record(json!({"event_type": "log", "content": {"text": "ok"}})).unwrap();
        trace.close().unwrap();
    }

    let path = dir.path().join("frames.jsonl");
    let text = std::fs::read_to_string(&path).unwrap();
    let mut line: Value = serde_json::from_str(text.trim_end()).unwrap();
    line["injected"] = json!("evil");
    line["success"] = Value::Null;
    std::fs::write(&path, format!("{line}\n")).unwrap();

    match AxiomTrace::open(cfg) {
        Err(TraceError::Store(StoreError::Corrupt { line, .. })) => assert_eq!(line, 1),
        Err(other) => panic!("expected corrupt store, got {other:?}"),
        Ok(_) => panic!("tampered line was accepted"),
    }
}

#[test]
fn reopening_continues_the_chain() {
    let (_dir, cfg) = vault();
    let last = {
        let trace = AxiomTrace::open(cfg.clone()).unwrap();
        trace.record(json!({"event_type": "log"})).unwrap();
        let id = trace.record(json!({"event_type": "log"})).unwrap();
        trace.close().unwrap();
        id
    };

    let trace = AxiomTrace::open(cfg).unwrap();
    let next = trace
        .record(json!({"event_type": "log", "caused_by": last}))
        .unwrap();
    let frames = trace.session_frames("s-main").unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].frame_id, next);
    assert_eq!(frames[2].prev_hash, frames[1].frame_hash);
    trace.verify().unwrap();
}

#[test]
fn tampering_is_pinned_to_the_altered_frame() {
    let store = Arc::new(MemoryFrameStore::new());
    let trace = AxiomTrace::with_store(store.clone(), &TraceConfig::default()).unwrap();
    let rec = trace.session("audit");
    for i in 0..5 {
        rec.record_thought(&format!("reason {i}"), None).unwrap();
    }
    let originals: Vec<Frame> = trace.frames().unwrap();

    // Copy the store, rewriting frame 3's content.
    let forged = MemoryFrameStore::new();
    for (i, frame) in originals.iter().enumerate() {
        let mut frame = frame.clone();
        if i == 3 {
            frame.content.insert("rationale_summary".into(), json!("nothing to see"));
        }
        forged.append(&frame.to_line().unwrap()).unwrap();
    }
    let forged_trace = AxiomTrace::with_store(Arc::new(forged), &TraceConfig::default()).unwrap();
    match forged_trace.verify() {
        Err(TraceError::Integrity(e)) => {
            assert_eq!(e.frame_id, originals[3].frame_id);
            assert_eq!(e.kind, DivergenceKind::Digest);
            assert_eq!(e.actual, originals[3].frame_hash);
        }
        other => panic!("expected integrity error, got {other:?}"),
    }
}

#[test]
fn concurrent_records_never_fork_a_session() {
    let trace = Arc::new(AxiomTrace::in_memory());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let trace = Arc::clone(&trace);
            thread::spawn(move || {
                let shared = trace.session("shared");
                let own = trace.session(format!("own-{t}"));
                for i in 0..25 {
                    shared
                        .record(json!({"event_type": "log", "content": {"text": format!("{t}:{i}")}}))
                        .unwrap();
                    own.record(json!({"event_type": "log"})).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let shared = trace.session_frames("shared").unwrap();
    assert_eq!(shared.len(), 200);
    let prevs: HashSet<&str> = shared.iter().map(|f| f.prev_hash.as_str()).collect();
    assert_eq!(prevs.len(), shared.len(), "two frames share a prev_hash");
    assert_eq!(trace.verify().unwrap(), 9);
}

#[test]
fn dangling_cause_is_surfaced() {
    // A store written by something other than this core, citing a missing frame.
    let trace = AxiomTrace::in_memory();
    let root = trace.record(json!({"event_type": "log"})).unwrap();
    let mut frames = trace.frames().unwrap();
    let mut orphan = frames[0].clone();
    orphan.frame_id = "orphan".into();
    orphan.caused_by = Some("missing-frame".into());
    frames.push(orphan);

    let store = MemoryFrameStore::new();
    for f in &frames {
        store.append(&f.to_line().unwrap()).unwrap();
    }
    let external = AxiomTrace::with_store(Arc::new(store), &TraceConfig::default()).unwrap();

    match external.get_chain("orphan") {
        Err(TraceError::Graph(GraphError::Dangling(e))) => {
            assert_eq!(e.frame_id, "orphan");
            assert_eq!(e.missing_reference, "missing-frame");
        }
        other => panic!("expected dangling reference, got {other:?}"),
    }
    assert_eq!(external.get_chain(&root).unwrap().len(), 1);
}

#[test]
fn record_action_builds_causal_chains() {
    let trace = AxiomTrace::in_memory();
    let first = trace
        .record_action(ActionInput::new("user_input").input("Hello"))
        .unwrap();
    let second = trace
        .record_action(
            ActionInput::new("thought")
                .reasoning("Processing greeting")
                .caused_by(first.clone()),
        )
        .unwrap();
    let third = trace
        .record_action(
            ActionInput::new("tool_call")
                .output("Created api/users.py")
                .tool_name("write_file")
                .success(true)
                .caused_by(second.clone()),
        )
        .unwrap();

    let chain: Vec<String> = trace
        .get_chain(&third)
        .unwrap()
        .into_iter()
        .map(|f| f.frame_id)
        .collect();
    assert_eq!(chain, vec![first.clone(), second, third]);

    let graph = trace.causality().unwrap();
    assert_eq!(graph.descendants(&first).unwrap().len(), 2);
    assert!(graph.failures().is_empty());
}

#[tokio::test]
async fn async_calls_are_traced() {
    let trace = AxiomTrace::in_memory();
    let rec = trace.session("async");
    let out = trace_call_async(&rec, "fetch", Some(json!({"url": "/users"})), async {
        tokio::task::yield_now().await;
        Ok::<_, String>(10)
    })
    .await;
    assert_eq!(out, Ok(10));

    let frames = trace.session_frames("async").unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].caused_by.as_deref(), Some(frames[0].frame_id.as_str()));
    assert!(frames[1].metadata.contains_key("duration_ms"));
}
