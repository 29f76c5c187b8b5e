//! Explicit call tracing.
//!
//! Wrap a call site to record an entry `tool_call` frame and an exit frame
//! caused by it: `tool_output` on `Ok`, `error` on `Err`. The wrapped
//! result is always returned untouched; recording failures are logged.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use axiom_schema::kinds;
use axiom_types::FrameInput;
use serde_json::Value;

use crate::SessionRecorder;

pub fn trace_call<T, E, F>(
    recorder: &SessionRecorder<'_>,
    name: &str,
    args: Option<Value>,
    f: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let entry = record_entry(recorder, name, args);
    let started = Instant::now();
    let result = f();
    record_exit(recorder, name, entry, started.elapsed(), result.as_ref().err());
    result
}

pub async fn trace_call_async<T, E, Fut>(
    recorder: &SessionRecorder<'_>,
    name: &str,
    args: Option<Value>,
    fut: Fut,
) -> Result<T, E>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    let entry = record_entry(recorder, name, args);
    let started = Instant::now();
    let result = fut.await;
    record_exit(recorder, name, entry, started.elapsed(), result.as_ref().err());
    result
}

fn record_entry(recorder: &SessionRecorder<'_>, name: &str, args: Option<Value>) -> Option<String> {
    let mut input = FrameInput::new(kinds::TOOL_CALL)
        .content("text", format!("call {name}"))
        .metadata("tool_name", name)
        .metadata("traced", true);
    if let Some(args) = args {
        input = input.content("json", args);
    }
    recorder
        .record_input(input)
        .inspect_err(|e| tracing::warn!(call = name, "failed to record call entry: {e}"))
        .ok()
}

fn record_exit<E: Display>(
    recorder: &SessionRecorder<'_>,
    name: &str,
    entry: Option<String>,
    elapsed: Duration,
    err: Option<&E>,
) {
    let input = match err {
        None => FrameInput::new(kinds::TOOL_OUTPUT)
            .content("text", format!("{name} returned"))
            .success(true),
        Some(e) => FrameInput::new(kinds::ERROR)
            .content("text", format!("{name} failed"))
            .content("output", e.to_string())
            .success(false),
    };
    let mut input = input
        .metadata("tool_name", name)
        .metadata("traced", true)
        .metadata("duration_ms", elapsed.as_millis() as u64);
    input.caused_by = entry;

    if let Err(e) = recorder.record_input(input) {
        tracing::warn!(call = name, "failed to record call exit: {e}");
    }
}
