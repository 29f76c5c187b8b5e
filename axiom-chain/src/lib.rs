//! Per-session hash chain over frames.
//!
//! `frame_hash` is SHA-256 over the canonical form of every other field:
//! compact JSON, object keys sorted by byte order at every depth, optional
//! fields present only when set. Anyone holding the stored frames can
//! recompute it without this crate.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axiom_types::{Actor, Frame};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DivergenceKind {
    /// `prev_hash` does not match the prior frame's `frame_hash`.
    Linkage,
    /// Stored `frame_hash` does not match the recomputed digest.
    Digest,
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceKind::Linkage => f.write_str("prev_hash"),
            DivergenceKind::Digest => f.write_str("frame_hash"),
        }
    }
}

/// First point of divergence. Everything from `frame_id` onwards is untrusted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("chain diverges at frame {frame_id}: {kind} expected {expected:?}, found {actual:?}")]
pub struct ChainIntegrityError {
    pub frame_id: String,
    pub expected: String,
    pub actual: String,
    pub kind: DivergenceKind,
}

/// Canonical JSON value of a frame, `frame_hash` excluded.
pub fn canonical_value(frame: &Frame) -> Value {
    let mut m = Map::new();
    m.insert("frame_id".into(), Value::String(frame.frame_id.clone()));
    m.insert("session_id".into(), Value::String(frame.session_id.clone()));
    m.insert("timestamp".into(), Value::String(frame.timestamp.clone()));
    m.insert("event_type".into(), Value::String(frame.event_type.clone()));
    m.insert("actor".into(), actor_value(&frame.actor));
    m.insert("content".into(), Value::Object(frame.content.clone()));
    m.insert("metadata".into(), Value::Object(frame.metadata.clone()));
    m.insert("vector_key".into(), Value::String(frame.vector_key.clone()));
    m.insert("prev_hash".into(), Value::String(frame.prev_hash.clone()));
    if let Some(success) = frame.success {
        m.insert("success".into(), Value::Bool(success));
    }
    if let Some(cause) = &frame.caused_by {
        m.insert("caused_by".into(), Value::String(cause.clone()));
    }
    if let Some(artifacts) = &frame.artifacts {
        m.insert(
            "artifacts".into(),
            Value::Array(artifacts.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(m)
}

fn actor_value(actor: &Actor) -> Value {
    let mut m = Map::new();
    m.insert("type".into(), Value::String(actor.kind.as_str().into()));
    m.insert("id".into(), Value::String(actor.id.clone()));
    Value::Object(m)
}

/// Canonical byte serialization hashed into `frame_hash`.
pub fn canonical_bytes(frame: &Frame) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(&canonical_value(frame), &mut out);
    out.into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Lowercase hex SHA-256 of [`canonical_bytes`].
pub fn compute_frame_hash(frame: &Frame) -> String {
    let mut h = Sha256::new();
    h.update(canonical_bytes(frame));
    hex::encode(h.finalize())
}

/// Verify one session's frames in commit order.
pub fn verify_chain(frames: &[Frame]) -> Result<(), ChainIntegrityError> {
    match first_divergence(frames) {
        Some((_, err)) => Err(err),
        None => Ok(()),
    }
}

/// Offset within `frames` and details of the first broken link or digest.
fn first_divergence<'a>(
    frames: impl IntoIterator<Item = &'a Frame>,
) -> Option<(usize, ChainIntegrityError)> {
    let mut prev = String::new();
    for (i, frame) in frames.into_iter().enumerate() {
        if frame.prev_hash != prev {
            return Some((
                i,
                ChainIntegrityError {
                    frame_id: frame.frame_id.clone(),
                    expected: prev,
                    actual: frame.prev_hash.clone(),
                    kind: DivergenceKind::Linkage,
                },
            ));
        }
        let expected = compute_frame_hash(frame);
        if frame.frame_hash != expected {
            return Some((
                i,
                ChainIntegrityError {
                    frame_id: frame.frame_id.clone(),
                    expected,
                    actual: frame.frame_hash.clone(),
                    kind: DivergenceKind::Digest,
                },
            ));
        }
        prev = frame.frame_hash.clone();
    }
    None
}

/// Split an interleaved store into per-session sequences, keeping order.
pub fn group_by_session(frames: &[Frame]) -> Vec<(String, Vec<Frame>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Frame>)> = Vec::new();
    for frame in frames {
        let slot = *index.entry(frame.session_id.as_str()).or_insert_with(|| {
            groups.push((frame.session_id.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(frame.clone());
    }
    groups
}

/// Verify every session found in `frames`. Returns the number of sessions checked.
///
/// When several sessions diverge, the error names the divergence earliest in
/// store order. A frame moved into another session by an edited `session_id`
/// fails its own digest there, so it is reported rather than the frame that
/// follows it in the session it left.
pub fn verify_sessions(frames: &[Frame]) -> Result<usize, ChainIntegrityError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (pos, frame) in frames.iter().enumerate() {
        let slot = *index.entry(frame.session_id.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(pos);
    }

    let mut earliest: Option<(usize, ChainIntegrityError)> = None;
    for positions in &groups {
        let Some((offset, err)) = first_divergence(positions.iter().map(|&p| &frames[p])) else {
            continue;
        };
        let pos = positions[offset];
        if earliest.as_ref().map_or(true, |(seen, _)| pos < *seen) {
            earliest = Some((pos, err));
        }
    }

    match earliest {
        None => Ok(groups.len()),
        Some((pos, err)) => {
            tracing::warn!(
                session_id = %frames[pos].session_id,
                frame_id = %err.frame_id,
                kind = %err.kind,
                "hash chain diverged"
            );
            Err(err)
        }
    }
}

/// Last committed `frame_hash` per session.
///
/// Each session has its own lock; commits to different sessions never
/// contend beyond the brief map lookup.
#[derive(Default)]
pub struct ChainHeads {
    sessions: Mutex<HashMap<String, Arc<Mutex<String>>>>,
}

impl ChainHeads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild heads from frames already in a store.
    pub fn resume<'a>(frames: impl IntoIterator<Item = &'a Frame>) -> Self {
        let mut sessions: HashMap<String, Arc<Mutex<String>>> = HashMap::new();
        for frame in frames {
            sessions.insert(
                frame.session_id.clone(),
                Arc::new(Mutex::new(frame.frame_hash.clone())),
            );
        }
        Self {
            sessions: Mutex::new(sessions),
        }
    }

    /// Current head, or `None` if the session has no committed frame.
    pub fn head(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = sessions.get(session_id)?;
        let head = slot.lock().unwrap_or_else(PoisonError::into_inner);
        (!head.is_empty()).then(|| head.clone())
    }

    /// Attach linkage to `frame` and run `persist` inside the session's
    /// critical section. The head advances only if `persist` succeeds.
    pub fn commit<F, E>(&self, mut frame: Frame, persist: F) -> Result<Frame, E>
    where
        F: FnOnce(&Frame) -> Result<(), E>,
    {
        let slot = self.slot(&frame.session_id);
        // The head is written only after persist returns Ok, so a poisoned
        // slot still holds the last committed hash.
        let mut head = slot.lock().unwrap_or_else(PoisonError::into_inner);
        frame.prev_hash = head.clone();
        frame.frame_hash = compute_frame_hash(&frame);
        persist(&frame)?;
        *head = frame.frame_hash.clone();
        Ok(frame)
    }

    fn slot(&self, session_id: &str) -> Arc<Mutex<String>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }
}
