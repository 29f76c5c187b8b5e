//! Cause→effect view over committed frames.
//!
//! Frames are indexed in store order. A `caused_by` edge may only point at a
//! frame committed earlier, which keeps the graph acyclic without any
//! run-time cycle detection; a reference to anything else is dangling.

use std::collections::{HashMap, HashSet, VecDeque};

use axiom_types::Frame;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("frame {frame_id} is caused by {missing_reference}, which is not in the store")]
pub struct DanglingReferenceError {
    pub frame_id: String,
    pub missing_reference: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown frame {0}")]
    UnknownFrame(String),
    #[error(transparent)]
    Dangling(#[from] DanglingReferenceError),
}

pub struct CausalityGraph {
    frames: Vec<Frame>,
    index: HashMap<String, usize>,
    effects: HashMap<usize, Vec<usize>>,
}

impl CausalityGraph {
    /// Build over frames in store (commit) order.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        let mut index = HashMap::with_capacity(frames.len());
        for (pos, frame) in frames.iter().enumerate() {
            index.entry(frame.frame_id.clone()).or_insert(pos);
        }

        let mut effects: HashMap<usize, Vec<usize>> = HashMap::new();
        for (pos, frame) in frames.iter().enumerate() {
            let Some(cause) = frame.caused_by.as_deref() else { continue };
            if let Some(&cause_pos) = index.get(cause) {
                if cause_pos < pos {
                    effects.entry(cause_pos).or_default().push(pos);
                }
            }
        }

        Self {
            frames,
            index,
            effects,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame_id: &str) -> Option<&Frame> {
        self.index.get(frame_id).map(|&pos| &self.frames[pos])
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Frames from root cause to `frame_id`, following `caused_by` backward.
    pub fn get_chain(&self, frame_id: &str) -> Result<Vec<&Frame>, GraphError> {
        let mut pos = self.position(frame_id)?;
        let mut chain = vec![&self.frames[pos]];
        while let Some(cause) = self.frames[pos].caused_by.as_deref() {
            let cause_pos = match self.index.get(cause) {
                Some(&p) if p < pos => p,
                _ => {
                    return Err(DanglingReferenceError {
                        frame_id: self.frames[pos].frame_id.clone(),
                        missing_reference: cause.to_string(),
                    }
                    .into())
                }
            };
            chain.push(&self.frames[cause_pos]);
            pos = cause_pos;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Direct effects of `frame_id`, in commit order.
    pub fn effects_of(&self, frame_id: &str) -> Result<Vec<&Frame>, GraphError> {
        let pos = self.position(frame_id)?;
        Ok(self
            .effects
            .get(&pos)
            .map(|children| children.iter().map(|&c| &self.frames[c]).collect())
            .unwrap_or_default())
    }

    /// Every frame transitively caused by `frame_id`, in commit order.
    pub fn descendants(&self, frame_id: &str) -> Result<Vec<&Frame>, GraphError> {
        let start = self.position(frame_id)?;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(pos) = queue.pop_front() {
            for &child in self.effects.get(&pos).into_iter().flatten() {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        let mut found: Vec<usize> = seen.into_iter().collect();
        found.sort_unstable();
        Ok(found.into_iter().map(|p| &self.frames[p]).collect())
    }

    /// Frames with no recorded cause.
    pub fn roots(&self) -> Vec<&Frame> {
        self.frames.iter().filter(|f| f.caused_by.is_none()).collect()
    }

    /// Frames explicitly marked as failed.
    pub fn failures(&self) -> Vec<&Frame> {
        self.frames
            .iter()
            .filter(|f| f.success == Some(false))
            .collect()
    }

    /// One session's frames in commit order.
    pub fn session(&self, session_id: &str) -> Vec<&Frame> {
        self.frames
            .iter()
            .filter(|f| f.session_id == session_id)
            .collect()
    }

    fn position(&self, frame_id: &str) -> Result<usize, GraphError> {
        self.index
            .get(frame_id)
            .copied()
            .ok_or_else(|| GraphError::UnknownFrame(frame_id.to_string()))
    }
}
