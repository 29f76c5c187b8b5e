use std::sync::{Mutex, PoisonError};

use crate::{FrameStore, StoreError};

/// In-memory frame store.
///
/// NOTE: Not durable. Useful for tests and short-lived agents that only need
/// retrospection within one process.
#[derive(Default)]
pub struct MemoryFrameStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    lines: Vec<String>,
    closed: bool,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameStore for MemoryFrameStore {
    fn append(&self, serialized: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.lines.push(serialized.to_string());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.lines.clone())
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_duplicates() {
        let store = MemoryFrameStore::new();
        for line in ["a", "b", "a"] {
            store.append(line).unwrap();
        }
        assert_eq!(store.read_all().unwrap(), vec!["a", "b", "a"]);
        store.close().unwrap();
        assert!(matches!(store.append("c"), Err(StoreError::Closed)));
        assert_eq!(store.len(), 3);
    }
}
