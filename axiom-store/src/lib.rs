use thiserror::Error;

pub mod jsonl;
pub use jsonl::{read_lines, JsonlFrameStore};

pub mod memory;
pub use memory::MemoryFrameStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame store is closed")]
    Closed,
    #[error("corrupt record at line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

/// Append-only, ordered persistence for serialized frames.
///
/// Implementations keep exact call order and never deduplicate. Once
/// `flush` or `close` returns, every appended frame is durable.
pub trait FrameStore: Send + Sync {
    /// Append one serialized frame.
    fn append(&self, serialized: &str) -> Result<(), StoreError>;

    /// All serialized frames in original append order.
    fn read_all(&self) -> Result<Vec<String>, StoreError>;

    fn flush(&self) -> Result<(), StoreError>;

    /// Flush and refuse further appends.
    fn close(&self) -> Result<(), StoreError>;
}
