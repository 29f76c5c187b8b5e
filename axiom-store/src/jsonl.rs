use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{FrameStore, StoreError};

/// One frame per line in an append-only file.
///
/// Appends go through a buffered writer. With `auto_flush` every append is
/// pushed to the OS immediately; otherwise the buffer drains on `flush`,
/// `close`, `read_all`, or drop.
pub struct JsonlFrameStore {
    path: PathBuf,
    auto_flush: bool,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonlFrameStore {
    pub fn open(path: impl AsRef<Path>, auto_flush: bool) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), auto_flush, "opened frame log");
        Ok(Self {
            path,
            auto_flush,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameStore for JsonlFrameStore {
    fn append(&self, serialized: &str) -> Result<(), StoreError> {
        if serialized.contains('\n') {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "serialized frame spans multiple lines",
            )));
        }
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = guard.as_mut().ok_or(StoreError::Closed)?;
        writeln!(writer, "{serialized}")?;
        if self.auto_flush {
            writer.flush()?;
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, StoreError> {
        // Held across the read so the snapshot never sees a half-written buffer.
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = guard.as_mut() {
            writer.flush()?;
        }
        read_lines(&self.path)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = guard.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }
}

/// Non-empty lines of a frame log. A missing file reads as empty.
pub fn read_lines(path: &Path) -> Result<Vec<String>, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}
