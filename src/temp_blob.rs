//! Scoped scratch storage for the two delta-friendly blobs: in-memory up to
//! a configurable threshold, spilling to a uniquely-named temp file past
//! that (spec.md §5 "Temp blobs").
//!
//! The teacher crate has no equivalent resource — it always writes straight
//! to a caller-provided `File`. This type is new plumbing grounded directly
//! in spec.md's description rather than any one pack file, implemented with
//! `std::env::temp_dir` plus a `Drop` guard rather than a `tempfile`
//! dependency, since `tempfile` stays a dev-only dependency here (matching
//! the teacher's own `[dev-dependencies]` placement of it).

use crate::error::Result;
use crate::ranges::Range;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static SPILL_COUNTER: AtomicU64 = AtomicU64::new(0);

enum Storage {
    Memory(Vec<u8>),
    Spilled { path: PathBuf, file: File, len: u64 },
}

/// A write-once scratch blob. Call [`TempBlob::writer`] to obtain a
/// [`TempBlobWriter`], write sequentially, then call
/// [`TempBlobWriter::finish`]; a second write-stream request while one is
/// open is rejected.
pub struct TempBlob {
    storage: Option<Storage>,
    spill_threshold: u64,
    writing: bool,
}

impl TempBlob {
    pub fn new(spill_threshold: u64) -> Self {
        Self {
            storage: Some(Storage::Memory(Vec::new())),
            spill_threshold,
            writing: false,
        }
    }

    pub fn len(&self) -> u64 {
        match self.storage.as_ref().expect("blob storage missing") {
            Storage::Memory(v) => v.len() as u64,
            Storage::Spilled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a sequential writer over this blob. Fails by panicking if a
    /// writer is already open — callers own the blob exclusively and this
    /// indicates a programmer error, not a recoverable condition.
    pub fn writer(&mut self) -> TempBlobWriter<'_> {
        assert!(!self.writing, "a write-stream is already open on this blob");
        self.writing = true;
        TempBlobWriter { blob: self }
    }

    pub fn read_range(&self, range: Range) -> Result<Vec<u8>> {
        match self.storage.as_ref().expect("blob storage missing") {
            Storage::Memory(v) => {
                let start = range.offset as usize;
                let end = range.end() as usize;
                Ok(v[start..end].to_vec())
            }
            Storage::Spilled { file, .. } => {
                let mut file = file.try_clone()?;
                file.seek(SeekFrom::Start(range.offset))?;
                let mut buf = vec![0u8; range.length as usize];
                file.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }

    pub fn as_byte_source(&self) -> Result<crate::byte_source::MemoryByteSource> {
        match self.storage.as_ref().expect("blob storage missing") {
            Storage::Memory(v) => Ok(crate::byte_source::MemoryByteSource::new(v.clone())),
            Storage::Spilled { .. } => {
                let all = self.read_range(Range::new(0, self.len()))?;
                Ok(crate::byte_source::MemoryByteSource::new(all))
            }
        }
    }
}

impl Drop for TempBlob {
    fn drop(&mut self) {
        if let Some(Storage::Spilled { path, .. }) = self.storage.take() {
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// A sequential writer over a [`TempBlob`]. Spills from memory to a temp
/// file the moment the in-memory buffer would exceed the configured
/// threshold; subsequent writes append to the file.
pub struct TempBlobWriter<'a> {
    blob: &'a mut TempBlob,
}

impl<'a> TempBlobWriter<'a> {
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let storage = self.blob.storage.take().expect("blob storage missing");
        self.blob.storage = Some(match storage {
            Storage::Memory(mut v) => {
                if v.len() as u64 + data.len() as u64 > self.blob.spill_threshold {
                    let path = spill_path();
                    let mut file = OpenOptions::new()
                        .create(true)
                        .read(true)
                        .write(true)
                        .truncate(true)
                        .open(&path)?;
                    file.write_all(&v)?;
                    file.write_all(data)?;
                    let len = v.len() as u64 + data.len() as u64;
                    v.clear();
                    Storage::Spilled { path, file, len }
                } else {
                    v.extend_from_slice(data);
                    Storage::Memory(v)
                }
            }
            Storage::Spilled { path, mut file, len } => {
                file.write_all(data)?;
                Storage::Spilled {
                    path,
                    file,
                    len: len + data.len() as u64,
                }
            }
        });
        Ok(())
    }

    /// Flushes any buffered writer state. [`TempBlob`] has no separate
    /// buffering layer beyond the in-memory `Vec`/`File`, so this mainly
    /// exists to mark the write-stream as closed.
    pub fn finish(self) -> Result<()> {
        if let Some(Storage::Spilled { file, .. }) = self.blob.storage.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

impl<'a> Drop for TempBlobWriter<'a> {
    fn drop(&mut self) {
        self.blob.writing = false;
    }
}

fn spill_path() -> PathBuf {
    let id = SPILL_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "archive-delta-patch-{}-{}.tmp",
        std::process::id(),
        id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_memory_below_threshold() {
        let mut blob = TempBlob::new(1024);
        {
            let mut w = blob.writer();
            w.write_all(b"hello").unwrap();
            w.finish().unwrap();
        }
        assert_eq!(blob.len(), 5);
        assert_eq!(blob.read_range(Range::new(0, 5)).unwrap(), b"hello");
    }

    #[test]
    fn spills_past_threshold() {
        let mut blob = TempBlob::new(4);
        {
            let mut w = blob.writer();
            w.write_all(b"hello world").unwrap();
            w.finish().unwrap();
        }
        assert_eq!(blob.len(), 11);
        assert_eq!(blob.read_range(Range::new(6, 5)).unwrap(), b"world");
    }

    #[test]
    #[should_panic(expected = "already open")]
    fn rejects_second_concurrent_writer() {
        let mut blob = TempBlob::new(1024);
        let _first = blob.writer();
        let _second = blob.writer();
    }
}
