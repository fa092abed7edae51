//! Read-only byte source over a file or an in-memory blob.
//!
//! All other components read exclusively through [`ByteSource`]; no module
//! other than test fixtures and the orchestrator's setup opens a `File`
//! directly, mirroring the random-access `BufReader<File>` idiom used
//! throughout the teacher crate's reader.

use crate::error::Result;
use crate::ranges::Range;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// A read-only, seekable view over archive bytes.
pub trait ByteSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `range.length` bytes starting at `range.offset`.
    fn read_range(&self, range: Range) -> Result<Vec<u8>>;

    /// Opens a bounded, sequential reader over `range`, for streaming
    /// transforms (inflate) that should not slurp the whole range up front.
    fn open_range(&self, range: Range) -> Result<Box<dyn Read + '_>>;
}

/// A file-backed byte source. Reads are buffered and serialized behind a
/// mutex since a single `File` handle has one seek cursor; callers needing
/// concurrent access should open multiple `FileByteSource`s.
pub struct FileByteSource {
    file: Mutex<BufReader<File>>,
    len: u64,
}

impl FileByteSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(BufReader::new(file)),
            len,
        })
    }
}

impl ByteSource for FileByteSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, range: Range) -> Result<Vec<u8>> {
        let mut guard = self.file.lock().expect("byte source mutex poisoned");
        guard.seek(SeekFrom::Start(range.offset))?;
        let mut buf = vec![0u8; range.length as usize];
        guard.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn open_range(&self, range: Range) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(BoundedFileReader {
            source: self,
            pos: range.offset,
            end: range.end(),
        }))
    }
}

struct BoundedFileReader<'a> {
    source: &'a FileByteSource,
    pos: u64,
    end: u64,
}

impl<'a> Read for BoundedFileReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.end.saturating_sub(self.pos);
        if remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let mut guard = self
            .source
            .file
            .lock()
            .map_err(|_| io::Error::other("byte source mutex poisoned"))?;
        guard.seek(SeekFrom::Start(self.pos))?;
        let n = guard.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// An in-memory byte source, used for small archives and for scratch blobs
/// held entirely in RAM below the spill threshold (see [`crate::temp_blob`]).
pub struct MemoryByteSource {
    data: Vec<u8>,
}

impl MemoryByteSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for MemoryByteSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, range: Range) -> Result<Vec<u8>> {
        let start = range.offset as usize;
        let end = range.end() as usize;
        Ok(self.data[start..end].to_vec())
    }

    fn open_range(&self, range: Range) -> Result<Box<dyn Read + '_>> {
        let start = range.offset as usize;
        let end = range.end() as usize;
        Ok(Box::new(&self.data[start..end]))
    }
}
