//! Error types for the patch generator

use std::io;

/// Result type for patch generation operations
pub type Result<T> = std::result::Result<T, PatchError>;

/// Error types that can occur while generating a patch
#[derive(Debug)]
pub enum PatchError {
    /// The archive is malformed (bad signature, truncated header, inconsistent sizes)
    CorruptArchive(String),
    /// The archive uses a feature this generator does not support (ZIP64, multi-disk, encryption)
    UnsupportedArchive(String),
    /// I/O error reading a byte source or writing the patch
    Io(io::Error),
    /// Cancellation was observed at a suspension point
    Interrupted,
    /// An internal invariant was violated (overlapping or misordered plan ranges)
    InvariantViolation(String),
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchError::CorruptArchive(msg) => write!(f, "corrupt archive: {}", msg),
            PatchError::UnsupportedArchive(msg) => write!(f, "unsupported archive: {}", msg),
            PatchError::Io(e) => write!(f, "I/O error: {}", e),
            PatchError::Interrupted => write!(f, "operation interrupted"),
            PatchError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for PatchError {}

impl From<io::Error> for PatchError {
    fn from(err: io::Error) -> Self {
        PatchError::Io(err)
    }
}
