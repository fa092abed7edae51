//! # archive-delta-patch: binary patch generator for ZIP-family archives
//!
//! Generates small, byte-exact patches between two ZIP/JAR/APK archives by
//! inflating their DEFLATE entries before diffing and recompressing them
//! back bit-for-bit on the receiving side, the way a generic bsdiff over the
//! raw compressed bytes never can (a single changed byte in the uncompressed
//! payload can ripple through the whole deflate stream downstream of it).
//!
//! ## Pipeline
//!
//! 1. [`zip_parser`] parses the central directory and local headers of both
//!    archives.
//! 2. [`deflate_oracle`] divines the `(level, strategy, nowrap)` triple that
//!    reproduces each new-side DEFLATE entry's compressed bytes exactly.
//! 3. [`plan`] pairs entries, decides which side(s) to uncompress and which
//!    delta format to use per pair, and applies any configured budget
//!    modifiers.
//! 4. [`blob_builder`] materializes the two delta-friendly blobs (inflated
//!    where the plan calls for it, copied verbatim elsewhere) via
//!    [`temp_blob`]'s spill-to-disk scratch storage.
//! 5. [`delta`] derives per-entry delta records, fills gaps, combines
//!    adjacent bsdiff entries, and computes each delta.
//! 6. [`patch`] writes the wire-format patch (and, for round-trip testing
//!    only, can read one back).
//!
//! [`orchestrator::generate`] drives the whole pipeline behind one call.
//!
//! ## Quick start
//!
//! ```no_run
//! use archive_delta_patch::byte_source::FileByteSource;
//! use archive_delta_patch::cancel::CancellationToken;
//! use archive_delta_patch::options::Options;
//!
//! let old = FileByteSource::open("old.apk")?;
//! let new = FileByteSource::open("new.apk")?;
//! let mut patch_file = std::fs::File::create("patch.bin")?;
//! archive_delta_patch::orchestrator::generate(
//!     &old,
//!     &new,
//!     &mut patch_file,
//!     &Options::default(),
//!     &CancellationToken::new(),
//! )?;
//! # Ok::<(), archive_delta_patch::error::PatchError>(())
//! ```

pub mod blob_builder;
pub mod byte_source;
pub mod cancel;
pub mod deflate_oracle;
pub mod delta;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod patch;
pub mod plan;
pub mod ranges;
pub mod temp_blob;
pub mod zip_parser;

#[cfg(test)]
mod test_support;

pub use byte_source::ByteSource;
pub use cancel::CancellationToken;
pub use error::{PatchError, Result};
pub use options::Options;
pub use orchestrator::generate;
