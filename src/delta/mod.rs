//! Computes the binary delta for each [`DeltaEntry`] (spec.md §4.5).

pub mod bsdiff;
pub mod entries;

pub use entries::{combine_entries, derive_delta_entries, fill_gaps, project_payload_ranges, DeltaEntry, whole_blob_entry};

use crate::byte_source::MemoryByteSource;
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::options::Options;
use crate::plan::DeltaFormat;

/// One entry's format plus the bytes it diffs against, ready to serialize.
pub struct ComputedDelta {
    pub format: DeltaFormat,
    pub old_range_len: u64,
    pub new_range_len: u64,
    pub bytes: Vec<u8>,
}

/// Computes the delta bytes for one [`DeltaEntry`]'s slice of the two
/// delta-friendly blobs. `BSDIFF` diffs the raw bytes directly; `FILE_BY_FILE`
/// recurses into [`crate::orchestrator::generate`] with a bsdiff-only,
/// one-level-deeper option set (spec.md §4.5, §9).
pub fn compute(
    entry: &DeltaEntry,
    old_slice: &[u8],
    new_slice: &[u8],
    opts: &Options,
    cancel: &CancellationToken,
) -> Result<ComputedDelta> {
    cancel.check()?;
    let bytes = match entry.format {
        DeltaFormat::Bsdiff => bsdiff::compute_delta(old_slice, new_slice)?,
        DeltaFormat::FileByFile => {
            let old_source = MemoryByteSource::new(old_slice.to_vec());
            let new_source = MemoryByteSource::new(new_slice.to_vec());
            let nested_opts = opts.restricted_for_nested_generate();
            let mut nested_patch = Vec::new();
            crate::orchestrator::generate(
                &old_source,
                &new_source,
                &mut nested_patch,
                &nested_opts,
                cancel,
            )?;
            nested_patch
        }
    };
    Ok(ComputedDelta {
        format: entry.format,
        old_range_len: old_slice.len() as u64,
        new_range_len: new_slice.len() as u64,
        bytes,
    })
}
