//! Patch wire format reader and a test-only applier.
//!
//! Grounded on `other_examples/…zbsdiff.rs`'s `ZBSDiffHeader::read` /
//! `apply_patch`, generalised to spec.md §6's variable-length plan lists.
//! This is *not* a general-purpose applier runtime — no streaming, no
//! progress reporting, no Android service plumbing — it exists only so the
//! round-trip property (spec.md §8 item 4) can be exercised in-crate (see
//! DESIGN.md and SPEC_FULL.md §9).

use crate::byte_source::{ByteSource, MemoryByteSource};
use crate::deflate_oracle::{self, DeflateParameters};
use crate::delta::{bsdiff, DeltaEntry};
use crate::error::{PatchError, Result};
use crate::plan::DeltaFormat;
use crate::ranges::{Range, TypedRange};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

pub struct ParsedPatch {
    pub old_delta_friendly_size: u64,
    pub old_uncompression_plan: Vec<Range>,
    pub new_recompression_plan: Vec<TypedRange<DeflateParameters>>,
    pub deltas: Vec<(DeltaEntry, Vec<u8>)>,
}

pub fn read_patch(bytes: &[u8]) -> Result<ParsedPatch> {
    let mut cur = std::io::Cursor::new(bytes);
    let mut magic = [0u8; 8];
    cur.read_exact(&mut magic)?;
    if &magic != super::writer::MAGIC {
        return Err(PatchError::CorruptArchive(
            "bad patch magic".to_string(),
        ));
    }
    let _flags = cur.read_u32::<BigEndian>()?;
    let old_delta_friendly_size = cur.read_u64::<BigEndian>()?;

    let old_n = cur.read_u32::<BigEndian>()?;
    let mut old_uncompression_plan = Vec::with_capacity(old_n as usize);
    for _ in 0..old_n {
        let offset = cur.read_u64::<BigEndian>()?;
        let length = cur.read_u64::<BigEndian>()?;
        old_uncompression_plan.push(Range::new(offset, length));
    }

    let new_n = cur.read_u32::<BigEndian>()?;
    let mut new_recompression_plan = Vec::with_capacity(new_n as usize);
    for _ in 0..new_n {
        let offset = cur.read_u64::<BigEndian>()?;
        let length = cur.read_u64::<BigEndian>()?;
        let _codec = cur.read_u8()?;
        let level = cur.read_u8()?;
        let strategy = cur.read_u8()?;
        let nowrap = cur.read_u8()? != 0;
        new_recompression_plan.push(TypedRange::new(
            Range::new(offset, length),
            DeflateParameters::new(level, strategy, nowrap),
        ));
    }

    let delta_n = cur.read_u32::<BigEndian>()?;
    let mut deltas = Vec::with_capacity(delta_n as usize);
    for _ in 0..delta_n {
        let format = match cur.read_u8()? {
            0 => DeltaFormat::Bsdiff,
            1 => DeltaFormat::FileByFile,
            other => {
                return Err(PatchError::CorruptArchive(format!(
                    "unknown delta format code {other}"
                )))
            }
        };
        let old_offset = cur.read_u64::<BigEndian>()?;
        let old_length = cur.read_u64::<BigEndian>()?;
        let new_offset = cur.read_u64::<BigEndian>()?;
        let new_length = cur.read_u64::<BigEndian>()?;
        let delta_len = cur.read_u64::<BigEndian>()? as usize;
        let mut delta_bytes = vec![0u8; delta_len];
        cur.read_exact(&mut delta_bytes)?;
        deltas.push((
            DeltaEntry {
                format,
                old_range: Range::new(old_offset, old_length),
                new_range: Range::new(new_offset, new_length),
            },
            delta_bytes,
        ));
    }

    Ok(ParsedPatch {
        old_delta_friendly_size,
        old_uncompression_plan,
        new_recompression_plan,
        deltas,
    })
}

/// Reconstructs the original new archive bytes from `old` and a parsed
/// patch: rebuilds the delta-friendly old blob, applies each delta in order
/// to rebuild the delta-friendly new blob, then recompresses per the
/// recompression plan.
pub fn apply_patch(old: &[u8], patch_bytes: &[u8]) -> Result<Vec<u8>> {
    let patch = read_patch(patch_bytes)?;
    let old_source = MemoryByteSource::new(old.to_vec());
    let delta_friendly_old = crate::blob_builder::build_delta_friendly_old(
        &old_source,
        &patch.old_uncompression_plan,
        crate::options::DEFAULT_TEMP_SPILL_THRESHOLD_BYTES,
    )?;

    let new_df_len = patch
        .deltas
        .iter()
        .map(|(e, _)| e.new_range.end())
        .max()
        .unwrap_or(0);
    let mut delta_friendly_new = vec![0u8; new_df_len as usize];
    for (entry, delta_bytes) in &patch.deltas {
        let old_slice = delta_friendly_old.read_range(entry.old_range)?;
        let reconstructed = match entry.format {
            DeltaFormat::Bsdiff => {
                bsdiff::apply_delta(&old_slice, delta_bytes, entry.new_range.length as usize)?
            }
            DeltaFormat::FileByFile => apply_patch(&old_slice, delta_bytes)?,
        };
        let start = entry.new_range.offset as usize;
        delta_friendly_new[start..start + reconstructed.len()].copy_from_slice(&reconstructed);
    }

    Ok(recompress_new_archive(
        &delta_friendly_new,
        &patch.new_recompression_plan,
    ))
}

fn recompress_new_archive(
    delta_friendly_new: &[u8],
    recompression_plan: &[TypedRange<DeflateParameters>],
) -> Vec<u8> {
    let mut output = Vec::with_capacity(delta_friendly_new.len());
    let mut cursor = 0usize;
    for typed in recompression_plan {
        let start = typed.offset() as usize;
        output.extend_from_slice(&delta_friendly_new[cursor..start]);
        let inflated = &delta_friendly_new[start..start + typed.length() as usize];
        output.extend_from_slice(&deflate_oracle::recompress(inflated, typed.metadata));
        cursor = start + typed.length() as usize;
    }
    output.extend_from_slice(&delta_friendly_new[cursor..]);
    output
}
