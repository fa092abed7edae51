//! Patch wire format writer (spec.md §6): fixed magic, big-endian 64-bit
//! offsets/lengths throughout, no padding. Grounded on
//! `other_examples/…zbsdiff.rs`'s `ZBSDiffHeader::write`
//! (`byteorder::WriteBytesExt`, big-endian header), generalised from a
//! fixed-field header to spec.md's variable-length plan/delta lists.

use crate::deflate_oracle::DeflateParameters;
use crate::delta::DeltaEntry;
use crate::error::Result;
use crate::plan::DeltaFormat;
use crate::ranges::{Range, TypedRange};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

pub const MAGIC: &[u8; 8] = b"GFbFv1_0";

fn format_code(format: DeltaFormat) -> u8 {
    match format {
        DeltaFormat::Bsdiff => 0,
        DeltaFormat::FileByFile => 1,
    }
}

/// Writes one complete patch in one sequential, single pass.
pub fn write_patch<W: Write>(
    out: &mut W,
    old_delta_friendly_size: u64,
    old_uncompression_plan: &[Range],
    new_recompression_plan: &[TypedRange<DeflateParameters>],
    deltas: &[(DeltaEntry, Vec<u8>)],
) -> Result<()> {
    out.write_all(MAGIC)?;
    out.write_u32::<BigEndian>(0)?; // flags: reserved

    out.write_u64::<BigEndian>(old_delta_friendly_size)?;

    out.write_u32::<BigEndian>(old_uncompression_plan.len() as u32)?;
    for range in old_uncompression_plan {
        out.write_u64::<BigEndian>(range.offset)?;
        out.write_u64::<BigEndian>(range.length)?;
    }

    out.write_u32::<BigEndian>(new_recompression_plan.len() as u32)?;
    for typed in new_recompression_plan {
        out.write_u64::<BigEndian>(typed.offset())?;
        out.write_u64::<BigEndian>(typed.length())?;
        out.write_u8(0)?; // codec: 0 = default deflate
        out.write_u8(typed.metadata.level)?;
        out.write_u8(typed.metadata.strategy)?;
        out.write_u8(typed.metadata.nowrap as u8)?;
    }

    out.write_u32::<BigEndian>(deltas.len() as u32)?;
    for (entry, delta_bytes) in deltas {
        out.write_u8(format_code(entry.format))?;
        out.write_u64::<BigEndian>(entry.old_range.offset)?;
        out.write_u64::<BigEndian>(entry.old_range.length)?;
        out.write_u64::<BigEndian>(entry.new_range.offset)?;
        out.write_u64::<BigEndian>(entry.new_range.length)?;
        out.write_u64::<BigEndian>(delta_bytes.len() as u64)?;
        out.write_all(delta_bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_magic_and_empty_plans() {
        let mut buf = Vec::new();
        write_patch(&mut buf, 0, &[], &[], &[]).unwrap();
        assert_eq!(&buf[0..8], MAGIC);
        assert_eq!(&buf[8..12], &[0, 0, 0, 0]); // flags
    }
}
