//! Materialises the two delta-friendly blobs from an uncompression plan
//! (spec.md §4.4): copies the bytes outside the plan's ranges verbatim and
//! inflates the bytes inside them, streaming through a bounded buffer the
//! way `reader.rs`'s `DeflateDecoder` consumer and `writer.rs`'s
//! chunked-write loop do in the teacher crate.

use crate::byte_source::ByteSource;
use crate::deflate_oracle::DeflateParameters;
use crate::error::Result;
use crate::ranges::{Range, TypedRange};
use crate::temp_blob::TempBlob;
use flate2::read::DeflateDecoder;
use std::io::Read;

const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// Builds the delta-friendly old blob: every range in `plan` is inflated,
/// everything else is copied through unchanged. The old side needs no
/// recompression plan of its own — it is discarded once the diff against the
/// delta-friendly new blob has been computed.
pub fn build_delta_friendly_old(
    old_source: &dyn ByteSource,
    plan: &[Range],
    spill_threshold: u64,
) -> Result<TempBlob> {
    let mut blob = TempBlob::new(spill_threshold);
    {
        let mut writer = blob.writer();
        let mut cursor = 0u64;
        for range in plan {
            copy_through(old_source, cursor, range.offset, &mut writer)?;
            inflate_through(old_source, *range, &mut writer)?;
            cursor = range.end();
        }
        copy_through(old_source, cursor, old_source.len(), &mut writer)?;
        writer.finish()?;
    }
    Ok(blob)
}

/// Builds the delta-friendly new blob the same way, additionally recording
/// where each inflated range landed in the *output* blob together with the
/// deflate parameters needed to recompress it back — this becomes the
/// delta-friendly new file recompression plan spec.md §6 stores in the
/// patch.
pub fn build_delta_friendly_new(
    new_source: &dyn ByteSource,
    plan: &[TypedRange<DeflateParameters>],
    spill_threshold: u64,
) -> Result<(TempBlob, Vec<TypedRange<DeflateParameters>>)> {
    let mut blob = TempBlob::new(spill_threshold);
    let mut recompression_plan = Vec::with_capacity(plan.len());
    {
        let mut writer = blob.writer();
        let mut cursor = 0u64;
        for typed_range in plan {
            copy_through(new_source, cursor, typed_range.offset(), &mut writer)?;

            let output_offset = blob_len_so_far(&recompression_plan, cursor, typed_range.offset());
            let inflated_len =
                inflate_through(new_source, typed_range.range, &mut writer)?;
            recompression_plan.push(TypedRange::new(
                Range::new(output_offset, inflated_len),
                typed_range.metadata,
            ));
            cursor = typed_range.range.end();
        }
        copy_through(new_source, cursor, new_source.len(), &mut writer)?;
        writer.finish()?;
    }
    Ok((blob, recompression_plan))
}

/// The output-blob offset at which the next inflated range begins: the sum
/// of every byte already written (copies plus prior inflations). Recomputed
/// from the running recompression plan plus the copy gap just emitted,
/// rather than tracked as separate mutable state, since the plan already
/// holds everything needed to derive it.
fn blob_len_so_far(
    recompression_plan: &[TypedRange<DeflateParameters>],
    prev_source_cursor: u64,
    next_source_offset: u64,
) -> u64 {
    let written_before_gap = recompression_plan
        .last()
        .map(|r| r.range.end())
        .unwrap_or(0);
    written_before_gap + (next_source_offset - prev_source_cursor)
}

fn copy_through(
    source: &dyn ByteSource,
    from: u64,
    to: u64,
    writer: &mut crate::temp_blob::TempBlobWriter<'_>,
) -> Result<()> {
    if to <= from {
        return Ok(());
    }
    let mut reader = source.open_range(Range::new(from, to - from))?;
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
    }
    Ok(())
}

/// Inflates `range` from `source` into `writer`, returning the number of
/// inflated bytes written.
fn inflate_through(
    source: &dyn ByteSource,
    range: Range,
    writer: &mut crate::temp_blob::TempBlobWriter<'_>,
) -> Result<u64> {
    let compressed = source.read_range(range)?;
    let mut decoder = DeflateDecoder::new(&compressed[..]);
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    let mut total = 0u64;
    loop {
        let n = decoder.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}
