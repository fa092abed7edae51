//! Suffix-array bsdiff-flavoured binary delta (spec.md §4.5 "Delta format").
//!
//! Control/diff/extra block model grounded on
//! `other_examples/…zbsdiff.rs`'s `apply_patch_blocks`/`create_patch`, with
//! two differences from that reference: the control stream is matched
//! against a real suffix array (that reference's `create_patch` is an
//! explicit placeholder — "a full implementation would include suffix array
//! construction") with the minimum 16-byte match length spec.md requires,
//! and each block is compressed with a plain `flate2` deflate stream rather
//! than the reference's hand-rolled 2-byte zlib-header-skip framing, since
//! this delta format only needs to round-trip within this crate, not match
//! an external bsdiff tool byte-for-byte (see DESIGN.md).

use crate::error::{PatchError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Cursor, Read, Write};

/// Matches shorter than this are not worth the control-record overhead and
/// are folded into the surrounding extra run (spec.md §4.5).
const MIN_MATCH_LEN: usize = 16;

struct Segment {
    old_start: usize,
    new_start: usize,
    diff_len: usize,
    extra: Vec<u8>,
}

fn build_suffix_array(data: &[u8]) -> Vec<u32> {
    let mut sa: Vec<u32> = (0..data.len() as u32).collect();
    sa.sort_by(|&a, &b| data[a as usize..].cmp(&data[b as usize..]));
    sa
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Finds the longest prefix of `new[new_pos..]` occurring anywhere in `old`,
/// via binary search over `sa`. Simple O(n log n)-per-query sorted-suffix
/// search rather than an LCP-accelerated suffix array — adequate for the
/// archive sizes this generator handles.
fn longest_match(sa: &[u32], old: &[u8], new: &[u8], new_pos: usize) -> (usize, usize) {
    if old.is_empty() || new_pos >= new.len() {
        return (0, 0);
    }
    let query = &new[new_pos..];
    let mut lo = 0usize;
    let mut hi = sa.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        let suffix = &old[sa[mid] as usize..];
        if suffix < query {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    let mut best_len = 0usize;
    let mut best_start = 0usize;
    for candidate in [lo.checked_sub(1), Some(lo)].into_iter().flatten() {
        if candidate < sa.len() {
            let start = sa[candidate] as usize;
            let len = common_prefix_len(&old[start..], query);
            if len > best_len {
                best_len = len;
                best_start = start;
            }
        }
    }
    (best_start, best_len)
}

fn build_segments(old: &[u8], new: &[u8], sa: &[u32]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut new_pos = 0usize;
    while new_pos < new.len() {
        let (match_start, match_len) = longest_match(sa, old, new, new_pos);
        let diff_len = if match_len >= MIN_MATCH_LEN { match_len } else { 0 };
        let old_start = if diff_len > 0 { match_start } else { 0 };

        let mut extra_end = new_pos + diff_len;
        while extra_end < new.len() {
            let (_, next_len) = longest_match(sa, old, new, extra_end);
            if next_len >= MIN_MATCH_LEN {
                break;
            }
            extra_end += 1;
        }

        segments.push(Segment {
            old_start,
            new_start: new_pos,
            diff_len,
            extra: new[new_pos + diff_len..extra_end].to_vec(),
        });
        new_pos = extra_end;
    }
    segments
}

/// Computes a bsdiff-flavoured delta transforming `old` into `new`,
/// returning the serialized, self-contained delta bytes.
pub fn compute_delta(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let sa = build_suffix_array(old);
    let segments = build_segments(old, new, &sa);

    let mut control = Vec::new();
    let mut diff_bytes = Vec::new();
    let mut extra_bytes = Vec::new();
    let mut cursor = 0i64;

    for seg in &segments {
        if seg.diff_len > 0 && seg.old_start as i64 != cursor {
            control.push((0i64, 0i64, seg.old_start as i64 - cursor));
            cursor = seg.old_start as i64;
        }
        for k in 0..seg.diff_len {
            diff_bytes.push(new[seg.new_start + k].wrapping_sub(old[seg.old_start + k]));
        }
        cursor += seg.diff_len as i64;
        extra_bytes.extend_from_slice(&seg.extra);
        control.push((seg.diff_len as i64, seg.extra.len() as i64, 0));
    }

    write_delta(&control, &diff_bytes, &extra_bytes)
}

/// Reconstructs `new` from `old` and a delta produced by [`compute_delta`].
/// Kept for round-trip tests and the in-crate patch reader — not a general
/// applier (see DESIGN.md).
pub fn apply_delta(old: &[u8], delta: &[u8], output_len: usize) -> Result<Vec<u8>> {
    let (control, diff_bytes, extra_bytes) = read_delta(delta)?;
    let mut output = Vec::with_capacity(output_len);
    let mut diff_cursor = Cursor::new(&diff_bytes[..]);
    let mut extra_cursor = Cursor::new(&extra_bytes[..]);
    let mut old_pos = 0i64;

    for (diff_len, extra_len, seek) in control {
        for _ in 0..diff_len {
            let d = diff_cursor.read_u8()?;
            let old_byte = if old_pos >= 0 && (old_pos as usize) < old.len() {
                old[old_pos as usize]
            } else {
                0
            };
            output.push(old_byte.wrapping_add(d));
            old_pos += 1;
        }
        let mut extra_chunk = vec![0u8; extra_len as usize];
        extra_cursor.read_exact(&mut extra_chunk)?;
        output.extend_from_slice(&extra_chunk);
        old_pos += seek;
    }

    if output.len() != output_len {
        return Err(PatchError::InvariantViolation(format!(
            "bsdiff apply produced {} bytes, expected {output_len}",
            output.len()
        )));
    }
    Ok(output)
}

fn write_delta(control: &[(i64, i64, i64)], diff_bytes: &[u8], extra_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut control_raw = Vec::with_capacity(control.len() * 24);
    for &(d, e, s) in control {
        control_raw.write_i64::<BigEndian>(d)?;
        control_raw.write_i64::<BigEndian>(e)?;
        control_raw.write_i64::<BigEndian>(s)?;
    }

    let control_compressed = deflate_block(&control_raw)?;
    let diff_compressed = deflate_block(diff_bytes)?;
    let extra_compressed = deflate_block(extra_bytes)?;

    let mut out = Vec::new();
    out.write_u64::<BigEndian>(control_compressed.len() as u64)?;
    out.extend_from_slice(&control_compressed);
    out.write_u64::<BigEndian>(diff_compressed.len() as u64)?;
    out.extend_from_slice(&diff_compressed);
    out.write_u64::<BigEndian>(extra_compressed.len() as u64)?;
    out.extend_from_slice(&extra_compressed);
    Ok(out)
}

fn read_delta(delta: &[u8]) -> Result<(Vec<(i64, i64, i64)>, Vec<u8>, Vec<u8>)> {
    let mut cur = Cursor::new(delta);
    let control_raw = read_block(&mut cur)?;
    let diff_bytes = read_block(&mut cur)?;
    let extra_bytes = read_block(&mut cur)?;

    let mut control = Vec::new();
    let mut ccur = Cursor::new(&control_raw[..]);
    while (ccur.position() as usize) < control_raw.len() {
        let d = ccur.read_i64::<BigEndian>()?;
        let e = ccur.read_i64::<BigEndian>()?;
        let s = ccur.read_i64::<BigEndian>()?;
        control.push((d, e, s));
    }
    Ok((control, diff_bytes, extra_bytes))
}

fn read_block(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = cur.read_u64::<BigEndian>()? as usize;
    let mut compressed = vec![0u8; len];
    cur.read_exact(&mut compressed)?;
    inflate_block(&compressed)
}

fn deflate_block(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn inflate_block(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
