//! Projects plan entries into delta-friendly blob coordinates, fills
//! uncovered gaps, and folds adjacent same-format runs (spec.md §4.5 steps
//! 1–4).

use crate::deflate_oracle::DeflateParameters;
use crate::plan::{DeltaFormat, PreDiffPlanEntry};
use crate::ranges::{Range, TypedRange};
use crate::zip_parser::{EntryKey, ZipEntry};
use std::collections::{HashMap, HashSet};

/// One computed delta: which format to diff with, and the payload ranges
/// in each delta-friendly blob it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaEntry {
    pub format: DeltaFormat,
    pub old_range: Range,
    pub new_range: Range,
}

/// Walks `entries` in local-header order, accumulating
/// `extraBytes += uncompressedSize - compressedLength` for every entry whose
/// original `compressed_data_range` appears in `plan_ranges`, and returns
/// each entry's projected payload range in the resulting delta-friendly
/// blob. Computed independently for the old and new archives (spec.md §4.5
/// step 1).
pub fn project_payload_ranges(
    entries: &[ZipEntry],
    plan_ranges: &HashSet<Range>,
) -> HashMap<EntryKey, Range> {
    let mut ordered: Vec<&ZipEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.local_entry_range.offset);

    let mut extra = 0i64;
    let mut map = HashMap::with_capacity(ordered.len());
    for entry in ordered {
        let original = entry.compressed_data_range;
        let projected_offset = (original.offset as i64 + extra) as u64;
        if plan_ranges.contains(&original) {
            let projected = Range::new(projected_offset, entry.uncompressed_size);
            map.insert(entry.key(), projected);
            extra += entry.uncompressed_size as i64 - original.length as i64;
        } else {
            map.insert(entry.key(), Range::new(projected_offset, original.length));
        }
    }
    map
}

/// Builds one [`DeltaEntry`] per paired plan entry, using the old- and
/// new-side projections (spec.md §4.5 step 2).
pub fn derive_delta_entries(
    plan_entries: &[PreDiffPlanEntry],
    old_entries: &[ZipEntry],
    new_entries: &[ZipEntry],
    old_plan: &[Range],
    new_plan: &[TypedRange<DeflateParameters>],
) -> Vec<DeltaEntry> {
    let old_plan_set: HashSet<Range> = old_plan.iter().copied().collect();
    let new_plan_set: HashSet<Range> = new_plan.iter().map(|r| r.range).collect();
    let old_map = project_payload_ranges(old_entries, &old_plan_set);
    let new_map = project_payload_ranges(new_entries, &new_plan_set);

    plan_entries
        .iter()
        .map(|pe| DeltaEntry {
            format: pe.delta_format,
            old_range: old_map[&pe.old_entry.key()],
            new_range: new_map[&pe.new_entry.key()],
        })
        .collect()
}

/// Sorts by `new_range.offset` and inserts default-format entries covering
/// any bytes of the new delta-friendly blob not already explained by an
/// entry (spec.md §4.5 step 3). Gap entries get a zero-length old range at
/// the next real entry's old offset (or the end of the old blob, for a
/// trailing gap).
pub fn fill_gaps(mut entries: Vec<DeltaEntry>, old_blob_len: u64, new_blob_len: u64) -> Vec<DeltaEntry> {
    entries.sort_by_key(|e| e.new_range.offset);

    let mut filled = Vec::with_capacity(entries.len() * 2);
    let mut cursor = 0u64;
    for entry in &entries {
        if entry.new_range.offset > cursor {
            filled.push(DeltaEntry {
                format: DeltaFormat::Bsdiff,
                old_range: Range::new(entry.old_range.offset, 0),
                new_range: Range::new(cursor, entry.new_range.offset - cursor),
            });
        }
        filled.push(entry.clone());
        cursor = entry.new_range.end();
    }
    if cursor < new_blob_len {
        filled.push(DeltaEntry {
            format: DeltaFormat::Bsdiff,
            old_range: Range::new(old_blob_len, 0),
            new_range: Range::new(cursor, new_blob_len - cursor),
        });
    }
    filled
}

/// Folds adjacent entries with equal, multi-entry-capable formats into one
/// combined entry diffing against the whole old blob (spec.md §4.5 step 4).
pub fn combine_entries(entries: Vec<DeltaEntry>, old_blob_len: u64) -> Vec<DeltaEntry> {
    let mut combined: Vec<DeltaEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        let fold = combined.last().map_or(false, |prev: &DeltaEntry| {
            prev.format == entry.format
                && entry.format.supports_multi_entry_delta()
                && prev.new_range.end() == entry.new_range.offset
        });
        if fold {
            let prev = combined.last_mut().unwrap();
            prev.old_range = Range::new(0, old_blob_len);
            prev.new_range = Range::new(prev.new_range.offset, entry.new_range.end() - prev.new_range.offset);
        } else {
            combined.push(entry);
        }
    }
    combined
}

/// Explanation-only helper the orchestrator uses to short-circuit an empty
/// plan: per spec.md §4.5, an empty plan reduces to a single default-format
/// entry covering both blobs entirely.
pub fn whole_blob_entry(old_blob_len: u64, new_blob_len: u64) -> DeltaEntry {
    DeltaEntry {
        format: DeltaFormat::Bsdiff,
        old_range: Range::new(0, old_blob_len),
        new_range: Range::new(0, new_blob_len),
    }
}
