//! Top-level patch generation pipeline (spec.md §4.7): parse both archives,
//! divine deflate parameters, plan, materialize the delta-friendly blobs,
//! compute and write deltas. Grounded on the teacher crate's
//! `StreamingZipWriter::write_archive`-style single public entry point that
//! owns the whole lifecycle of its scratch state.

use crate::blob_builder::{build_delta_friendly_new, build_delta_friendly_old};
use crate::byte_source::ByteSource;
use crate::cancel::CancellationToken;
use crate::deflate_oracle::{self, SMALL_ENTRY_THRESHOLD_BYTES};
use crate::delta::{self, combine_entries, derive_delta_entries, fill_gaps, whole_blob_entry};
use crate::error::Result;
use crate::options::Options;
use crate::patch::writer::write_patch;
use crate::plan::{self, PlanModifier};
use crate::zip_parser::{self, CompressionMethod, EntryKey};
use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

/// Generates a patch turning `old` into `new`, writing it to `out`.
///
/// Follows spec.md §4.7's eight steps: parse both archives; run the deflate
/// oracle over every DEFLATE entry in `new`; plan pairings and per-pair
/// decisions; run the configured budget modifiers; assemble the disjoint
/// uncompression/recompression plans; materialize the two delta-friendly
/// blobs; derive, gap-fill and combine delta entries; compute and stream
/// each delta to `out`. All temporary blobs are dropped on every exit path
/// since [`crate::temp_blob::TempBlob`] cleans up in `Drop`.
pub fn generate(
    old: &dyn ByteSource,
    new: &dyn ByteSource,
    out: &mut dyn Write,
    opts: &Options,
    cancel: &CancellationToken,
) -> Result<()> {
    cancel.check()?;
    debug!(old_len = old.len(), new_len = new.len(), "starting patch generation");
    let old_entries = zip_parser::parse(old)?;
    let new_entries = zip_parser::parse(new)?;
    debug!(
        old_entries = old_entries.len(),
        new_entries = new_entries.len(),
        "parsed archives"
    );

    let oracle_results = divine_all(new, &new_entries, cancel)?;

    let plan_entries = plan::plan(
        old,
        new,
        &old_entries,
        &new_entries,
        &oracle_results,
        &opts.supported_delta_formats,
    )?;
    cancel.check()?;

    let plan_entries = apply_modifiers(plan_entries, old.len(), opts);

    let assembled = plan::assemble(&plan_entries)?;
    cancel.check()?;

    let delta_friendly_old = build_delta_friendly_old(
        old,
        &assembled.old_file_uncompression_plan,
        opts.temp_spill_threshold_bytes,
    )?;
    let (delta_friendly_new, recompression_plan) = build_delta_friendly_new(
        new,
        &assembled.new_file_uncompression_plan,
        opts.temp_spill_threshold_bytes,
    )?;
    cancel.check()?;

    let entries = if assembled.entries.is_empty() {
        vec![whole_blob_entry(delta_friendly_old.len(), delta_friendly_new.len())]
    } else {
        derive_delta_entries(
            &assembled.entries,
            &old_entries,
            &new_entries,
            &assembled.old_file_uncompression_plan,
            &recompression_plan,
        )
    };
    let entries = fill_gaps(entries, delta_friendly_old.len(), delta_friendly_new.len());
    let entries = combine_entries(entries, delta_friendly_old.len());

    let mut deltas = Vec::with_capacity(entries.len());
    for entry in &entries {
        cancel.check()?;
        let old_slice = delta_friendly_old.read_range(entry.old_range)?;
        let new_slice = delta_friendly_new.read_range(entry.new_range)?;
        let computed = delta::compute(entry, &old_slice, &new_slice, opts, cancel)?;
        deltas.push((entry.clone(), computed.bytes));
    }

    write_patch(
        out,
        delta_friendly_old.len(),
        &assembled.old_file_uncompression_plan,
        &recompression_plan,
        &deltas,
    )?;
    debug!(deltas = deltas.len(), "patch generation complete");
    Ok(())
}

/// Runs the deflate oracle once per DEFLATE entry in `new`, keyed by entry
/// identity. STORED entries never need divination. Small entries (below
/// [`SMALL_ENTRY_THRESHOLD_BYTES`]) and large ones are divined identically —
/// the threshold only documents a streaming-vs-slurp decision callers may
/// make elsewhere, since `divine` always takes a fully-read slice.
fn divine_all(
    new: &dyn ByteSource,
    new_entries: &[zip_parser::ZipEntry],
    cancel: &CancellationToken,
) -> Result<HashMap<EntryKey, Option<crate::deflate_oracle::DeflateParameters>>> {
    let mut results = HashMap::new();
    for entry in new_entries {
        if entry.compression_method != CompressionMethod::Deflate {
            continue;
        }
        cancel.check()?;
        let compressed = new.read_range(entry.compressed_data_range)?;
        let _ = SMALL_ENTRY_THRESHOLD_BYTES; // threshold documented, not branched on
        results.insert(entry.key(), deflate_oracle::divine(&compressed));
    }
    Ok(results)
}

fn apply_modifiers(
    entries: Vec<plan::PreDiffPlanEntry>,
    old_file_length: u64,
    opts: &Options,
) -> Vec<plan::PreDiffPlanEntry> {
    let mut modifiers: Vec<PlanModifier> = Vec::new();
    if let Some(limit) = opts.total_recompression_limit {
        modifiers.push(crate::plan::modifiers::total_recompression_limiter(limit));
    }
    if let Some(limit) = opts.delta_friendly_old_blob_size_limit {
        modifiers.push(crate::plan::modifiers::delta_friendly_old_blob_size_limiter(
            old_file_length,
            limit,
        ));
    }
    modifiers.into_iter().fold(entries, |acc, m| m(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::MemoryByteSource;
    use crate::test_support::build_test_zip;

    #[test]
    fn generates_and_round_trips_a_simple_change() {
        let old_bytes = build_test_zip(&[("a.txt", b"hello world".to_vec(), true)]);
        let new_bytes = build_test_zip(&[("a.txt", b"hello there, world".to_vec(), true)]);
        let old = MemoryByteSource::new(old_bytes.clone());
        let new = MemoryByteSource::new(new_bytes.clone());

        let mut patch_bytes = Vec::new();
        generate(
            &old,
            &new,
            &mut patch_bytes,
            &Options::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(!patch_bytes.is_empty());

        let reconstructed = crate::patch::apply_patch(&old_bytes, &patch_bytes).unwrap();
        assert_eq!(reconstructed, new_bytes);
    }

    #[test]
    fn generates_for_identical_archives() {
        let bytes = build_test_zip(&[("a.txt", b"unchanged".to_vec(), true)]);
        let old = MemoryByteSource::new(bytes.clone());
        let new = MemoryByteSource::new(bytes.clone());
        let mut patch_bytes = Vec::new();
        generate(
            &old,
            &new,
            &mut patch_bytes,
            &Options::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let reconstructed = crate::patch::apply_patch(&bytes, &patch_bytes).unwrap();
        assert_eq!(reconstructed, bytes);
    }

    #[test]
    fn generate_honors_cancellation() {
        let bytes = build_test_zip(&[("a.txt", b"data".to_vec(), true)]);
        let old = MemoryByteSource::new(bytes.clone());
        let new = MemoryByteSource::new(bytes);
        let token = CancellationToken::new();
        token.cancel();
        let mut out = Vec::new();
        let result = generate(&old, &new, &mut out, &Options::default(), &token);
        assert!(matches!(result, Err(crate::error::PatchError::Interrupted)));
    }
}
