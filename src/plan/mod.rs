//! Pre-diff planner: pairs entries across old and new archives, decides an
//! uncompression option and delta format per pair, runs budget-limiting
//! modifiers, and assembles the ordered, disjoint plan (spec.md §4.3).

pub mod entry;
pub mod modifiers;
pub mod pairing;

pub use entry::{
    DeltaFormat, DeltaFormatExplanation, PreDiffPlanEntry, UncompressionExplanation,
    UncompressionOption,
};
pub use modifiers::PlanModifier;

use crate::byte_source::ByteSource;
use crate::deflate_oracle::DeflateParameters;
use crate::error::Result;
use crate::ranges::{assert_disjoint_sorted, assert_disjoint_sorted_typed, Range, TypedRange};
use crate::zip_parser::{self, CompressionMethod, EntryKey, ZipEntry};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// The set of delta formats a caller allows the planner (and any recursive
/// `FILE_BY_FILE` invocation) to choose from.
pub type SupportedFormats = HashSet<DeltaFormat>;

/// The complete output of the planner (spec.md §3 "PreDiffPlan").
#[derive(Debug, Clone)]
pub struct PreDiffPlan {
    pub old_file_uncompression_plan: Vec<Range>,
    pub new_file_uncompression_plan: Vec<TypedRange<DeflateParameters>>,
    pub entries: Vec<PreDiffPlanEntry>,
}

/// Computes the initial per-pair decisions (before modifiers run).
///
/// `oracle_results` maps each new entry's key to the divined deflate
/// parameters for that entry, or `None` if the oracle could not reproduce it
/// (only populated for entries whose method is DEFLATE).
pub fn plan(
    old_source: &dyn ByteSource,
    new_source: &dyn ByteSource,
    old_entries: &[ZipEntry],
    new_entries: &[ZipEntry],
    oracle_results: &HashMap<EntryKey, Option<DeflateParameters>>,
    supported_formats: &SupportedFormats,
) -> Result<Vec<PreDiffPlanEntry>> {
    let pairs = pairing::pair_entries(old_entries, new_entries);
    debug!(
        old_entries = old_entries.len(),
        new_entries = new_entries.len(),
        pairs = pairs.len(),
        "planning pre-diff decisions"
    );
    let mut out = Vec::with_capacity(pairs.len());

    for (old_entry, new_entry) in pairs {
        let oracle_result = oracle_results.get(&new_entry.key()).copied().flatten();
        let (uncompression_option, uncompression_explanation) =
            decide_uncompression(old_source, new_source, &old_entry, &new_entry, oracle_result)?;
        let (delta_format, delta_format_explanation) = decide_delta_format(
            old_source,
            new_source,
            &old_entry,
            &new_entry,
            uncompression_explanation,
            supported_formats,
        )?;
        trace!(
            name = %String::from_utf8_lossy(&new_entry.file_name_bytes),
            ?uncompression_explanation,
            ?delta_format_explanation,
            "decided pair"
        );

        out.push(PreDiffPlanEntry {
            old_entry,
            new_entry,
            uncompression_option,
            uncompression_explanation,
            delta_format,
            delta_format_explanation,
            new_deflate_params: oracle_result,
        });
    }

    Ok(out)
}

fn decide_uncompression(
    old_source: &dyn ByteSource,
    new_source: &dyn ByteSource,
    old_entry: &ZipEntry,
    new_entry: &ZipEntry,
    oracle_result: Option<DeflateParameters>,
) -> Result<(UncompressionOption, UncompressionExplanation)> {
    // Rule 1: new is DEFLATE but the oracle could not divine its parameters.
    if new_entry.compression_method == CompressionMethod::Deflate && oracle_result.is_none() {
        return Ok((
            UncompressionOption::Neither,
            UncompressionExplanation::DeflateUnsuitable,
        ));
    }
    // Rule 2: either side uses an unknown compression method.
    if matches!(old_entry.compression_method, CompressionMethod::Unknown(_))
        || matches!(new_entry.compression_method, CompressionMethod::Unknown(_))
    {
        return Ok((
            UncompressionOption::Neither,
            UncompressionExplanation::Unsuitable,
        ));
    }
    // Rule 3: both stored.
    if old_entry.compression_method == CompressionMethod::Stored
        && new_entry.compression_method == CompressionMethod::Stored
    {
        return Ok((
            UncompressionOption::Neither,
            UncompressionExplanation::BothUncompressed,
        ));
    }
    // Rule 4: old stored, new compressed.
    if old_entry.compression_method == CompressionMethod::Stored {
        return Ok((
            UncompressionOption::New,
            UncompressionExplanation::UncompressedToCompressed,
        ));
    }
    // Rule 5: old compressed, new stored.
    if new_entry.compression_method == CompressionMethod::Stored {
        return Ok((
            UncompressionOption::Old,
            UncompressionExplanation::CompressedToUncompressed,
        ));
    }
    // Rule 6: byte-identical compressed payloads.
    if old_entry.compressed_data_range.length == new_entry.compressed_data_range.length {
        let old_bytes = old_source.read_range(old_entry.compressed_data_range)?;
        let new_bytes = new_source.read_range(new_entry.compressed_data_range)?;
        if old_bytes == new_bytes {
            return Ok((
                UncompressionOption::Neither,
                UncompressionExplanation::CompressedBytesIdentical,
            ));
        }
    }
    // Rule 7: default.
    Ok((
        UncompressionOption::Both,
        UncompressionExplanation::CompressedBytesChanged,
    ))
}

fn decide_delta_format(
    old_source: &dyn ByteSource,
    new_source: &dyn ByteSource,
    old_entry: &ZipEntry,
    new_entry: &ZipEntry,
    uncompression_explanation: UncompressionExplanation,
    supported_formats: &SupportedFormats,
) -> Result<(DeltaFormat, DeltaFormatExplanation)> {
    if uncompression_explanation == UncompressionExplanation::Unsuitable {
        return Ok((DeltaFormat::Bsdiff, DeltaFormatExplanation::Unsuitable));
    }
    if uncompression_explanation == UncompressionExplanation::DeflateUnsuitable {
        return Ok((
            DeltaFormat::Bsdiff,
            DeltaFormatExplanation::DeflateUnsuitable,
        ));
    }
    if old_entry.crc32 == new_entry.crc32 {
        return Ok((DeltaFormat::Bsdiff, DeltaFormatExplanation::Unchanged));
    }
    if supported_formats.contains(&DeltaFormat::FileByFile)
        && has_archive_suffix(&old_entry.file_name_bytes)
        && has_archive_suffix(&new_entry.file_name_bytes)
    {
        let old_payload = zip_parser::read_uncompressed_payload(old_source, old_entry)?;
        let new_payload = zip_parser::read_uncompressed_payload(new_source, new_entry)?;
        if zip_parser::looks_like_nested_zip(&old_payload)
            && zip_parser::looks_like_nested_zip(&new_payload)
        {
            return Ok((DeltaFormat::FileByFile, DeltaFormatExplanation::FileType));
        }
    }
    Ok((DeltaFormat::Bsdiff, DeltaFormatExplanation::Default))
}

fn has_archive_suffix(name: &[u8]) -> bool {
    let lower = String::from_utf8_lossy(name).to_lowercase();
    lower.ends_with(".zip") || lower.ends_with(".apk") || lower.ends_with(".jar")
}

/// Projects the retained `uncompress_old`/`uncompress_new` flags into the
/// ordered, disjoint range lists spec.md §3 requires, raising
/// `InvariantViolation` if they are not (a programmer-error condition —
/// overlapping entries can only come from a corrupt archive with aliased
/// local offsets, which the parser should already have rejected).
pub fn assemble(entries: &[PreDiffPlanEntry]) -> Result<PreDiffPlan> {
    let mut old_plan: Vec<Range> = entries
        .iter()
        .filter(|e| e.uncompress_old())
        .map(|e| e.old_entry.compressed_data_range)
        .collect();
    old_plan.sort();
    assert_disjoint_sorted(&old_plan, "old file uncompression plan")?;

    let mut new_plan: Vec<TypedRange<DeflateParameters>> = Vec::new();
    for e in entries.iter().filter(|e| e.uncompress_new()) {
        let params = e.new_deflate_params.ok_or_else(|| {
            crate::error::PatchError::InvariantViolation(format!(
                "entry flagged uncompress_new with no divined deflate parameters: {:?}",
                String::from_utf8_lossy(&e.new_entry.file_name_bytes)
            ))
        })?;
        new_plan.push(TypedRange::new(e.new_entry.compressed_data_range, params));
    }
    new_plan.sort_by_key(|r| r.range);
    assert_disjoint_sorted_typed(&new_plan, "new file uncompression plan")?;

    debug!(
        old_ranges = old_plan.len(),
        new_ranges = new_plan.len(),
        "assembled pre-diff plan"
    );

    Ok(PreDiffPlan {
        old_file_uncompression_plan: old_plan,
        new_file_uncompression_plan: new_plan,
        entries: entries.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::MemoryByteSource;
    use crate::test_support::build_test_zip;
    use crate::zip_parser::parse;

    fn supported(formats: &[DeltaFormat]) -> SupportedFormats {
        formats.iter().copied().collect()
    }

    #[test]
    fn unchanged_entry_is_neither_both_uncompressed() {
        let old = MemoryByteSource::new(build_test_zip(&[("a", b"hello".to_vec(), false)]));
        let new = MemoryByteSource::new(build_test_zip(&[("a", b"hello".to_vec(), false)]));
        let old_entries = parse(&old).unwrap();
        let new_entries = parse(&new).unwrap();
        let oracle_results = HashMap::new();
        let plan_entries = plan(
            &old,
            &new,
            &old_entries,
            &new_entries,
            &oracle_results,
            &supported(&[DeltaFormat::Bsdiff]),
        )
        .unwrap();
        assert_eq!(plan_entries.len(), 1);
        assert_eq!(
            plan_entries[0].uncompression_option,
            UncompressionOption::Neither
        );
        assert_eq!(
            plan_entries[0].uncompression_explanation,
            UncompressionExplanation::BothUncompressed
        );
        assert_eq!(
            plan_entries[0].delta_format_explanation,
            DeltaFormatExplanation::Unchanged
        );
    }

    #[test]
    fn identical_compressed_bytes_skip_recompression() {
        let data = vec![b'a'; 1024];
        let old = MemoryByteSource::new(build_test_zip(&[("b.txt", data.clone(), true)]));
        let new = MemoryByteSource::new(build_test_zip(&[("b.txt", data, true)]));
        let old_entries = parse(&old).unwrap();
        let new_entries = parse(&new).unwrap();
        let mut oracle_results = HashMap::new();
        oracle_results.insert(
            new_entries[0].key(),
            Some(DeflateParameters::new(6, 0, true)),
        );
        let plan_entries = plan(
            &old,
            &new,
            &old_entries,
            &new_entries,
            &oracle_results,
            &supported(&[DeltaFormat::Bsdiff]),
        )
        .unwrap();
        assert_eq!(
            plan_entries[0].uncompression_explanation,
            UncompressionExplanation::CompressedBytesIdentical
        );
    }

    #[test]
    fn undivinable_deflate_is_unsuitable() {
        let old = MemoryByteSource::new(build_test_zip(&[("b.txt", vec![b'a'; 64], true)]));
        let new = MemoryByteSource::new(build_test_zip(&[("b.txt", vec![b'a'; 65], true)]));
        let old_entries = parse(&old).unwrap();
        let new_entries = parse(&new).unwrap();
        let mut oracle_results = HashMap::new();
        oracle_results.insert(new_entries[0].key(), None);
        let plan_entries = plan(
            &old,
            &new,
            &old_entries,
            &new_entries,
            &oracle_results,
            &supported(&[DeltaFormat::Bsdiff]),
        )
        .unwrap();
        assert_eq!(
            plan_entries[0].uncompression_explanation,
            UncompressionExplanation::DeflateUnsuitable
        );
        assert_eq!(
            plan_entries[0].delta_format_explanation,
            DeltaFormatExplanation::DeflateUnsuitable
        );
    }

    #[test]
    fn assemble_rejects_overlap_as_invariant_violation() {
        let mut a = ZipEntryFixture::new("a", 100, 10);
        let mut b = ZipEntryFixture::new("b", 105, 10);
        // Force overlapping compressed_data_range to exercise the invariant
        // check directly rather than constructing a corrupt archive.
        a.entry.compressed_data_range = Range::new(0, 20);
        b.entry.compressed_data_range = Range::new(10, 20);
        let entries = vec![
            PreDiffPlanEntry {
                old_entry: a.entry.clone(),
                new_entry: a.entry,
                uncompression_option: UncompressionOption::Old,
                uncompression_explanation: UncompressionExplanation::CompressedToUncompressed,
                delta_format: DeltaFormat::Bsdiff,
                delta_format_explanation: DeltaFormatExplanation::Default,
                new_deflate_params: None,
            },
            PreDiffPlanEntry {
                old_entry: b.entry.clone(),
                new_entry: b.entry,
                uncompression_option: UncompressionOption::Old,
                uncompression_explanation: UncompressionExplanation::CompressedToUncompressed,
                delta_format: DeltaFormat::Bsdiff,
                delta_format_explanation: DeltaFormatExplanation::Default,
                new_deflate_params: None,
            },
        ];
        assert!(assemble(&entries).is_err());
    }

    struct ZipEntryFixture {
        entry: ZipEntry,
    }

    impl ZipEntryFixture {
        fn new(name: &str, offset: u64, len: u64) -> Self {
            Self {
                entry: ZipEntry {
                    compression_method: CompressionMethod::Stored,
                    raw_compression_method: 0,
                    crc32: 0,
                    uncompressed_size: len,
                    file_name_bytes: name.as_bytes().to_vec(),
                    use_utf8_encoding: false,
                    local_entry_range: Range::new(offset, len + 30 + name.len() as u64),
                    compressed_data_range: Range::new(offset + 30 + name.len() as u64, len),
                },
            }
        }
    }
}
