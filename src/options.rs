//! Generator configuration (spec.md §6). A plain struct with `Default`,
//! mirroring the teacher's builder-method style
//! (`StreamingZipWriter::with_compression`) rather than a config-file layer —
//! there is nothing file-backed to configure in this domain.

use crate::plan::DeltaFormat;
use std::collections::HashSet;

/// Bytes held in memory by a [`crate::temp_blob::TempBlob`] before it spills
/// to a temp file, per spec.md §5 ("default 5 MiB").
pub const DEFAULT_TEMP_SPILL_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

/// Options controlling one `generate` call.
#[derive(Debug, Clone)]
pub struct Options {
    pub supported_delta_formats: HashSet<DeltaFormat>,
    pub total_recompression_limit: Option<u64>,
    pub delta_friendly_old_blob_size_limit: Option<u64>,
    /// Reserved toggle: this crate has exactly one bsdiff backend (the
    /// suffix-array implementation in `delta::bsdiff`), so this flag is
    /// accepted for wire/API compatibility with spec.md §6 but does not
    /// currently select between backends (see DESIGN.md).
    pub use_native_bsdiff: bool,
    pub temp_spill_threshold_bytes: u64,
}

impl Default for Options {
    fn default() -> Self {
        let mut supported_delta_formats = HashSet::new();
        supported_delta_formats.insert(DeltaFormat::Bsdiff);
        Self {
            supported_delta_formats,
            total_recompression_limit: None,
            delta_friendly_old_blob_size_limit: None,
            use_native_bsdiff: false,
            temp_spill_threshold_bytes: DEFAULT_TEMP_SPILL_THRESHOLD_BYTES,
        }
    }
}

impl Options {
    pub fn with_file_by_file(mut self) -> Self {
        self.supported_delta_formats.insert(DeltaFormat::FileByFile);
        self
    }

    pub fn with_total_recompression_limit(mut self, limit: u64) -> Self {
        self.total_recompression_limit = Some(limit);
        self
    }

    pub fn with_delta_friendly_old_blob_size_limit(mut self, limit: u64) -> Self {
        self.delta_friendly_old_blob_size_limit = Some(limit);
        self
    }

    pub fn with_temp_spill_threshold_bytes(mut self, bytes: u64) -> Self {
        self.temp_spill_threshold_bytes = bytes;
        self
    }

    /// The options a recursive `FILE_BY_FILE` invocation is restricted to
    /// (spec.md §4.5: "a restricted format set ({BSDIFF}) and reduced
    /// budgets"): bsdiff only, any configured budgets halved rather than
    /// dropped, so a chain of nested archives can't each spend the parent's
    /// full allowance.
    pub fn restricted_for_nested_generate(&self) -> Self {
        let mut nested = Options::default();
        nested.temp_spill_threshold_bytes = self.temp_spill_threshold_bytes;
        nested.total_recompression_limit = halve(self.total_recompression_limit);
        nested.delta_friendly_old_blob_size_limit = halve(self.delta_friendly_old_blob_size_limit);
        nested
    }
}

/// Halves a budget for a nested invocation. A parent with no limit set
/// imposes none on the nested call either — there is nothing to reduce.
fn halve(limit: Option<u64>) -> Option<u64> {
    limit.map(|l| (l / 2).max(1))
}
