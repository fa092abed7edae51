//! Per-pair plan decision records (spec.md §3).

use crate::deflate_oracle::DeflateParameters;
use crate::zip_parser::ZipEntry;

/// Which side(s) of a pair should be uncompressed before diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncompressionOption {
    Neither,
    Old,
    New,
    Both,
}

impl UncompressionOption {
    pub fn uncompress_old(&self) -> bool {
        matches!(self, UncompressionOption::Old | UncompressionOption::Both)
    }

    pub fn uncompress_new(&self) -> bool {
        matches!(self, UncompressionOption::New | UncompressionOption::Both)
    }
}

/// Why a pair received the uncompression option it did (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncompressionExplanation {
    Unsuitable,
    DeflateUnsuitable,
    BothUncompressed,
    UncompressedToCompressed,
    CompressedToUncompressed,
    CompressedBytesIdentical,
    CompressedBytesChanged,
    ResourceConstrained,
}

/// Which binary delta format to use for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaFormat {
    Bsdiff,
    FileByFile,
}

impl DeltaFormat {
    /// Whether adjacent `DeltaEntry`s of this format may be folded into one
    /// multi-range delta (spec.md §4.5 "combine").
    pub fn supports_multi_entry_delta(&self) -> bool {
        matches!(self, DeltaFormat::Bsdiff)
    }
}

/// Why a pair received the delta format it did (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaFormatExplanation {
    Default,
    FileType,
    Unchanged,
    Unsuitable,
    DeflateUnsuitable,
    ResourceConstrained,
}

/// The per-pair decision record produced by the planner.
#[derive(Debug, Clone)]
pub struct PreDiffPlanEntry {
    pub old_entry: ZipEntry,
    pub new_entry: ZipEntry,
    pub uncompression_option: UncompressionOption,
    pub uncompression_explanation: UncompressionExplanation,
    pub delta_format: DeltaFormat,
    pub delta_format_explanation: DeltaFormatExplanation,
    /// The oracle's divined parameters for `new_entry`, if it is DEFLATE and
    /// divinable. `None` for STORED entries and for entries the oracle could
    /// not reproduce (in which case `uncompress_new()` is always `false`).
    pub new_deflate_params: Option<DeflateParameters>,
}

impl PreDiffPlanEntry {
    pub fn uncompress_old(&self) -> bool {
        self.uncompression_option.uncompress_old()
    }

    pub fn uncompress_new(&self) -> bool {
        self.uncompression_option.uncompress_new()
    }

    /// Demotes this entry to `NEITHER` with a resource-constrained
    /// explanation, and resets the delta format to the default with a
    /// matching explanation, per spec.md §4.3 "Modifiers".
    pub fn demote_resource_constrained(&mut self) {
        self.uncompression_option = UncompressionOption::Neither;
        self.uncompression_explanation = UncompressionExplanation::ResourceConstrained;
        self.delta_format = DeltaFormat::Bsdiff;
        self.delta_format_explanation = DeltaFormatExplanation::ResourceConstrained;
    }
}
