//! Deflate compatibility oracle: recovers the `(level, strategy, nowrap)`
//! tuple that reproduces a given compressed byte string bit-exactly, via
//! trial recompression against a reference deflate codec.
//!
//! The candidate search needs zlib's `strategy` knob, which flate2's safe
//! wrapper does not expose; this module goes to `miniz_oxide::deflate::core`
//! directly (the same crate `johannesvollmer-exrs` and
//! `hansmrtn-pulp-os/smol-epub` pull in for zip-compatible deflate), since
//! its `create_comp_flags_from_zip_params` helper is built for exactly this
//! "reproduce a specific encoder configuration" use case.

use miniz_oxide::deflate::core::{
    compress_to_output, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush,
    TDEFLStatus,
};
use miniz_oxide::inflate::{decompress_to_vec, decompress_to_vec_zlib};
use tracing::{debug, trace};

/// The only three inputs the reference deflate codec observes for bit-exact
/// reproduction (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateParameters {
    pub level: u8,
    pub strategy: u8,
    pub nowrap: bool,
}

impl DeflateParameters {
    pub fn new(level: u8, strategy: u8, nowrap: bool) -> Self {
        Self {
            level,
            strategy,
            nowrap,
        }
    }
}

/// Levels tried per strategy, in empirical-frequency order (spec.md §4.2).
/// Levels 1-3 under strategy 1 coincide with strategy 0's output, so they
/// are omitted here — the oracle never needs to try them twice.
const STRATEGY_0_LEVELS: &[u8] = &[6, 9, 1, 4, 2, 3, 5, 7, 8];
const STRATEGY_1_LEVELS: &[u8] = &[6, 9, 4, 5, 7, 8];
const STRATEGY_2_LEVELS: &[u8] = &[1];

/// Small entries are slurped once up front; there is no repeated file I/O
/// per candidate regardless of size since `divine` always takes an in-memory
/// slice, but this constant documents the threshold callers use to decide
/// whether to read a whole entry versus stream it (spec.md §4.2 "Resource
/// hygiene").
pub const SMALL_ENTRY_THRESHOLD_BYTES: u64 = 100 * 1024;

/// Attempts to recover the deflate parameters that produced `compressed`.
/// Returns `None` on corruption or exhaustion (the reference codec cannot
/// reproduce the bytes — typically a different zlib version or a tuned
/// encoder outside the compatibility window).
pub fn divine(compressed: &[u8]) -> Option<DeflateParameters> {
    debug!("divining deflate parameters: compressed={} bytes", compressed.len());
    for nowrap in [true, false] {
        let inflated = match inflate(compressed, nowrap) {
            Some(bytes) => bytes,
            // A real deflate stream decodes under exactly one nowrap
            // setting; a failure here aborts this whole pass, not just one
            // candidate.
            None => continue,
        };
        trace!(nowrap, inflated_len = inflated.len(), "inflated candidate payload");

        for (strategy, levels) in [
            (0u8, STRATEGY_0_LEVELS),
            (1u8, STRATEGY_1_LEVELS),
            (2u8, STRATEGY_2_LEVELS),
        ] {
            for &level in levels {
                if matches_candidate(&inflated, level, strategy, nowrap, compressed) {
                    debug!(level, strategy, nowrap, "divined matching candidate");
                    return Some(DeflateParameters::new(level, strategy, nowrap));
                }
            }
        }
    }
    debug!("no candidate reproduced the compressed bytes");
    None
}

/// Recompresses `inflated` under `params`, producing the exact bytes a
/// receiver applying the recompression plan must reproduce. Used by the
/// test-only patch applier (`patch::reader`), not by the generator itself —
/// the generator only ever needs [`divine`] and [`matches_candidate`].
pub fn recompress(inflated: &[u8], params: DeflateParameters) -> Vec<u8> {
    let window_bits = if params.nowrap { -15 } else { 15 };
    let flags = create_comp_flags_from_zip_params(
        params.level as i32,
        window_bits,
        params.strategy as i32,
    );
    let mut compressor = CompressorOxide::new(flags);
    let mut out = Vec::new();
    compress_to_output(&mut compressor, inflated, TDEFLFlush::Finish, |chunk| {
        out.extend_from_slice(chunk);
        true
    });
    out
}

/// Recompresses `inflated` under one candidate and compares byte-for-byte
/// against `original`. Mismatch aborts the candidate (returns `false`), not
/// the whole search — the sentinel-via-exception pattern of the reference
/// implementation is modeled here as a plain boolean per spec.md §9.
fn matches_candidate(inflated: &[u8], level: u8, strategy: u8, nowrap: bool, original: &[u8]) -> bool {
    let window_bits = if nowrap { -15 } else { 15 };
    let flags = create_comp_flags_from_zip_params(level as i32, window_bits, strategy as i32);
    let mut compressor = CompressorOxide::new(flags);

    let mut mismatch = false;
    let mut cursor = 0usize;
    let (status, _, _) =
        compress_to_output(&mut compressor, inflated, TDEFLFlush::Finish, |chunk| {
            let end = cursor + chunk.len();
            if end > original.len() || original[cursor..end] != *chunk {
                mismatch = true;
                return false;
            }
            cursor = end;
            true
        });

    if mismatch {
        return false;
    }
    matches!(status, TDEFLStatus::Done) && cursor == original.len()
}

/// Inflates `compressed` assuming raw deflate (`nowrap = true`) or a zlib
/// wrapper (`nowrap = false`). Returns `None` if decoding fails under this
/// wrapping.
fn inflate(compressed: &[u8], nowrap: bool) -> Option<Vec<u8>> {
    if nowrap {
        decompress_to_vec(compressed).ok()
    } else {
        decompress_to_vec_zlib(compressed).ok()
    }
}
