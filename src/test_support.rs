//! Hand-rolled ZIP archive construction for unit and integration tests.
//!
//! Writes archives byte-by-byte (no data descriptors, no ZIP64) so tests can
//! pin exact compression parameters independently of [`crate::patch`]'s own
//! writer — using the production writer to build its own test fixtures would
//! make a bug in the writer invisible to the parser's tests.
#![cfg(test)]

use crate::deflate_oracle::{recompress, DeflateParameters};
use crc32fast::Hasher as Crc32;

/// One entry to place in a test archive: name, uncompressed bytes, and
/// whether to deflate it (level 6, default strategy) or store it verbatim.
pub type TestEntrySpec = (&'static str, Vec<u8>, bool);

pub fn build_test_zip(entries: &[TestEntrySpec]) -> Vec<u8> {
    let specs: Vec<DeflateSpec> = entries
        .iter()
        .map(|(name, data, deflate)| DeflateSpec {
            name: name.to_string(),
            data: data.clone(),
            deflate: *deflate,
            level: 6,
            strategy: 0,
        })
        .collect();
    build_test_zip_with_params(&specs)
}

pub struct DeflateSpec {
    pub name: String,
    pub data: Vec<u8>,
    pub deflate: bool,
    pub level: u32,
    pub strategy: u32,
}

/// zlib strategy constants mirrored locally to avoid depending on flate2's
/// (unexposed) raw strategy enum in test code.
pub const Z_DEFAULT_STRATEGY: u32 = 0;
pub const Z_FILTERED: u32 = 1;
pub const Z_HUFFMAN_ONLY: u32 = 2;

pub fn build_test_zip_with_params(specs: &[DeflateSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    struct Written {
        name: String,
        crc32: u32,
        compressed: Vec<u8>,
        uncompressed_len: u32,
        method: u16,
        offset: u32,
    }
    let mut written = Vec::new();

    for spec in specs {
        let offset = out.len() as u32;
        let mut hasher = Crc32::new();
        hasher.update(&spec.data);
        let crc32 = hasher.finalize();

        let (compressed, method) = if spec.deflate {
            (deflate_raw(&spec.data, spec.level, spec.strategy), 8u16)
        } else {
            (spec.data.clone(), 0u16)
        };

        out.extend_from_slice(&0x04034b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // general purpose flags
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // mod time/date
        out.extend_from_slice(&crc32.to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(spec.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(spec.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(spec.name.as_bytes());
        out.extend_from_slice(&compressed);

        written.push(Written {
            name: spec.name.clone(),
            crc32,
            compressed,
            uncompressed_len: spec.data.len() as u32,
            method,
            offset,
        });
    }

    let cd_offset = out.len() as u32;
    for w in &written {
        out.extend_from_slice(&0x02014b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version made by
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&w.method.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // mod time/date
        out.extend_from_slice(&w.crc32.to_le_bytes());
        out.extend_from_slice(&(w.compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&w.uncompressed_len.to_le_bytes());
        out.extend_from_slice(&(w.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&w.offset.to_le_bytes());
        out.extend_from_slice(w.name.as_bytes());
    }
    let cd_size = out.len() as u32 - cd_offset;

    out.extend_from_slice(&0x06054b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number
    out.extend_from_slice(&0u16.to_le_bytes()); // disk with CD
    out.extend_from_slice(&(written.len() as u16).to_le_bytes());
    out.extend_from_slice(&(written.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment len

    out
}

/// Raw (nowrap) deflate compression at the given level/strategy, matching
/// what ZIP entries carry on the wire (no zlib/gzip framing). Goes through
/// the oracle's own [`recompress`] rather than flate2, since flate2's simple
/// encoder has no strategy knob — this is the only way test fixtures can pin
/// strategy 1/2 at all.
pub fn deflate_raw(data: &[u8], level: u32, strategy: u32) -> Vec<u8> {
    recompress(data, DeflateParameters::new(level as u8, strategy as u8, true))
}
