//! Minimal hand-rolled ZIP construction for integration tests, independent
//! of `archive_delta_patch::patch::writer` so a writer bug can't mask a
//! parser bug (mirrors `src/test_support.rs`'s rationale, duplicated here
//! since unit-test-only modules aren't visible to the `tests/` crate).

use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

pub struct Entry {
    name: &'static str,
    data: Vec<u8>,
    method: EntryMethod,
}

enum EntryMethod {
    Stored,
    Deflate,
    /// Pre-built compressed bytes stored under method=DEFLATE as-is, used to
    /// construct entries no candidate re-encoder can ever reproduce
    /// byte-for-byte (spec.md §4.2's "undivinable" case).
    RawDeflateBytes(Vec<u8>),
}

impl Entry {
    pub fn deflate(name: &'static str, data: Vec<u8>) -> Self {
        Self {
            name,
            data,
            method: EntryMethod::Deflate,
        }
    }

    pub fn stored(name: &'static str, data: Vec<u8>) -> Self {
        Self {
            name,
            data,
            method: EntryMethod::Stored,
        }
    }

    /// A DEFLATE-labeled entry whose payload is a raw "stored block"
    /// (BFINAL=1, BTYPE=00) — it inflates correctly but no dynamic/fixed
    /// Huffman candidate the oracle tries will ever reproduce that framing,
    /// guaranteeing `deflate_oracle::divine` returns `None`.
    pub fn undivinable_deflate(name: &'static str, data: Vec<u8>) -> Self {
        let mut stream = Vec::with_capacity(data.len() + 5);
        stream.push(0x01);
        let len = data.len() as u16;
        stream.extend_from_slice(&len.to_le_bytes());
        stream.extend_from_slice(&(!len).to_le_bytes());
        stream.extend_from_slice(&data);
        Self {
            name,
            data,
            method: EntryMethod::RawDeflateBytes(stream),
        }
    }
}

pub fn build_zip(entries: &[Entry]) -> Vec<u8> {
    let mut out = Vec::new();
    struct Written {
        name: &'static str,
        crc32: u32,
        compressed: Vec<u8>,
        uncompressed_len: u32,
        method: u16,
        offset: u32,
    }
    let mut written = Vec::new();

    for entry in entries {
        let offset = out.len() as u32;
        let mut hasher = Crc32::new();
        hasher.update(&entry.data);
        let crc32 = hasher.finalize();

        let (compressed, method) = match &entry.method {
            EntryMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(6));
                encoder.write_all(&entry.data).unwrap();
                (encoder.finish().unwrap(), 8u16)
            }
            EntryMethod::Stored => (entry.data.clone(), 0u16),
            EntryMethod::RawDeflateBytes(bytes) => (bytes.clone(), 8u16),
        };

        out.extend_from_slice(&0x04034b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc32.to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&compressed);

        written.push(Written {
            name: entry.name,
            crc32,
            compressed,
            uncompressed_len: entry.data.len() as u32,
            method,
            offset,
        });
    }

    let cd_offset = out.len() as u32;
    for w in &written {
        out.extend_from_slice(&0x02014b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&w.method.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&w.crc32.to_le_bytes());
        out.extend_from_slice(&(w.compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&w.uncompressed_len.to_le_bytes());
        out.extend_from_slice(&(w.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&w.offset.to_le_bytes());
        out.extend_from_slice(w.name.as_bytes());
    }
    let cd_size = out.len() as u32 - cd_offset;

    out.extend_from_slice(&0x06054b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(written.len() as u16).to_le_bytes());
    out.extend_from_slice(&(written.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    out
}
