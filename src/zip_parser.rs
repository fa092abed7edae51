//! Minimal ZIP parser: end-of-central-directory, central directory, and
//! local file headers, over a random-access [`ByteSource`].
//!
//! Grounded on the central-directory walk and backward EOCD scan in the
//! teacher crate's `reader.rs`, trimmed to the ranges spec.md needs (no
//! ZIP64 extra-field promotion, no comment retention) and extended with the
//! local-header-authoritative payload offset computation spec.md requires.

use crate::error::{PatchError, Result};
use crate::ranges::Range;
use crate::ByteSource;
use std::collections::HashMap;
use std::io::{Cursor, Read};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;
const EOCD_FIXED_SIZE: u64 = 22;
const MAX_EOCD_SEARCH: u64 = 32 * 1024;

/// The three compression methods this generator reasons about. Anything else
/// observed on the wire is `Unknown` and forces `NEITHER` in the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    fn from_code(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unknown(other),
        }
    }
}

/// Opaque wrapper over a raw filename, used as a map/set key. Names are
/// never interpreted as strings for matching purposes — only byte equality
/// and a stable hash matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey(pub Vec<u8>);

impl EntryKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        EntryKey(bytes.to_vec())
    }
}

/// One parsed local ZIP entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub compression_method: CompressionMethod,
    /// The method byte as it literally appeared in the central directory,
    /// before the STORED-mislabeled-as-DEFLATE normalization is applied.
    pub raw_compression_method: u16,
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub file_name_bytes: Vec<u8>,
    pub use_utf8_encoding: bool,
    pub local_entry_range: Range,
    pub compressed_data_range: Range,
}

impl ZipEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey::from_bytes(&self.file_name_bytes)
    }
}

struct CentralDirRecord {
    general_purpose_flags: u16,
    compression_method: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    file_name: Vec<u8>,
    local_header_offset: u64,
}

/// Parses `source` into the list of [`ZipEntry`] in local-header offset order.
pub fn parse(source: &dyn ByteSource) -> Result<Vec<ZipEntry>> {
    let eocd_offset = find_eocd(source)?;
    let eocd = read_eocd(source, eocd_offset)?;

    if eocd.total_entries == 0xFFFF {
        return Err(PatchError::UnsupportedArchive(
            "ZIP64 entry count marker present".to_string(),
        ));
    }

    let central_dir =
        source.read_range(Range::new(eocd.cd_offset, eocd.cd_size))?;
    let records = read_central_directory(&central_dir, eocd.total_entries as usize)?;

    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        entries.push(resolve_local_entry(source, record, eocd.cd_offset)?);
    }

    entries.sort_by_key(|e| e.local_entry_range.offset);

    // Fix up the length of each local entry now that entries are ordered:
    // it ends at either the next entry's local offset or the central
    // directory's offset (step 5 of spec.md's parser procedure).
    let boundaries: Vec<u64> = entries
        .iter()
        .map(|e| e.local_entry_range.offset)
        .skip(1)
        .chain(std::iter::once(eocd.cd_offset))
        .collect();
    for (entry, next_offset) in entries.iter_mut().zip(boundaries.iter()) {
        let start = entry.local_entry_range.offset;
        let len = next_offset.saturating_sub(start);
        entry.local_entry_range = Range::new(start, len);
    }

    Ok(entries)
}

/// Convenience index from entry name to entry, used by the pairing step.
pub fn index_by_name(entries: &[ZipEntry]) -> HashMap<EntryKey, &ZipEntry> {
    entries.iter().map(|e| (e.key(), e)).collect()
}

/// Convenience multimap from CRC32 to entries sharing it, used as the
/// rename-detection fallback (spec.md §4.3 step 2).
pub fn index_by_crc(entries: &[ZipEntry]) -> HashMap<u32, Vec<&ZipEntry>> {
    let mut map: HashMap<u32, Vec<&ZipEntry>> = HashMap::new();
    for e in entries {
        map.entry(e.crc32).or_default().push(e);
    }
    map
}

/// Reads and, if necessary, inflates an entry's payload — used by the
/// `FILE_BY_FILE` detection (spec.md §4.3) to check whether a nested entry
/// is itself a ZIP archive, and by the oracle/byte-identity comparisons.
pub fn read_uncompressed_payload(source: &dyn crate::ByteSource, entry: &ZipEntry) -> Result<Vec<u8>> {
    let compressed = source.read_range(entry.compressed_data_range)?;
    match entry.compression_method {
        CompressionMethod::Stored => Ok(compressed),
        CompressionMethod::Deflate => {
            use flate2::read::DeflateDecoder;
            let mut decoder = DeflateDecoder::new(&compressed[..]);
            let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionMethod::Unknown(code) => Err(PatchError::UnsupportedArchive(format!(
            "unsupported compression method {code}"
        ))),
    }
}

/// Whether `payload` parses as a ZIP archive with at least one entry, used
/// by the recursive `FILE_BY_FILE` delta-format gate.
pub fn looks_like_nested_zip(payload: &[u8]) -> bool {
    let src = crate::byte_source::MemoryByteSource::new(payload.to_vec());
    matches!(parse(&src), Ok(entries) if !entries.is_empty())
}

struct Eocd {
    total_entries: u16,
    cd_size: u64,
    cd_offset: u64,
}

fn find_eocd(source: &dyn ByteSource) -> Result<u64> {
    let len = source.len();
    if len < EOCD_FIXED_SIZE {
        return Err(PatchError::CorruptArchive(
            "file too short to contain an EOCD record".to_string(),
        ));
    }
    let search_start = len.saturating_sub(MAX_EOCD_SEARCH + EOCD_FIXED_SIZE).max(0);
    let tail = source.read_range(Range::new(search_start, len - search_start))?;

    for i in (0..tail.len().saturating_sub(3)).rev() {
        if tail[i] == 0x50 && tail[i + 1] == 0x4b && tail[i + 2] == 0x05 && tail[i + 3] == 0x06 {
            return Ok(search_start + i as u64);
        }
    }
    Err(PatchError::CorruptArchive(
        "end-of-central-directory record not found".to_string(),
    ))
}

fn read_eocd(source: &dyn ByteSource, offset: u64) -> Result<Eocd> {
    let buf = source.read_range(Range::new(offset, EOCD_FIXED_SIZE))?;
    let mut cur = Cursor::new(&buf);
    let signature = read_u32_le(&mut cur)?;
    if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(PatchError::CorruptArchive(format!(
            "bad EOCD signature: {signature:#010x}"
        )));
    }
    skip(&mut cur, 6)?; // disk number, disk with CD start, entries on this disk
    let total_entries = read_u16_le(&mut cur)?;
    let cd_size = read_u32_le(&mut cur)? as u64;
    let cd_offset = read_u32_le(&mut cur)? as u64;
    Ok(Eocd {
        total_entries,
        cd_size,
        cd_offset,
    })
}

fn read_central_directory(buf: &[u8], count: usize) -> Result<Vec<CentralDirRecord>> {
    let mut cur = Cursor::new(buf);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let signature = read_u32_le(&mut cur)?;
        if signature != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(PatchError::CorruptArchive(format!(
                "bad central directory signature: {signature:#010x}"
            )));
        }
        skip(&mut cur, 4)?; // version made by, version needed
        let general_purpose_flags = read_u16_le(&mut cur)?;
        let compression_method = read_u16_le(&mut cur)?;
        skip(&mut cur, 4)?; // mod time/date
        let crc32 = read_u32_le(&mut cur)?;
        let compressed_size = read_u32_le(&mut cur)? as u64;
        let uncompressed_size = read_u32_le(&mut cur)? as u64;
        let file_name_len = read_u16_le(&mut cur)? as usize;
        let extra_len = read_u16_le(&mut cur)? as usize;
        let comment_len = read_u16_le(&mut cur)? as usize;
        skip(&mut cur, 8)?; // disk number, internal attrs, external attrs
        let local_header_offset = read_u32_le(&mut cur)? as u64;

        if local_header_offset == 0xFFFFFFFF
            || compressed_size == 0xFFFFFFFF
            || uncompressed_size == 0xFFFFFFFF
        {
            return Err(PatchError::UnsupportedArchive(
                "ZIP64 extra field required for this entry".to_string(),
            ));
        }

        let mut file_name = vec![0u8; file_name_len];
        cur.read_exact(&mut file_name)?;
        skip(&mut cur, (extra_len + comment_len) as u64)?;

        records.push(CentralDirRecord {
            general_purpose_flags,
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name,
            local_header_offset,
        });
    }
    Ok(records)
}

/// Reads the local header prefix to find the authoritative payload offset
/// (local and central-directory filename/extra lengths may legitimately
/// differ; the local header wins per spec.md §4.1 step 4).
fn resolve_local_entry(
    source: &dyn ByteSource,
    record: &CentralDirRecord,
    cd_offset: u64,
) -> Result<ZipEntry> {
    // Local header fixed part is 30 bytes up to and including extra length.
    let header_prefix_len = 30u64.min(cd_offset.saturating_sub(record.local_header_offset));
    let prefix = source.read_range(Range::new(record.local_header_offset, header_prefix_len))?;
    let mut cur = Cursor::new(&prefix);
    let signature = read_u32_le(&mut cur)?;
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(PatchError::CorruptArchive(format!(
            "bad local file header signature at offset {}: {:#010x}",
            record.local_header_offset, signature
        )));
    }
    skip(&mut cur, 22)?; // version, flags, method, time/date, crc32, sizes (all re-read from CD)
    let local_name_len = read_u16_le(&mut cur)? as u64;
    let local_extra_len = read_u16_le(&mut cur)? as u64;

    let compressed_data_offset =
        record.local_header_offset + 30 + local_name_len + local_extra_len;

    let raw_method = record.compression_method;
    // STORED entries mislabeled as DEFLATE: some writers store the payload
    // verbatim but leave the method byte at 8. Detected here by compressed
    // size equalling uncompressed size, normalized for planning purposes
    // while `raw_compression_method` preserves the original byte.
    let compression_method = if raw_method == 8 && record.compressed_size == record.uncompressed_size {
        CompressionMethod::Stored
    } else {
        CompressionMethod::from_code(raw_method)
    };

    let compressed_data_range = Range::new(compressed_data_offset, record.compressed_size);
    // local_entry_range.length is a placeholder here; parse() fixes it up
    // once all entries are known and sorted.
    let local_entry_range = Range::new(record.local_header_offset, 0);

    Ok(ZipEntry {
        compression_method,
        raw_compression_method: raw_method,
        crc32: record.crc32,
        uncompressed_size: record.uncompressed_size,
        file_name_bytes: record.file_name.clone(),
        use_utf8_encoding: record.general_purpose_flags & 0x0800 != 0,
        local_entry_range,
        compressed_data_range,
    })
}

fn read_u16_le(cur: &mut Cursor<&[u8]>) -> Result<u16> {
    let mut buf = [0u8; 2];
    cur.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le(cur: &mut Cursor<&[u8]>) -> Result<u32> {
    let mut buf = [0u8; 4];
    cur.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn skip(cur: &mut Cursor<&[u8]>, n: u64) -> Result<()> {
    let mut buf = vec![0u8; n as usize];
    cur.read_exact(&mut buf)?;
    Ok(())
}
