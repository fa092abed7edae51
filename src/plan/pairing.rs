//! Pairs new-archive entries with old-archive entries (spec.md §4.3 "Pairing").

use crate::zip_parser::{index_by_crc, index_by_name, ZipEntry};

/// For each new entry, finds its old counterpart: first by exact name, then
/// by shared uncompressed CRC32 (a rename without content change). New
/// entries with no counterpart are omitted — their bytes are covered later
/// as a gap in the delta-friendly new blob, per spec.md §4.3 step 3.
pub fn pair_entries(old: &[ZipEntry], new: &[ZipEntry]) -> Vec<(ZipEntry, ZipEntry)> {
    let by_name = index_by_name(old);
    let by_crc = index_by_crc(old);

    let mut pairs = Vec::new();
    for new_entry in new {
        if let Some(old_entry) = by_name.get(&new_entry.key()) {
            pairs.push(((*old_entry).clone(), new_entry.clone()));
            continue;
        }
        if let Some(candidates) = by_crc.get(&new_entry.crc32) {
            if let Some(old_entry) = candidates.first() {
                pairs.push(((*old_entry).clone(), new_entry.clone()));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::MemoryByteSource;
    use crate::test_support::build_test_zip;
    use crate::zip_parser::parse;

    #[test]
    fn pairs_by_exact_name() {
        let old = parse(&MemoryByteSource::new(build_test_zip(&[("a", b"1".to_vec(), false)]))).unwrap();
        let new = parse(&MemoryByteSource::new(build_test_zip(&[("a", b"2".to_vec(), false)]))).unwrap();
        let pairs = pair_entries(&old, &new);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.file_name_bytes, b"a");
        assert_eq!(pairs[0].1.file_name_bytes, b"a");
    }

    #[test]
    fn pairs_by_crc_when_renamed() {
        let old = parse(&MemoryByteSource::new(build_test_zip(&[("x/foo", b"same".to_vec(), false)]))).unwrap();
        let new = parse(&MemoryByteSource::new(build_test_zip(&[("y/foo", b"same".to_vec(), false)]))).unwrap();
        let pairs = pair_entries(&old, &new);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.file_name_bytes, b"x/foo");
        assert_eq!(pairs[0].1.file_name_bytes, b"y/foo");
    }

    #[test]
    fn unmatched_new_entry_yields_no_pair() {
        let old = parse(&MemoryByteSource::new(build_test_zip(&[("a", b"1".to_vec(), false)]))).unwrap();
        let new = parse(&MemoryByteSource::new(build_test_zip(&[("b", b"2".to_vec(), false)]))).unwrap();
        let pairs = pair_entries(&old, &new);
        assert!(pairs.is_empty());
    }
}
