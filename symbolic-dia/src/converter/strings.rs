use std::convert::TryFrom;

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::format::raw::{StringOffset, EMPTY_STRING, OVERFLOW_STRING, OVERFLOW_STRING_VALUE};

/// A deduplicating table of length-prefixed strings.
///
/// Every string is stored once as a little-endian `u32` length followed by its UTF-8 bytes,
/// and is referenced by the offset of its length prefix.
#[derive(Debug)]
pub struct StringTable {
    /// The concatenation of all strings that have been added.
    bytes: Vec<u8>,
    /// A map from the strings that have been added to their offset into `bytes`.
    offsets: IndexMap<String, StringOffset, FnvBuildHasher>,
}

impl Default for StringTable {
    fn default() -> Self {
        let mut table = Self {
            bytes: Vec::new(),
            offsets: IndexMap::default(),
        };
        let empty = table.insert("");
        let overflow = table.insert(OVERFLOW_STRING_VALUE);
        debug_assert_eq!(empty, EMPTY_STRING);
        debug_assert_eq!(overflow, OVERFLOW_STRING);
        table
    }
}

impl StringTable {
    /// Insert a string into this table.
    ///
    /// If the string was already present, it is not added again and its existing offset is
    /// returned. Strings too long for a `u32` length prefix map to [`OVERFLOW_STRING`].
    pub fn insert(&mut self, s: &str) -> StringOffset {
        if let Some(offset) = self.offsets.get(s) {
            return *offset;
        }
        let len = match encode_len(s.len()) {
            Some(len) => len,
            None => {
                log::warn!("string of {} bytes does not fit, storing placeholder", s.len());
                return OVERFLOW_STRING;
            }
        };

        let offset = StringOffset(self.bytes.len() as u64);
        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        self.offsets.insert(s.to_owned(), offset);
        offset
    }

    /// The number of distinct strings, including the two reserved ones.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Always `false`, the reserved strings are inserted on creation.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The serialized string table.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn encode_len(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_offsets() {
        let table = StringTable::default();
        assert_eq!(table.len(), 2);
        assert_eq!(&table.as_bytes()[0..4], &[0, 0, 0, 0]);
        assert_eq!(&table.as_bytes()[4..8], &[10, 0, 0, 0]);
        assert_eq!(&table.as_bytes()[8..], b"[overflow]");
    }

    #[test]
    fn test_dedup() {
        let mut table = StringTable::default();
        let main = table.insert("main");
        let size = table.as_bytes().len();

        assert_eq!(main, StringOffset(18));
        assert_eq!(table.insert("main"), main);
        assert_eq!(table.insert(""), EMPTY_STRING);
        assert_eq!(table.insert("[overflow]"), OVERFLOW_STRING);
        assert_eq!(table.as_bytes().len(), size);

        let other = table.insert("other");
        assert_eq!(other, StringOffset(size as u64));
        assert_eq!(table.len(), 4);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_overflowing_len() {
        assert_eq!(encode_len(u32::MAX as usize), Some(u32::MAX));
        assert_eq!(encode_len(u32::MAX as usize + 1), None);
    }
}
