//! # Dictionary Codec
//!
//! Ordered string key/value pairs, the attribute bag used inside most chunk
//! bodies.
//!
//! ```text
//! DICT:
//! ├── count (4 bytes)
//! └── count × { STRING key, STRING value }
//!
//! STRING:
//! ├── length (4 bytes)
//! └── bytes (no terminator)
//! ```
//!
//! No deduplication or key validation happens here; the record parsers
//! decide which keys they accept.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{VoxError, VoxResult};

/// Ordered list of `(key, value)` string pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dict {
    entries: Vec<(String, String)>,
}

impl Dict {
    /// Creates an empty dictionary.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the dictionary has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry (duplicates are kept).
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Builder-style [`Dict::push`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Value of the first entry with `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<(&str, &str)> {
        self.entries.get(index).map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Decodes a dictionary at the cursor.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> VoxResult<Self> {
        let count = cursor.read_u32("dictionary entry count")?;
        // Every entry needs at least two length prefixes.
        let min_bytes = u64::from(count) * 8;
        if min_bytes > cursor.remaining() as u64 {
            return Err(VoxError::Truncated {
                context: "dictionary entries",
                offset: cursor.offset(),
                needed: min_bytes,
                remaining: cursor.remaining() as u64,
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = read_string(cursor, "dictionary key")?;
            let value = read_string(cursor, "dictionary value")?;
            entries.push((key, value));
        }
        Ok(Self { entries })
    }

    /// Encodes the dictionary; the exact inverse of [`Dict::decode`].
    pub fn encode(&self, out: &mut ByteWriter) {
        out.write_len(self.entries.len());
        for (key, value) in &self.entries {
            write_string(out, key);
            write_string(out, value);
        }
    }

    /// Size of the encoded dictionary in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        4 + self
            .entries
            .iter()
            .map(|(k, v)| 8 + k.len() + v.len())
            .sum::<usize>()
    }
}

impl FromIterator<(String, String)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string(cursor: &mut ByteCursor<'_>, context: &'static str) -> VoxResult<String> {
    let len = cursor.read_u32(context)?;
    let offset = cursor.offset();
    let bytes = cursor.read_bytes(len as usize, context)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| VoxError::InvalidText { context, offset })
}

/// Writes a length-prefixed string.
pub fn write_string(out: &mut ByteWriter, value: &str) {
    out.write_len(value.len());
    out.write_bytes(value.as_bytes());
}
