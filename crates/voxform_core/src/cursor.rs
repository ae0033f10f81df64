//! # Byte Cursor
//!
//! Bounds-checked little-endian reading and writing of chunk bodies.
//!
//! ## Design
//!
//! - Every read checks the remaining length first and fails with
//!   [`VoxError::Truncated`] instead of trusting length fields
//! - Offsets in errors are absolute file offsets (`base + position`)
//! - The writer grows a `Vec<u8>`; chunk sizes are computed from it, never
//!   guessed up front

use bytemuck::{bytes_of, Pod};

use crate::chunk::ChunkId;
use crate::error::{VoxError, VoxResult};

/// Reads little-endian values from a borrowed byte slice.
pub struct ByteCursor<'a> {
    buffer: &'a [u8],
    position: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor over `buffer`, which starts at absolute offset `base`.
    #[must_use]
    pub const fn new(buffer: &'a [u8], base: u64) -> Self {
        Self { buffer, position: 0, base }
    }

    /// Returns the number of bytes consumed so far.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the absolute offset of the next read.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.base + self.position as u64
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns true if every byte has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize, context: &'static str) -> VoxResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(VoxError::Truncated {
                context,
                offset: self.offset(),
                needed: len as u64,
                remaining: self.remaining() as u64,
            });
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize, context: &'static str) -> VoxResult<&'a [u8]> {
        self.take(len, context)
    }

    /// Reads a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> VoxResult<[u8; N]> {
        let bytes = self.take(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self, context: &'static str) -> VoxResult<u8> {
        Ok(self.take(1, context)?[0])
    }

    /// Reads a u32 in little-endian format.
    pub fn read_u32(&mut self, context: &'static str) -> VoxResult<u32> {
        self.read_array::<4>(context).map(u32::from_le_bytes)
    }

    /// Reads an i32 in little-endian format.
    pub fn read_i32(&mut self, context: &'static str) -> VoxResult<i32> {
        self.read_array::<4>(context).map(i32::from_le_bytes)
    }

    /// Reads a Pod type directly.
    pub fn read_pod<T: Pod>(&mut self, context: &'static str) -> VoxResult<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.take(size, context)?;
        // Length was checked above, so this cannot fail on size.
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| VoxError::Truncated {
            context,
            offset: self.offset(),
            needed: size as u64,
            remaining: bytes.len() as u64,
        })
    }

    /// Fails unless the whole body of `chunk` was consumed.
    ///
    /// `header_offset` is the absolute offset of the chunk header, used in
    /// the error.
    pub fn expect_end(&self, chunk: ChunkId, header_offset: u64) -> VoxResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        Err(VoxError::ChunkLengthMismatch {
            chunk,
            field: "body",
            offset: header_offset,
            expected: self.buffer.len() as u64,
            actual: self.position as u64,
        })
    }
}

/// Writes little-endian values into a growable buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates an empty writer with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: Vec::with_capacity(capacity) }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i32 in little-endian format.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.buffer.extend_from_slice(bytes_of(value));
    }

    /// Writes a length as a u32 count.
    ///
    /// Lengths above `u32::MAX` cannot be represented in the format; they
    /// saturate and are caught by the chunk size checks on read.
    #[inline]
    pub fn write_len(&mut self, len: usize) {
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xff, 0xff, 0xff, 0xff, 0x07];
        let mut cursor = ByteCursor::new(&data, 100);
        assert_eq!(cursor.read_u32("a").unwrap(), 0x0403_0201);
        assert_eq!(cursor.read_i32("b").unwrap(), -1);
        assert_eq!(cursor.offset(), 108);
        assert_eq!(cursor.read_u8("c").unwrap(), 7);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_short_read_fails_without_advancing() {
        let data = [1, 2, 3];
        let mut cursor = ByteCursor::new(&data, 40);
        let err = cursor.read_u32("count").unwrap_err();
        match err {
            VoxError::Truncated { context, offset, needed, remaining } => {
                assert_eq!(context, "count");
                assert_eq!(offset, 40);
                assert_eq!(needed, 4);
                assert_eq!(remaining, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_expect_end_reports_leftover() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data, 0);
        cursor.read_u32("x").unwrap();
        let err = cursor.expect_end(ChunkId::SIZE, 20).unwrap_err();
        assert!(matches!(
            err,
            VoxError::ChunkLengthMismatch { field: "body", expected: 8, actual: 4, offset: 20, .. }
        ));
    }

    #[test]
    fn test_writer_layout() {
        let mut writer = ByteWriter::new();
        writer.write_u32(150);
        writer.write_i32(-1);
        writer.write_bytes(b"ab");
        writer.write_u8(9);
        assert_eq!(
            writer.as_slice(),
            &[150, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, b'a', b'b', 9]
        );
    }
}
