//! # Chunk Reader/Writer
//!
//! Recursive descent over the nested "VOX " container.
//!
//! ## Layout
//!
//! ```text
//! File:
//! ├── "VOX " (4 bytes) - Magic number
//! ├── Version (4 bytes) - Must be 150
//! └── MAIN Chunk
//!
//! Chunk:
//! ├── id (4 bytes)
//! ├── body length N (4 bytes)
//! ├── children length M (4 bytes)
//! ├── body (N bytes)
//! └── children (M bytes of nested chunks)
//! ```
//!
//! Declared lengths must match the bytes actually consumed exactly. Lengths
//! are checked against the bytes still available before any buffer is
//! allocated, so a corrupt length field cannot reserve unbounded memory.

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};

use bytemuck::{Pod, Zeroable};

use crate::cursor::ByteWriter;
use crate::error::{VoxError, VoxResult};

/// File magic number.
pub const VOX_MAGIC: [u8; 4] = *b"VOX ";

/// The only supported file version.
pub const VOX_VERSION: u32 = 150;

/// Size of the magic + version prefix.
pub const FILE_HEADER_LEN: u64 = 8;

/// Size of a chunk header.
pub const CHUNK_HEADER_LEN: u64 = 12;

/// Deepest chunk nesting accepted on read.
const MAX_DEPTH: usize = 16;

/// Four-byte chunk tag.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// Root container.
    pub const MAIN: Self = Self(*b"MAIN");
    /// Model count (optional).
    pub const PACK: Self = Self(*b"PACK");
    /// Model dimensions.
    pub const SIZE: Self = Self(*b"SIZE");
    /// Packed voxel records.
    pub const XYZI: Self = Self(*b"XYZI");
    /// Palette.
    pub const RGBA: Self = Self(*b"RGBA");
    /// Palette index map.
    pub const IMAP: Self = Self(*b"IMAP");
    /// Transform node.
    pub const TRANSFORM: Self = Self(*b"nTRN");
    /// Group node.
    pub const GROUP: Self = Self(*b"nGRP");
    /// Shape node.
    pub const SHAPE: Self = Self(*b"nSHP");
    /// Layer.
    pub const LAYER: Self = Self(*b"LAYR");
    /// Material.
    pub const MATERIAL: Self = Self(*b"MATL");
    /// Render object.
    pub const RENDER: Self = Self(*b"rOBJ");

    /// Returns the raw tag bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({self})")
    }
}

/// On-disk chunk header. Length fields are stored little-endian.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ChunkHeader {
    /// Chunk tag.
    pub id: ChunkId,
    body_len: u32,
    children_len: u32,
}

impl ChunkHeader {
    /// Creates a header.
    #[must_use]
    pub const fn new(id: ChunkId, body_len: u32, children_len: u32) -> Self {
        Self {
            id,
            body_len: body_len.to_le(),
            children_len: children_len.to_le(),
        }
    }

    /// Declared body length.
    #[inline]
    #[must_use]
    pub const fn body_len(&self) -> u32 {
        u32::from_le(self.body_len)
    }

    /// Declared total length of all children.
    #[inline]
    #[must_use]
    pub const fn children_len(&self) -> u32 {
        u32::from_le(self.children_len)
    }
}

/// A parsed chunk with its body and nested children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk tag.
    pub id: ChunkId,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Nested chunks, in file order.
    pub children: Vec<Chunk>,
    /// Absolute offset of the header in the source stream (0 for built chunks).
    pub offset: u64,
}

impl Chunk {
    /// Creates a leaf chunk.
    #[must_use]
    pub fn new(id: ChunkId, body: Vec<u8>) -> Self {
        Self { id, body, children: Vec::new(), offset: 0 }
    }

    /// Creates a chunk with an empty body and the given children.
    #[must_use]
    pub fn container(id: ChunkId, children: Vec<Chunk>) -> Self {
        Self { id, body: Vec::new(), children, offset: 0 }
    }

    /// Total serialized size of all children.
    #[must_use]
    pub fn children_len(&self) -> u64 {
        self.children.iter().map(Chunk::encoded_len).sum()
    }

    /// Serialized size of this chunk: header, body and children.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        CHUNK_HEADER_LEN + self.body.len() as u64 + self.children_len()
    }

    /// Appends this chunk (and its children) to `out`.
    ///
    /// The children length is computed before the header is emitted.
    pub fn write_into(&self, out: &mut ByteWriter) -> VoxResult<()> {
        let header = ChunkHeader::new(
            self.id,
            length_field(self.id, "body", self.body.len() as u64)?,
            length_field(self.id, "children", self.children_len())?,
        );
        out.write_pod(&header);
        out.write_bytes(&self.body);
        for child in &self.children {
            child.write_into(out)?;
        }
        Ok(())
    }

    /// Serializes this chunk into a fresh buffer.
    pub fn to_bytes(&self) -> VoxResult<Vec<u8>> {
        let mut out = ByteWriter::with_capacity(usize::try_from(self.encoded_len()).unwrap_or(0));
        self.write_into(&mut out)?;
        Ok(out.into_inner())
    }
}

fn length_field(chunk: ChunkId, field: &'static str, len: u64) -> VoxResult<u32> {
    u32::try_from(len).map_err(|_| VoxError::ChunkLengthMismatch {
        chunk,
        field,
        offset: 0,
        expected: u64::from(u32::MAX),
        actual: len,
    })
}

/// Encodes a complete file: magic, version and the root chunk.
///
/// This is the buffered strategy: the root's children length is known
/// before its header is written.
pub fn encode_file(root: &Chunk) -> VoxResult<Vec<u8>> {
    let mut out = ByteWriter::with_capacity(
        usize::try_from(FILE_HEADER_LEN + root.encoded_len()).unwrap_or(0),
    );
    out.write_bytes(&VOX_MAGIC);
    out.write_u32(VOX_VERSION);
    root.write_into(&mut out)?;
    Ok(out.into_inner())
}

/// Reads chunks from a seekable stream.
pub struct ChunkReader<R> {
    reader: R,
    position: u64,
    end: u64,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Wraps a stream positioned at the start of a file.
    ///
    /// The stream length is measured once so every declared length can be
    /// checked against it.
    pub fn new(mut reader: R) -> VoxResult<Self> {
        let position = reader
            .stream_position()
            .map_err(|e| VoxError::io("querying stream position", 0, e))?;
        let end = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| VoxError::io("measuring stream length", position, e))?;
        reader
            .seek(SeekFrom::Start(position))
            .map_err(|e| VoxError::io("rewinding stream", position, e))?;
        Ok(Self { reader, position, end })
    }

    /// Absolute offset of the next read.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left in the stream.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }

    /// Consumes the reader, returning the stream.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_exact(&mut self, buf: &mut [u8], op: &'static str) -> VoxResult<()> {
        if buf.len() as u64 > self.remaining() {
            return Err(VoxError::Truncated {
                context: op,
                offset: self.position,
                needed: buf.len() as u64,
                remaining: self.remaining(),
            });
        }
        self.reader
            .read_exact(buf)
            .map_err(|e| VoxError::io(op, self.position, e))?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Reads and validates the magic number and version.
    pub fn read_file_header(&mut self) -> VoxResult<()> {
        let mut magic = [0u8; 4];
        self.read_exact(&mut magic, "reading magic number")?;
        if magic != VOX_MAGIC {
            return Err(VoxError::MagicMismatch { found: magic });
        }

        let mut version = [0u8; 4];
        self.read_exact(&mut version, "reading version")?;
        let version = u32::from_le_bytes(version);
        if version != VOX_VERSION {
            return Err(VoxError::UnsupportedVersion { found: version });
        }
        Ok(())
    }

    /// Reads one chunk (with all of its children) from the current position.
    pub fn read_chunk(&mut self) -> VoxResult<Chunk> {
        let limit = self.remaining();
        self.read_chunk_within(limit, 0)
    }

    /// Reads the root chunk, which must be `MAIN` and must end the stream.
    pub fn read_root(&mut self) -> VoxResult<Chunk> {
        let offset = self.position;
        let root = self.read_chunk()?;
        if root.id != ChunkId::MAIN {
            return Err(VoxError::UnexpectedChunk {
                chunk: root.id,
                offset,
                reason: "root chunk must be MAIN",
            });
        }
        if self.remaining() != 0 {
            return Err(VoxError::ChunkLengthMismatch {
                chunk: ChunkId::MAIN,
                field: "file",
                offset,
                expected: root.encoded_len(),
                actual: root.encoded_len() + self.remaining(),
            });
        }
        Ok(root)
    }

    /// Reads a chunk that may occupy at most `limit` bytes.
    fn read_chunk_within(&mut self, limit: u64, depth: usize) -> VoxResult<Chunk> {
        let offset = self.position;
        if limit < CHUNK_HEADER_LEN {
            return Err(VoxError::Truncated {
                context: "reading chunk header",
                offset,
                needed: CHUNK_HEADER_LEN,
                remaining: limit,
            });
        }

        let mut raw = [0u8; CHUNK_HEADER_LEN as usize];
        self.read_exact(&mut raw, "reading chunk header")?;
        let header: ChunkHeader = bytemuck::pod_read_unaligned(&raw);
        let id = header.id;
        let body_len = u64::from(header.body_len());
        let children_len = u64::from(header.children_len());

        let available = limit - CHUNK_HEADER_LEN;
        if body_len > available {
            return Err(VoxError::ChunkLengthMismatch {
                chunk: id,
                field: "body",
                offset,
                expected: body_len,
                actual: available,
            });
        }

        let mut body = vec![0u8; body_len as usize];
        self.read_exact(&mut body, "reading chunk body")?;

        let available = available - body_len;
        if children_len > available {
            return Err(VoxError::ChunkLengthMismatch {
                chunk: id,
                field: "children",
                offset,
                expected: children_len,
                actual: available,
            });
        }
        if children_len > 0 && depth >= MAX_DEPTH {
            return Err(VoxError::UnexpectedChunk {
                chunk: id,
                offset,
                reason: "chunk nesting too deep",
            });
        }

        let mut children = Vec::new();
        let mut consumed = 0u64;
        while consumed < children_len {
            let budget = children_len - consumed;
            if budget < CHUNK_HEADER_LEN {
                return Err(VoxError::ChunkLengthMismatch {
                    chunk: id,
                    field: "children",
                    offset,
                    expected: children_len,
                    actual: consumed,
                });
            }
            let child = self.read_chunk_within(budget, depth + 1)?;
            consumed += child.encoded_len();
            children.push(child);
        }

        tracing::trace!(chunk = %id, offset, body_len, children = children.len(), "read chunk");

        Ok(Chunk { id, body, children, offset })
    }
}

/// Streams chunks to a seekable sink, patching the root length at the end.
///
/// This is the patch strategy: the `MAIN` header is written with a
/// placeholder children length, children are streamed one by one, and the
/// real total is written back with a single seek once it is known.
pub struct ChunkWriter<W> {
    writer: W,
    start: u64,
    position: u64,
    children_len: u64,
    open: bool,
}

impl<W: Write + Seek> ChunkWriter<W> {
    /// Wraps a sink. The file is written starting at its current position.
    pub fn new(mut writer: W) -> VoxResult<Self> {
        let start = writer
            .stream_position()
            .map_err(|e| VoxError::io("querying stream position", 0, e))?;
        Ok(Self { writer, start, position: start, children_len: 0, open: false })
    }

    fn write_all(&mut self, bytes: &[u8], op: &'static str) -> VoxResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| VoxError::io(op, self.position, e))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Writes the file header and a `MAIN` header with a placeholder length.
    pub fn begin(&mut self) -> VoxResult<()> {
        let mut prefix = ByteWriter::with_capacity((FILE_HEADER_LEN + CHUNK_HEADER_LEN) as usize);
        prefix.write_bytes(&VOX_MAGIC);
        prefix.write_u32(VOX_VERSION);
        prefix.write_pod(&ChunkHeader::new(ChunkId::MAIN, 0, 0));
        self.write_all(prefix.as_slice(), "writing file header")?;
        self.open = true;
        Ok(())
    }

    /// Streams one child of `MAIN`.
    pub fn write_child(&mut self, chunk: &Chunk) -> VoxResult<()> {
        if !self.open {
            return Err(VoxError::UnexpectedChunk {
                chunk: chunk.id,
                offset: self.position,
                reason: "child written before MAIN header",
            });
        }
        let bytes = chunk.to_bytes()?;
        self.write_all(&bytes, "writing chunk")?;
        self.children_len += bytes.len() as u64;
        Ok(())
    }

    /// Patches the `MAIN` children length and returns the sink.
    pub fn finish(mut self) -> VoxResult<W> {
        let children_len = length_field(ChunkId::MAIN, "children", self.children_len)?;
        let patch_at = self.start + FILE_HEADER_LEN + 8;
        self.writer
            .seek(SeekFrom::Start(patch_at))
            .map_err(|e| VoxError::io("seeking to MAIN children length", patch_at, e))?;
        self.writer
            .write_all(&children_len.to_le_bytes())
            .map_err(|e| VoxError::io("patching MAIN children length", patch_at, e))?;
        self.writer
            .seek(SeekFrom::Start(self.position))
            .map_err(|e| VoxError::io("seeking to end of file", self.position, e))?;
        self.writer
            .flush()
            .map_err(|e| VoxError::io("flushing", self.position, e))?;
        tracing::debug!(bytes = self.position - self.start, "patched MAIN children length");
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_root() -> Chunk {
        Chunk::container(
            ChunkId::MAIN,
            vec![
                Chunk::new(ChunkId::SIZE, vec![1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]),
                Chunk::new(ChunkId::XYZI, vec![1, 0, 0, 0, 0, 0, 0, 5]),
            ],
        )
    }

    #[test]
    fn test_header_is_twelve_bytes() {
        assert_eq!(std::mem::size_of::<ChunkHeader>(), 12);
        let header = ChunkHeader::new(ChunkId::SIZE, 12, 0);
        assert_eq!(bytemuck::bytes_of(&header), b"SIZE\x0c\x00\x00\x00\x00\x00\x00\x00");
    }

    #[test]
    fn test_chunk_id_display() {
        assert_eq!(ChunkId::TRANSFORM.to_string(), "nTRN");
        assert_eq!(ChunkId([b'A', 0, b'B', b' ']).to_string(), "A\\x00B ");
    }

    #[test]
    fn test_read_back_written_file() {
        let root = sample_root();
        let bytes = encode_file(&root).unwrap();
        assert_eq!(bytes.len() as u64, FILE_HEADER_LEN + root.encoded_len());

        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        reader.read_file_header().unwrap();
        let parsed = reader.read_root().unwrap();
        assert_eq!(parsed.children.len(), 2);
        assert_eq!(parsed.children[0].id, ChunkId::SIZE);
        assert_eq!(parsed.children[1].body, vec![1, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(parsed.children[0].offset, 20);
    }

    #[test]
    fn test_patch_strategy_matches_buffered() {
        let root = sample_root();
        let buffered = encode_file(&root).unwrap();

        let mut writer = ChunkWriter::new(Cursor::new(Vec::new())).unwrap();
        writer.begin().unwrap();
        for child in &root.children {
            writer.write_child(child).unwrap();
        }
        let patched = writer.finish().unwrap().into_inner();

        assert_eq!(patched, buffered);
    }

    #[test]
    fn test_children_overshoot_is_rejected() {
        let mut bytes = encode_file(&sample_root()).unwrap();
        // MAIN children length lives at offset 16.
        let declared = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        bytes[16..20].copy_from_slice(&(declared + 1).to_le_bytes());

        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        reader.read_file_header().unwrap();
        let err = reader.read_root().unwrap_err();
        assert!(matches!(
            err,
            VoxError::ChunkLengthMismatch { field: "children", .. }
        ));
    }

    #[test]
    fn test_body_length_past_end_is_rejected_before_allocation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MAIN");
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        let err = reader.read_chunk().unwrap_err();
        assert!(matches!(
            err,
            VoxError::ChunkLengthMismatch { field: "body", expected, actual: 0, .. }
                if expected == u64::from(u32::MAX)
        ));
    }

    #[test]
    fn test_root_must_be_main() {
        let bytes = encode_file(&Chunk::new(ChunkId::SIZE, vec![0; 12])).unwrap();
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        reader.read_file_header().unwrap();
        assert!(matches!(
            reader.read_root(),
            Err(VoxError::UnexpectedChunk { chunk: ChunkId::SIZE, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode_file(&sample_root()).unwrap();
        bytes.push(0);
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        reader.read_file_header().unwrap();
        assert!(matches!(
            reader.read_root(),
            Err(VoxError::ChunkLengthMismatch { field: "file", .. })
        ));
    }

    #[test]
    fn test_magic_and_version() {
        let mut reader = ChunkReader::new(Cursor::new(b"RIFF\x96\x00\x00\x00".to_vec())).unwrap();
        assert!(matches!(
            reader.read_file_header(),
            Err(VoxError::MagicMismatch { found }) if &found == b"RIFF"
        ));

        let mut reader = ChunkReader::new(Cursor::new(b"VOX \xc8\x00\x00\x00".to_vec())).unwrap();
        assert!(matches!(
            reader.read_file_header(),
            Err(VoxError::UnsupportedVersion { found: 200 })
        ));
    }
}
