//! # Codec Error Types
//!
//! All errors that can occur while reading or writing voxel model files.
//!
//! Every parse error carries enough context (chunk id, byte offset,
//! expected/actual values) to pinpoint the malformed region.

use std::io;

use thiserror::Error;

use crate::chunk::ChunkId;
use crate::grid::GridSize;

/// Errors that can occur in the voxel model codec.
#[derive(Error, Debug)]
pub enum VoxError {
    /// The underlying stream failed.
    #[error("I/O error while {op} at offset {offset}: {source}")]
    Io {
        /// Operation that was in progress.
        op: &'static str,
        /// Absolute stream offset of the operation.
        offset: u64,
        /// Original stream error.
        #[source]
        source: io::Error,
    },

    /// The file does not start with `"VOX "`.
    #[error("magic mismatch: expected \"VOX \", found {found:?}")]
    MagicMismatch {
        /// The four bytes actually found.
        found: [u8; 4],
    },

    /// The file version is not 150.
    #[error("unsupported version {found}, only 150 is supported")]
    UnsupportedVersion {
        /// Version found in the header.
        found: u32,
    },

    /// A declared length disagrees with the bytes actually consumed.
    #[error("{chunk} chunk at offset {offset}: {field} length mismatch (expected {expected} bytes, got {actual})")]
    ChunkLengthMismatch {
        /// Chunk the length belongs to.
        chunk: ChunkId,
        /// Which length field disagreed (`"body"`, `"children"`, `"file"`).
        field: &'static str,
        /// Absolute offset of the chunk header.
        offset: u64,
        /// Length declared (or required).
        expected: u64,
        /// Length actually found.
        actual: u64,
    },

    /// A read would run past the end of the available bytes.
    #[error("truncated {context} at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// What was being read.
        context: &'static str,
        /// Absolute offset of the read.
        offset: u64,
        /// Bytes required.
        needed: u64,
        /// Bytes left.
        remaining: u64,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 in {context} at offset {offset}")]
    InvalidText {
        /// What was being read.
        context: &'static str,
        /// Absolute offset of the string bytes.
        offset: u64,
    },

    /// The input is larger than the configured limit.
    #[error("file is {size} bytes, limit is {limit}")]
    FileTooLarge {
        /// Stream length.
        size: u64,
        /// Configured `max_file_size`.
        limit: u64,
    },

    /// A chunk appeared where it is not allowed.
    #[error("unexpected {chunk} chunk at offset {offset}: {reason}")]
    UnexpectedChunk {
        /// Offending chunk.
        chunk: ChunkId,
        /// Absolute offset of the chunk header.
        offset: u64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A dictionary held a key the record does not know.
    #[error("unknown attribute in {chunk} chunk: {key}={value}")]
    UnknownAttributeKey {
        /// Chunk being parsed.
        chunk: ChunkId,
        /// Unrecognized key.
        key: String,
        /// Its value.
        value: String,
    },

    /// A known key carried a value that does not parse.
    #[error("invalid value in {chunk} chunk: {key}={value} ({reason})")]
    InvalidAttributeValue {
        /// Chunk being parsed.
        chunk: ChunkId,
        /// Attribute key.
        key: String,
        /// Raw attribute value.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A render object had the wrong key sequence or an unknown type.
    #[error("malformed render object {render_type:?}: {reason}")]
    MalformedRenderObject {
        /// Value of the `_type` key (empty if absent).
        render_type: String,
        /// What was wrong.
        reason: String,
    },

    /// A scene node violated a fixed-layout rule.
    #[error("malformed {chunk} node {node_id}: {reason}")]
    MalformedNode {
        /// Node chunk kind.
        chunk: ChunkId,
        /// Node id as stored in the file.
        node_id: i32,
        /// What was wrong.
        reason: String,
    },

    /// Two scene nodes share an id.
    #[error("duplicate scene node id {id}")]
    DuplicateNodeId {
        /// The repeated id.
        id: i32,
    },

    /// A scene node references an id that does not exist.
    #[error("scene node {from} references missing node {to}")]
    DanglingNodeReference {
        /// Referencing node (file id).
        from: i32,
        /// Missing node (file id).
        to: i32,
    },

    /// A voxel lies outside its model's grid.
    #[error("voxel ({x}, {y}, {z}) outside grid {size}")]
    VoxelOutOfBounds {
        /// X coordinate.
        x: u32,
        /// Y coordinate.
        y: u32,
        /// Z coordinate.
        z: u32,
        /// Grid dimensions.
        size: GridSize,
    },

    /// A stored voxel used the reserved color index 0.
    #[error("voxel ({x}, {y}, {z}) uses reserved color index 0")]
    ReservedColorIndex {
        /// X coordinate.
        x: u8,
        /// Y coordinate.
        y: u8,
        /// Z coordinate.
        z: u8,
    },

    /// Two voxels of a model being written share a cell.
    #[error("voxel ({x}, {y}, {z}) appears more than once")]
    DuplicateVoxel {
        /// X coordinate.
        x: u8,
        /// Y coordinate.
        y: u8,
        /// Z coordinate.
        z: u8,
    },

    /// Attempted to write a model with no voxels.
    #[error("model has no voxels")]
    EmptyModel,

    /// More distinct colors than the palette can hold.
    #[error("too many colors: the palette holds at most {limit} distinct colors")]
    TooManyColors {
        /// Usable palette slots.
        limit: usize,
    },

    /// More than one shape node while single-model semantics were requested.
    #[error("multi-model files are not supported ({shapes} shape nodes)")]
    MultiModelUnsupported {
        /// Number of shape nodes found.
        shapes: usize,
    },

    /// The file holds no voxel model to flatten.
    #[error("file contains no voxel model")]
    MissingModel,

    /// Invalid codec configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VoxError {
    /// Wraps a stream failure with the operation and offset it happened at.
    #[must_use]
    pub fn io(op: &'static str, offset: u64, source: io::Error) -> Self {
        Self::Io { op, offset, source }
    }

    /// Returns true if the error came from the underlying stream.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Result type for codec operations.
pub type VoxResult<T> = Result<T, VoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = VoxError::ChunkLengthMismatch {
            chunk: ChunkId::MAIN,
            field: "children",
            offset: 8,
            expected: 25,
            actual: 24,
        };
        let msg = err.to_string();
        assert!(msg.contains("MAIN"));
        assert!(msg.contains("offset 8"));
        assert!(msg.contains("expected 25"));
        assert!(msg.contains("got 24"));
    }

    #[test]
    fn test_io_wrapping_keeps_source() {
        let err = VoxError::io(
            "reading chunk header",
            12,
            io::Error::new(io::ErrorKind::UnexpectedEof, "eof"),
        );
        assert!(err.is_io());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("offset 12"));
    }
}
