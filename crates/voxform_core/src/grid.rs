//! # Voxel Payload
//!
//! One model is a `SIZE` chunk followed by an `XYZI` chunk.
//!
//! ```text
//! SIZE: width (x), height (y), length (z)       3 × u32
//! XYZI: count (u32), count × { x, y, z, i }     4 + 4 × count bytes
//! PACK: model count (u32)                       optional, before the models
//! ```
//!
//! Color index 0 means "empty" and never appears in a stored record.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::chunk::{Chunk, ChunkId, CHUNK_HEADER_LEN};
use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{VoxError, VoxResult};

/// Model dimensions in voxels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridSize {
    /// Extent along x.
    pub width: u32,
    /// Extent along y.
    pub height: u32,
    /// Extent along z.
    pub length: u32,
}

impl GridSize {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32, length: u32) -> Self {
        Self { width, height, length }
    }

    /// Whether a cell lies inside the grid.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: u32, y: u32, z: u32) -> bool {
        x < self.width && y < self.height && z < self.length
    }

    /// Parses a `SIZE` chunk.
    pub fn decode(chunk: &Chunk) -> VoxResult<Self> {
        let mut cursor = ByteCursor::new(&chunk.body, chunk.offset + CHUNK_HEADER_LEN);
        let size = Self {
            width: cursor.read_u32("model width")?,
            height: cursor.read_u32("model height")?,
            length: cursor.read_u32("model length")?,
        };
        cursor.expect_end(chunk.id, chunk.offset)?;
        Ok(size)
    }

    /// Serializes a `SIZE` chunk.
    #[must_use]
    pub fn encode(&self) -> Chunk {
        let mut out = ByteWriter::with_capacity(12);
        out.write_u32(self.width);
        out.write_u32(self.height);
        out.write_u32(self.length);
        Chunk::new(ChunkId::SIZE, out.into_inner())
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.length)
    }
}

/// Packed voxel record as stored in `XYZI`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct VoxelRecord {
    /// X coordinate.
    pub x: u8,
    /// Y coordinate.
    pub y: u8,
    /// Z coordinate.
    pub z: u8,
    /// Palette index, 1..=255.
    pub color_index: u8,
}

impl VoxelRecord {
    /// Creates a record.
    #[inline]
    #[must_use]
    pub const fn new(x: u8, y: u8, z: u8, color_index: u8) -> Self {
        Self { x, y, z, color_index }
    }
}

/// One voxel model: dimensions and records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelGrid {
    /// Dimensions.
    pub size: GridSize,
    /// Records in file order.
    pub voxels: Vec<VoxelRecord>,
}

impl VoxelGrid {
    /// Creates a grid.
    #[must_use]
    pub fn new(size: GridSize, voxels: Vec<VoxelRecord>) -> Self {
        Self { size, voxels }
    }

    /// Checks every record against the grid and the reserved index.
    pub fn check_records(&self) -> VoxResult<()> {
        for voxel in &self.voxels {
            let (x, y, z) = (u32::from(voxel.x), u32::from(voxel.y), u32::from(voxel.z));
            if !self.size.contains(x, y, z) {
                return Err(VoxError::VoxelOutOfBounds { x, y, z, size: self.size });
            }
            if voxel.color_index == 0 {
                return Err(VoxError::ReservedColorIndex { x: voxel.x, y: voxel.y, z: voxel.z });
            }
        }
        Ok(())
    }

    /// Parses a `SIZE` + `XYZI` pair.
    pub fn decode(size: &Chunk, xyzi: &Chunk) -> VoxResult<Self> {
        let grid_size = GridSize::decode(size)?;

        let mut cursor = ByteCursor::new(&xyzi.body, xyzi.offset + CHUNK_HEADER_LEN);
        let count = cursor.read_u32("voxel count")?;
        let expected = 4 + 4 * u64::from(count);
        if expected != xyzi.body.len() as u64 {
            return Err(VoxError::ChunkLengthMismatch {
                chunk: xyzi.id,
                field: "body",
                offset: xyzi.offset,
                expected,
                actual: xyzi.body.len() as u64,
            });
        }

        let mut voxels = Vec::with_capacity(count as usize);
        for _ in 0..count {
            voxels.push(cursor.read_pod::<VoxelRecord>("voxel record")?);
        }
        cursor.expect_end(xyzi.id, xyzi.offset)?;

        let grid = Self { size: grid_size, voxels };
        grid.check_records()?;
        tracing::trace!(size = %grid.size, voxels = grid.voxels.len(), "decoded model");
        Ok(grid)
    }

    /// Serializes the `SIZE` and `XYZI` chunks, in that order.
    ///
    /// Empty models are rejected.
    pub fn encode(&self) -> VoxResult<[Chunk; 2]> {
        if self.voxels.is_empty() {
            return Err(VoxError::EmptyModel);
        }
        self.check_records()?;

        let mut out = ByteWriter::with_capacity(4 + 4 * self.voxels.len());
        out.write_len(self.voxels.len());
        for voxel in &self.voxels {
            out.write_pod(voxel);
        }
        Ok([self.size.encode(), Chunk::new(ChunkId::XYZI, out.into_inner())])
    }
}

/// Parses a `PACK` chunk.
pub fn decode_pack(chunk: &Chunk) -> VoxResult<u32> {
    let mut cursor = ByteCursor::new(&chunk.body, chunk.offset + CHUNK_HEADER_LEN);
    let models = cursor.read_u32("model count")?;
    cursor.expect_end(chunk.id, chunk.offset)?;
    Ok(models)
}

/// Serializes a `PACK` chunk.
#[must_use]
pub fn encode_pack(models: u32) -> Chunk {
    Chunk::new(ChunkId::PACK, models.to_le_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VoxelGrid {
        VoxelGrid::new(
            GridSize::new(2, 3, 4),
            vec![VoxelRecord::new(0, 0, 0, 1), VoxelRecord::new(1, 2, 3, 255)],
        )
    }

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<VoxelRecord>(), 4);
        assert_eq!(bytemuck::bytes_of(&VoxelRecord::new(1, 2, 3, 4)), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_round_trip() {
        let grid = sample();
        let [size, xyzi] = grid.encode().unwrap();
        assert_eq!(size.id, ChunkId::SIZE);
        assert_eq!(size.body, vec![2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0]);
        assert_eq!(xyzi.body.len(), 4 + 8);
        assert_eq!(VoxelGrid::decode(&size, &xyzi).unwrap(), grid);
    }

    #[test]
    fn test_count_must_match_body() {
        let [size, mut xyzi] = sample().encode().unwrap();
        xyzi.body[0] = 3;
        assert!(matches!(
            VoxelGrid::decode(&size, &xyzi),
            Err(VoxError::ChunkLengthMismatch { field: "body", expected: 16, actual: 12, .. })
        ));
    }

    #[test]
    fn test_out_of_bounds_and_reserved_index() {
        let grid = VoxelGrid::new(GridSize::new(1, 1, 1), vec![VoxelRecord::new(0, 1, 0, 1)]);
        assert!(matches!(grid.encode(), Err(VoxError::VoxelOutOfBounds { y: 1, .. })));

        let grid = VoxelGrid::new(GridSize::new(1, 1, 1), vec![VoxelRecord::new(0, 0, 0, 0)]);
        assert!(matches!(grid.encode(), Err(VoxError::ReservedColorIndex { .. })));

        let [size, mut xyzi] = sample().encode().unwrap();
        xyzi.body[4 + 3] = 0;
        assert!(matches!(
            VoxelGrid::decode(&size, &xyzi),
            Err(VoxError::ReservedColorIndex { x: 0, y: 0, z: 0 })
        ));
    }

    #[test]
    fn test_empty_model_is_rejected_on_write_only() {
        let grid = VoxelGrid::new(GridSize::new(1, 1, 1), Vec::new());
        assert!(matches!(grid.encode(), Err(VoxError::EmptyModel)));

        let size = GridSize::new(1, 1, 1).encode();
        let xyzi = Chunk::new(ChunkId::XYZI, vec![0, 0, 0, 0]);
        assert!(VoxelGrid::decode(&size, &xyzi).unwrap().voxels.is_empty());
    }

    #[test]
    fn test_size_body_length() {
        let chunk = Chunk::new(ChunkId::SIZE, vec![1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 9]);
        assert!(matches!(
            GridSize::decode(&chunk),
            Err(VoxError::ChunkLengthMismatch { chunk: ChunkId::SIZE, .. })
        ));
        assert_eq!(GridSize::new(3, 4, 5).to_string(), "3x4x5");
    }

    #[test]
    fn test_pack() {
        assert_eq!(decode_pack(&encode_pack(3)).unwrap(), 3);
    }
}
