//! # Face Exposure
//!
//! Marks which faces of each filled voxel touch an empty (or out-of-grid)
//! neighbor.
//!
//! ```text
//! bit  face    direction
//! 0x01 Right   +x
//! 0x02 Left    -x
//! 0x04 Top     +z
//! 0x08 Bottom  -z
//! 0x10 Back    +y
//! 0x20 Front   -y
//! ```
//!
//! Neighbors are found per axis with checked arithmetic. A neighbor past
//! either end of an axis is outside the grid; it never wraps into the next
//! row.

use std::fmt;

use crate::grid::{GridSize, VoxelRecord};

/// Packed coordinates are 8-bit, so no axis holds more than 256 cells.
const MAX_AXIS: u32 = 256;

/// One of the six axis-aligned faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    /// +x
    Right,
    /// -x
    Left,
    /// +z
    Top,
    /// -z
    Bottom,
    /// +y
    Back,
    /// -y
    Front,
}

impl Face {
    /// All faces in bit order.
    pub const ALL: [Self; 6] = [Self::Right, Self::Left, Self::Top, Self::Bottom, Self::Back, Self::Front];

    /// Mask bit of this face.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Right => 0x01,
            Self::Left => 0x02,
            Self::Top => 0x04,
            Self::Bottom => 0x08,
            Self::Back => 0x10,
            Self::Front => 0x20,
        }
    }

    /// Unit step toward the neighbor behind this face.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> [i32; 3] {
        match self {
            Self::Right => [1, 0, 0],
            Self::Left => [-1, 0, 0],
            Self::Top => [0, 0, 1],
            Self::Bottom => [0, 0, -1],
            Self::Back => [0, 1, 0],
            Self::Front => [0, -1, 0],
        }
    }
}

/// Set of visible faces.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FaceMask(u8);

impl FaceMask {
    /// No visible face.
    pub const NONE: Self = Self(0);
    /// Every face visible.
    pub const ALL: Self = Self(0x3F);

    /// Builds a mask from raw bits; bits above the six faces are dropped.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x3F)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether `face` is visible.
    #[inline]
    #[must_use]
    pub const fn contains(self, face: Face) -> bool {
        self.0 & face.bit() != 0
    }

    /// Marks `face` hidden.
    #[inline]
    pub fn hide(&mut self, face: Face) {
        self.0 &= !face.bit();
    }

    /// Whether no face is visible.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of visible faces.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl fmt::Debug for FaceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Face::ALL
            .iter()
            .filter(|face| self.contains(**face))
            .map(|face| format!("{face:?}"))
            .collect();
        write!(f, "FaceMask({})", names.join("|"))
    }
}

/// Filled cells of a grid as a bitset.
#[derive(Clone)]
pub struct Occupancy {
    dims: [u32; 3],
    bits: Vec<u64>,
}

impl Occupancy {
    /// Creates an empty occupancy set for `size`.
    #[must_use]
    pub fn new(size: GridSize) -> Self {
        let dims = [
            size.width.min(MAX_AXIS),
            size.height.min(MAX_AXIS),
            size.length.min(MAX_AXIS),
        ];
        let cells = dims.iter().map(|&d| d as usize).product::<usize>();
        Self { dims, bits: vec![0; cells.div_ceil(64)] }
    }

    /// Builds the set from voxel records. Records outside the grid are ignored.
    #[must_use]
    pub fn from_records(size: GridSize, records: &[VoxelRecord]) -> Self {
        let mut occupancy = Self::new(size);
        for record in records {
            occupancy.insert(record.x, record.y, record.z);
        }
        occupancy
    }

    fn index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        let [w, h, l] = self.dims;
        if x >= w || y >= h || z >= l {
            return None;
        }
        Some((x + w * (y + h * z)) as usize)
    }

    /// Marks a cell filled. Returns false if it lies outside the grid.
    pub fn insert(&mut self, x: u8, y: u8, z: u8) -> bool {
        match self.index(u32::from(x), u32::from(y), u32::from(z)) {
            Some(i) => {
                self.bits[i / 64] |= 1 << (i % 64);
                true
            }
            None => false,
        }
    }

    /// Whether a cell is filled. Coordinates outside the grid are empty.
    #[must_use]
    pub fn is_filled(&self, x: i64, y: i64, z: i64) -> bool {
        let (Ok(x), Ok(y), Ok(z)) = (u32::try_from(x), u32::try_from(y), u32::try_from(z)) else {
            return false;
        };
        self.index(x, y, z)
            .is_some_and(|i| self.bits[i / 64] & (1 << (i % 64)) != 0)
    }

    /// Faces of the cell at `(x, y, z)` not covered by a filled neighbor.
    #[must_use]
    pub fn exposed_faces(&self, x: u8, y: u8, z: u8) -> FaceMask {
        let mut mask = FaceMask::ALL;
        for face in Face::ALL {
            let [dx, dy, dz] = face.offset();
            let neighbor = (
                i64::from(x) + i64::from(dx),
                i64::from(y) + i64::from(dy),
                i64::from(z) + i64::from(dz),
            );
            if self.is_filled(neighbor.0, neighbor.1, neighbor.2) {
                mask.hide(face);
            }
        }
        mask
    }
}

/// Resolves the face mask of every record, in record order.
#[must_use]
pub fn resolve_faces(size: GridSize, records: &[VoxelRecord]) -> Vec<FaceMask> {
    let occupancy = Occupancy::from_records(size, records);
    records
        .iter()
        .map(|record| occupancy.exposed_faces(record.x, record.y, record.z))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: u8, y: u8, z: u8) -> VoxelRecord {
        VoxelRecord::new(x, y, z, 1)
    }

    #[test]
    fn test_two_adjacent_cells() {
        let masks = resolve_faces(GridSize::new(2, 1, 1), &[record(0, 0, 0), record(1, 0, 0)]);
        assert_eq!(masks[0].bits(), FaceMask::ALL.bits() & !Face::Right.bit());
        assert_eq!(masks[1].bits(), FaceMask::ALL.bits() & !Face::Left.bit());
        assert!(!masks[0].contains(Face::Right));
        assert!(masks[0].contains(Face::Left));
    }

    #[test]
    fn test_lone_voxel_is_fully_exposed() {
        let masks = resolve_faces(GridSize::new(1, 1, 1), &[record(0, 0, 0)]);
        assert_eq!(masks, vec![FaceMask::ALL]);
        assert_eq!(masks[0].count(), 6);
    }

    #[test]
    fn test_no_wrap_across_rows() {
        // (2,0,0) and (0,1,0) are consecutive in a flat 3-wide index but
        // are not neighbors.
        let masks = resolve_faces(GridSize::new(3, 2, 1), &[record(2, 0, 0), record(0, 1, 0)]);
        assert_eq!(masks, vec![FaceMask::ALL, FaceMask::ALL]);

        // Same across layers along z.
        let masks = resolve_faces(GridSize::new(2, 2, 2), &[record(1, 1, 0), record(0, 0, 1)]);
        assert_eq!(masks, vec![FaceMask::ALL, FaceMask::ALL]);
    }

    #[test]
    fn test_enclosed_voxel_has_no_faces() {
        let mut records = Vec::new();
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    records.push(record(x, y, z));
                }
            }
        }
        let masks = resolve_faces(GridSize::new(3, 3, 3), &records);
        let center = records.iter().position(|r| (r.x, r.y, r.z) == (1, 1, 1)).unwrap();
        assert!(masks[center].is_empty());
        let corner = records.iter().position(|r| (r.x, r.y, r.z) == (0, 0, 0)).unwrap();
        assert_eq!(masks[corner].count(), 3);
    }

    #[test]
    fn test_order_independent() {
        let forward = [record(0, 0, 0), record(0, 1, 0), record(0, 1, 1)];
        let mut backward = forward;
        backward.reverse();
        let size = GridSize::new(1, 2, 2);
        let mut a = resolve_faces(size, &forward);
        a.reverse();
        assert_eq!(a, resolve_faces(size, &backward));
        assert!(!resolve_faces(size, &forward)[1].contains(Face::Top));
        assert!(!resolve_faces(size, &forward)[1].contains(Face::Front));
    }

    #[test]
    fn test_oversized_axes_are_clamped() {
        let occupancy = Occupancy::new(GridSize::new(u32::MAX, 1, 1));
        assert_eq!(occupancy.bits.len(), 4);
        assert!(!occupancy.is_filled(-1, 0, 0));
        assert!(!occupancy.is_filled(256, 0, 0));
    }
}
