//! # Palette
//!
//! 256 RGBA entries indexed by color index. Index 0 means "no voxel".
//!
//! ## RGBA Chunk
//!
//! ```text
//! RGBA: 256 × { r, g, b, a }   (1024 bytes)
//!
//! file entry k (0..=254) -> color index k + 1
//! file entry 255         -> slot 0
//! ```
//!
//! The last file entry has no color index of its own. It is kept in the
//! otherwise unused slot 0 so a rewritten chunk matches the original bytes.
//!
//! ## Assignment
//!
//! [`PaletteBuilder`] hands out slots from 255 downward, reusing a slot when
//! the exact RGB value was seen before. The 256th distinct color fails with
//! [`VoxError::TooManyColors`].

use bytemuck::{Pod, Zeroable};

use crate::chunk::{Chunk, ChunkId};
use crate::error::{VoxError, VoxResult};

/// Number of palette entries.
pub const PALETTE_LEN: usize = 256;

/// Number of slots a voxel can reference.
pub const USABLE_COLORS: usize = 255;

/// Size of the `RGBA` chunk body.
pub const RGBA_BODY_LEN: usize = PALETTE_LEN * 4;

/// Size of the `IMAP` chunk body.
pub const IMAP_BODY_LEN: usize = PALETTE_LEN;

/// Built-in palette, indexed by color index.
static DEFAULT_PALETTE: [u32; PALETTE_LEN] = [
    0x00000000, 0xffffffff, 0xffccffff, 0xff99ffff, 0xff66ffff, 0xff33ffff, 0xff00ffff, 0xffffccff,
    0xffccccff, 0xff99ccff, 0xff66ccff, 0xff33ccff, 0xff00ccff, 0xffff99ff, 0xffcc99ff, 0xff9999ff,
    0xff6699ff, 0xff3399ff, 0xff0099ff, 0xffff66ff, 0xffcc66ff, 0xff9966ff, 0xff6666ff, 0xff3366ff,
    0xff0066ff, 0xffff33ff, 0xffcc33ff, 0xff9933ff, 0xff6633ff, 0xff3333ff, 0xff0033ff, 0xffff00ff,
    0xffcc00ff, 0xff9900ff, 0xff6600ff, 0xff3300ff, 0xff0000ff, 0xffffffcc, 0xffccffcc, 0xff99ffcc,
    0xff66ffcc, 0xff33ffcc, 0xff00ffcc, 0xffffcccc, 0xffcccccc, 0xff99cccc, 0xff66cccc, 0xff33cccc,
    0xff00cccc, 0xffff99cc, 0xffcc99cc, 0xff9999cc, 0xff6699cc, 0xff3399cc, 0xff0099cc, 0xffff66cc,
    0xffcc66cc, 0xff9966cc, 0xff6666cc, 0xff3366cc, 0xff0066cc, 0xffff33cc, 0xffcc33cc, 0xff9933cc,
    0xff6633cc, 0xff3333cc, 0xff0033cc, 0xffff00cc, 0xffcc00cc, 0xff9900cc, 0xff6600cc, 0xff3300cc,
    0xff0000cc, 0xffffff99, 0xffccff99, 0xff99ff99, 0xff66ff99, 0xff33ff99, 0xff00ff99, 0xffffcc99,
    0xffcccc99, 0xff99cc99, 0xff66cc99, 0xff33cc99, 0xff00cc99, 0xffff9999, 0xffcc9999, 0xff999999,
    0xff669999, 0xff339999, 0xff009999, 0xffff6699, 0xffcc6699, 0xff996699, 0xff666699, 0xff336699,
    0xff006699, 0xffff3399, 0xffcc3399, 0xff993399, 0xff663399, 0xff333399, 0xff003399, 0xffff0099,
    0xffcc0099, 0xff990099, 0xff660099, 0xff330099, 0xff000099, 0xffffff66, 0xffccff66, 0xff99ff66,
    0xff66ff66, 0xff33ff66, 0xff00ff66, 0xffffcc66, 0xffcccc66, 0xff99cc66, 0xff66cc66, 0xff33cc66,
    0xff00cc66, 0xffff9966, 0xffcc9966, 0xff999966, 0xff669966, 0xff339966, 0xff009966, 0xffff6666,
    0xffcc6666, 0xff996666, 0xff666666, 0xff336666, 0xff006666, 0xffff3366, 0xffcc3366, 0xff993366,
    0xff663366, 0xff333366, 0xff003366, 0xffff0066, 0xffcc0066, 0xff990066, 0xff660066, 0xff330066,
    0xff000066, 0xffffff33, 0xffccff33, 0xff99ff33, 0xff66ff33, 0xff33ff33, 0xff00ff33, 0xffffcc33,
    0xffcccc33, 0xff99cc33, 0xff66cc33, 0xff33cc33, 0xff00cc33, 0xffff9933, 0xffcc9933, 0xff999933,
    0xff669933, 0xff339933, 0xff009933, 0xffff6633, 0xffcc6633, 0xff996633, 0xff666633, 0xff336633,
    0xff006633, 0xffff3333, 0xffcc3333, 0xff993333, 0xff663333, 0xff333333, 0xff003333, 0xffff0033,
    0xffcc0033, 0xff990033, 0xff660033, 0xff330033, 0xff000033, 0xffffff00, 0xffccff00, 0xff99ff00,
    0xff66ff00, 0xff33ff00, 0xff00ff00, 0xffffcc00, 0xffcccc00, 0xff99cc00, 0xff66cc00, 0xff33cc00,
    0xff00cc00, 0xffff9900, 0xffcc9900, 0xff999900, 0xff669900, 0xff339900, 0xff009900, 0xffff6600,
    0xffcc6600, 0xff996600, 0xff666600, 0xff336600, 0xff006600, 0xffff3300, 0xffcc3300, 0xff993300,
    0xff663300, 0xff333300, 0xff003300, 0xffff0000, 0xffcc0000, 0xff990000, 0xff660000, 0xff330000,
    0xff0000ee, 0xff0000dd, 0xff0000bb, 0xff0000aa, 0xff000088, 0xff000077, 0xff000055, 0xff000044,
    0xff000022, 0xff000011, 0xff00ee00, 0xff00dd00, 0xff00bb00, 0xff00aa00, 0xff008800, 0xff007700,
    0xff005500, 0xff004400, 0xff002200, 0xff001100, 0xffee0000, 0xffdd0000, 0xffbb0000, 0xffaa0000,
    0xff880000, 0xff770000, 0xff550000, 0xff440000, 0xff220000, 0xff110000, 0xffeeeeee, 0xffdddddd,
    0xffbbbbbb, 0xffaaaaaa, 0xff888888, 0xff777777, 0xff555555, 0xff444444, 0xff222222, 0xff111111,
];

/// An 8-bit-per-channel color as stored on disk.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba {
    /// Creates a color.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    #[inline]
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Unpacks `0xAABBGGRR`.
    #[inline]
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            r: (packed & 0xFF) as u8,
            g: ((packed >> 8) & 0xFF) as u8,
            b: ((packed >> 16) & 0xFF) as u8,
            a: ((packed >> 24) & 0xFF) as u8,
        }
    }

    /// Packs into `0xAABBGGRR`.
    #[inline]
    #[must_use]
    pub const fn packed(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | (self.a as u32) << 24
    }

    /// Red, green and blue channels.
    #[inline]
    #[must_use]
    pub const fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// 256-entry color table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgba; PALETTE_LEN],
}

impl Default for Palette {
    fn default() -> Self {
        let mut colors = [Rgba::default(); PALETTE_LEN];
        for (slot, &packed) in colors.iter_mut().zip(DEFAULT_PALETTE.iter()) {
            *slot = Rgba::from_packed(packed);
        }
        Self { colors }
    }
}

impl Palette {
    /// All-zero palette.
    #[must_use]
    pub fn zeroed() -> Self {
        Self { colors: [Rgba::default(); PALETTE_LEN] }
    }

    /// Color at `index`.
    #[inline]
    #[must_use]
    pub const fn color(&self, index: u8) -> Rgba {
        self.colors[index as usize]
    }

    /// Sets the color at `index`.
    #[inline]
    pub fn set(&mut self, index: u8, color: Rgba) {
        self.colors[usize::from(index)] = color;
    }

    /// All entries, indexed by color index.
    #[inline]
    #[must_use]
    pub const fn colors(&self) -> &[Rgba; PALETTE_LEN] {
        &self.colors
    }

    /// Parses an `RGBA` chunk.
    pub fn decode(chunk: &Chunk) -> VoxResult<Self> {
        if chunk.body.len() != RGBA_BODY_LEN {
            return Err(VoxError::ChunkLengthMismatch {
                chunk: chunk.id,
                field: "body",
                offset: chunk.offset,
                expected: RGBA_BODY_LEN as u64,
                actual: chunk.body.len() as u64,
            });
        }
        let mut colors = [Rgba::default(); PALETTE_LEN];
        for (entry, bytes) in chunk.body.chunks_exact(4).enumerate() {
            let color: Rgba = bytemuck::pod_read_unaligned(bytes);
            colors[(entry + 1) % PALETTE_LEN] = color;
        }
        Ok(Self { colors })
    }

    /// Serializes an `RGBA` chunk.
    #[must_use]
    pub fn encode(&self) -> Chunk {
        let mut body = Vec::with_capacity(RGBA_BODY_LEN);
        for entry in 0..PALETTE_LEN {
            body.extend_from_slice(bytemuck::bytes_of(&self.colors[(entry + 1) % PALETTE_LEN]));
        }
        Chunk::new(ChunkId::RGBA, body)
    }
}

/// Assigns palette slots to colors, highest slot first.
#[derive(Clone, Debug)]
pub struct PaletteBuilder {
    palette: Palette,
    /// Next slot to hand out; 0 once all 255 are used.
    available: u8,
}

impl Default for PaletteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteBuilder {
    /// Starts from a zeroed palette with every slot free.
    #[must_use]
    pub fn new() -> Self {
        Self { palette: Palette::zeroed(), available: u8::MAX }
    }

    /// Number of distinct colors assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        USABLE_COLORS - usize::from(self.available)
    }

    /// Returns true if no color has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available == u8::MAX
    }

    /// Slot for an RGB color, assigning a new one on first sight.
    ///
    /// Alpha is ignored on input; stored colors are opaque.
    pub fn index_of(&mut self, rgb: [u8; 3]) -> VoxResult<u8> {
        let used = (u16::from(self.available) + 1)..=u16::from(u8::MAX);
        for slot in used.rev() {
            let slot = slot as u8;
            if self.palette.color(slot).rgb() == rgb {
                return Ok(slot);
            }
        }

        if self.available == 0 {
            return Err(VoxError::TooManyColors { limit: USABLE_COLORS });
        }
        let slot = self.available;
        self.palette.set(slot, Rgba::opaque(rgb[0], rgb[1], rgb[2]));
        self.available -= 1;
        Ok(slot)
    }

    /// Finished palette.
    #[must_use]
    pub fn finish(self) -> Palette {
        self.palette
    }
}

/// The `IMAP` chunk: display order of palette entries, kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMap {
    entries: [u8; IMAP_BODY_LEN],
}

impl IndexMap {
    /// Raw entries.
    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[u8; IMAP_BODY_LEN] {
        &self.entries
    }

    /// Parses an `IMAP` chunk.
    pub fn decode(chunk: &Chunk) -> VoxResult<Self> {
        let entries: [u8; IMAP_BODY_LEN] =
            chunk.body.as_slice().try_into().map_err(|_| VoxError::ChunkLengthMismatch {
                chunk: chunk.id,
                field: "body",
                offset: chunk.offset,
                expected: IMAP_BODY_LEN as u64,
                actual: chunk.body.len() as u64,
            })?;
        Ok(Self { entries })
    }

    /// Serializes an `IMAP` chunk.
    #[must_use]
    pub fn encode(&self) -> Chunk {
        Chunk::new(ChunkId::IMAP, self.entries.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette_layout() {
        let palette = Palette::default();
        assert_eq!(palette.color(0), Rgba::new(0, 0, 0, 0));
        assert_eq!(palette.color(1), Rgba::opaque(255, 255, 255));
        assert_eq!(palette.color(255), Rgba::opaque(0x11, 0x11, 0x11));
    }

    #[test]
    fn test_packing() {
        let color = Rgba::from_packed(0xff33_66cc);
        assert_eq!(color, Rgba::new(0xcc, 0x66, 0x33, 0xff));
        assert_eq!(color.packed(), 0xff33_66cc);
    }

    #[test]
    fn test_rgba_chunk_is_byte_identical() {
        let body: Vec<u8> = (0..RGBA_BODY_LEN).map(|i| (i * 7 % 251) as u8).collect();
        let chunk = Chunk::new(ChunkId::RGBA, body.clone());
        let palette = Palette::decode(&chunk).unwrap();
        // File entry 0 is color index 1.
        assert_eq!(palette.color(1), Rgba::new(body[0], body[1], body[2], body[3]));
        // File entry 255 is kept in slot 0.
        assert_eq!(palette.color(0).r, body[1020]);
        assert_eq!(palette.encode().body, body);
    }

    #[test]
    fn test_rgba_chunk_length_is_checked() {
        let chunk = Chunk::new(ChunkId::RGBA, vec![0; 1020]);
        assert!(matches!(
            Palette::decode(&chunk),
            Err(VoxError::ChunkLengthMismatch { expected: 1024, actual: 1020, .. })
        ));
    }

    #[test]
    fn test_builder_assigns_downward_and_reuses() {
        let mut builder = PaletteBuilder::new();
        assert!(builder.is_empty());
        assert_eq!(builder.index_of([255, 0, 0]).unwrap(), 255);
        assert_eq!(builder.index_of([0, 255, 0]).unwrap(), 254);
        assert_eq!(builder.index_of([255, 0, 0]).unwrap(), 255);
        assert_eq!(builder.len(), 2);

        let palette = builder.finish();
        assert_eq!(palette.color(255), Rgba::opaque(255, 0, 0));
        assert_eq!(palette.color(254), Rgba::opaque(0, 255, 0));
        assert_eq!(palette.color(253), Rgba::default());
    }

    #[test]
    fn test_builder_black_is_a_real_color() {
        let mut builder = PaletteBuilder::new();
        assert_eq!(builder.index_of([0, 0, 0]).unwrap(), 255);
        assert_eq!(builder.index_of([0, 0, 0]).unwrap(), 255);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_builder_limit() {
        let mut builder = PaletteBuilder::new();
        for i in 0..255u32 {
            let slot = builder.index_of([i as u8, 1, 2]).unwrap();
            assert_eq!(u32::from(slot), 255 - i);
        }
        assert_eq!(builder.len(), 255);
        assert_eq!(builder.index_of([7, 1, 2]).unwrap(), 248);
        assert!(matches!(
            builder.index_of([0, 0, 0]),
            Err(VoxError::TooManyColors { limit: 255 })
        ));
    }

    #[test]
    fn test_index_map() {
        let entries: Vec<u8> = (0..=255).rev().collect();
        let chunk = Chunk::new(ChunkId::IMAP, entries.clone());
        let map = IndexMap::decode(&chunk).unwrap();
        assert_eq!(map.entries()[0], 255);
        assert_eq!(map.encode().body, entries);
        assert!(IndexMap::decode(&Chunk::new(ChunkId::IMAP, vec![0; 3])).is_err());
    }
}
