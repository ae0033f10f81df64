//! # VOXFORM Core
//!
//! Reader and writer for chunked "VOX " voxel model files.
//!
//! ## Design Principles
//!
//! 1. **Closed format** - Unknown chunks, keys and render types are errors
//! 2. **Lengths are checked before allocation** - A corrupt length cannot reserve memory
//! 3. **All or nothing** - A partially valid file is rejected, a failed write leaves no file
//! 4. **Stateless codec** - Caching is an explicit object owned by the caller
//!
//! ## Layers
//!
//! ```text
//! codec      VoxCodec: read/write paths, streams and byte buffers
//! model      flat colored voxels ◄──► VoxDocument
//! document   MAIN children ◄──► typed records
//! records    grid, palette, scene, material, render
//! chunk      nested chunk container, dictionary, byte cursor
//! ```
//!
//! ## Example
//!
//! ```rust
//! use voxform_core::{FaceMask, GridSize, Rgba, VoxCodec, VoxelModel};
//!
//! let mut model = VoxelModel::new(GridSize::new(1, 1, 1));
//! model.push(0, 0, 0, Rgba::opaque(255, 0, 0));
//!
//! let codec = VoxCodec::default();
//! let bytes = codec.encode(&model)?;
//! let parsed = codec.read_bytes(&bytes)?;
//! let voxel = parsed.model().voxels[0];
//! assert_eq!(voxel.color, Rgba::opaque(255, 0, 0));
//! assert_eq!(voxel.faces, FaceMask::ALL);
//! # Ok::<(), voxform_core::VoxError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod dict;
pub mod document;
pub mod error;
pub mod faces;
pub mod grid;
pub mod material;
pub mod model;
pub mod palette;
pub mod render;
pub mod scene;
pub mod text;

pub use cache::ModelCache;
pub use chunk::{Chunk, ChunkId, ChunkReader, ChunkWriter};
pub use codec::VoxCodec;
pub use config::{CodecConfig, KeyOrder, WriteStrategy};
pub use dict::Dict;
pub use document::VoxDocument;
pub use error::{VoxError, VoxResult};
pub use faces::{Face, FaceMask};
pub use grid::{GridSize, VoxelGrid, VoxelRecord};
pub use material::{Material, MaterialKind};
pub use model::{ColoredVoxel, ParsedModel, VoxelModel};
pub use palette::{IndexMap, Palette, PaletteBuilder, Rgba};
pub use render::{RenderKind, RenderObject, RenderRecord, RenderSettings};
pub use scene::{Layer, Node, NodeId, Rotation, SceneGraph, ScenePart};
