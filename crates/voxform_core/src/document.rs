//! # Whole-File Document
//!
//! Everything a `MAIN` chunk holds, decoded into typed records.
//!
//! ```text
//! MAIN
//! ├── PACK            optional, before any model
//! ├── SIZE, XYZI      one pair per model
//! ├── nTRN/nGRP/nSHP  scene graph
//! ├── LAYR            layers
//! ├── RGBA            optional palette
//! ├── IMAP            optional palette display order
//! ├── MATL            materials
//! └── rOBJ            render objects
//! ```
//!
//! Chunks are written back in the order above. Only `MAIN` may have
//! children; any tag not listed is rejected.

use std::borrow::Cow;
use std::iter::Peekable;
use std::slice::Iter;

use crate::chunk::{Chunk, ChunkId};
use crate::config::KeyOrder;
use crate::error::{VoxError, VoxResult};
use crate::grid::{self, VoxelGrid};
use crate::material::Material;
use crate::palette::{IndexMap, Palette};
use crate::render::{RenderObject, RenderSettings};
use crate::scene::{Layer, SceneDecoder, SceneGraph};

/// Decoded contents of a file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoxDocument {
    /// Voxel models, in file order.
    pub models: Vec<VoxelGrid>,
    /// Emit a `PACK` chunk with the model count.
    pub pack: bool,
    /// Scene nodes.
    pub scene: SceneGraph,
    /// Layers, in file order.
    pub layers: Vec<Layer>,
    /// Stored palette, if the file had one.
    pub palette: Option<Palette>,
    /// Stored index map, if the file had one.
    pub index_map: Option<IndexMap>,
    /// Materials, in file order.
    pub materials: Vec<Material>,
    /// Render objects, in file order.
    pub render: RenderSettings,
}

impl VoxDocument {
    /// Creates a document with nothing in it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Palette in effect: the stored one, or the built-in default.
    #[must_use]
    pub fn palette(&self) -> Cow<'_, Palette> {
        match &self.palette {
            Some(palette) => Cow::Borrowed(palette),
            None => Cow::Owned(Palette::default()),
        }
    }

    /// Material for a palette slot, or the default record.
    #[must_use]
    pub fn material(&self, id: u8) -> Material {
        self.materials
            .iter()
            .find(|material| material.id == id)
            .copied()
            .unwrap_or_else(|| Material::default_for(id))
    }

    /// Decodes the children of a `MAIN` chunk.
    pub fn decode(root: &Chunk, order: KeyOrder) -> VoxResult<Self> {
        if root.id != ChunkId::MAIN {
            return Err(VoxError::UnexpectedChunk {
                chunk: root.id,
                offset: root.offset,
                reason: "root chunk must be MAIN",
            });
        }
        if !root.body.is_empty() {
            return Err(VoxError::ChunkLengthMismatch {
                chunk: root.id,
                field: "body",
                offset: root.offset,
                expected: 0,
                actual: root.body.len() as u64,
            });
        }

        let mut document = Self::new();
        let mut pack = None;
        let mut scene = SceneDecoder::new();
        let mut children = root.children.iter().peekable();

        while let Some(chunk) = children.next() {
            let chunk = leaf(chunk)?;
            match chunk.id {
                ChunkId::PACK => {
                    if pack.is_some() || !document.models.is_empty() {
                        return Err(unexpected(chunk, "PACK must come once, before any model"));
                    }
                    pack = Some((chunk.offset, grid::decode_pack(chunk)?));
                }
                ChunkId::SIZE => {
                    let xyzi = next_xyzi(chunk, &mut children)?;
                    document.models.push(VoxelGrid::decode(chunk, xyzi)?);
                }
                ChunkId::XYZI => return Err(unexpected(chunk, "XYZI must directly follow SIZE")),
                ChunkId::TRANSFORM | ChunkId::GROUP | ChunkId::SHAPE => scene.push_chunk(chunk)?,
                ChunkId::LAYER => document.layers.push(Layer::decode(chunk)?),
                ChunkId::RGBA => {
                    if document.palette.is_some() {
                        return Err(unexpected(chunk, "duplicate RGBA chunk"));
                    }
                    document.palette = Some(Palette::decode(chunk)?);
                }
                ChunkId::IMAP => {
                    if document.index_map.is_some() {
                        return Err(unexpected(chunk, "duplicate IMAP chunk"));
                    }
                    document.index_map = Some(IndexMap::decode(chunk)?);
                }
                ChunkId::MATERIAL => document.materials.push(Material::decode(chunk)?),
                ChunkId::RENDER => document.render.push(RenderObject::decode(chunk, order)?),
                _ => return Err(unexpected(chunk, "unknown chunk in MAIN")),
            }
        }

        if let Some((offset, count)) = pack {
            if u64::from(count) != document.models.len() as u64 {
                return Err(VoxError::ChunkLengthMismatch {
                    chunk: ChunkId::PACK,
                    field: "model count",
                    offset,
                    expected: u64::from(count),
                    actual: document.models.len() as u64,
                });
            }
            document.pack = true;
        }
        document.scene = scene.finish(document.models.len())?;

        if document.palette.is_none() {
            tracing::warn!("file has no RGBA chunk, using the default palette");
        }
        tracing::debug!(
            models = document.models.len(),
            nodes = document.scene.len(),
            layers = document.layers.len(),
            materials = document.materials.len(),
            render_objects = document.render.len(),
            "decoded document"
        );
        Ok(document)
    }

    /// Children of `MAIN`, in write order.
    ///
    /// Every model and the scene graph are checked before anything is built.
    pub fn children(&self) -> VoxResult<Vec<Chunk>> {
        self.scene.validate(self.models.len())?;

        let mut out = Vec::with_capacity(
            usize::from(self.pack)
                + self.models.len() * 2
                + self.scene.len()
                + self.layers.len()
                + 2
                + self.materials.len()
                + self.render.len(),
        );
        if self.pack {
            out.push(grid::encode_pack(u32::try_from(self.models.len()).unwrap_or(u32::MAX)));
        }
        for model in &self.models {
            out.extend(model.encode()?);
        }
        out.extend(self.scene.encode());
        out.extend(self.layers.iter().map(Layer::encode));
        if let Some(palette) = &self.palette {
            out.push(palette.encode());
        }
        if let Some(index_map) = &self.index_map {
            out.push(index_map.encode());
        }
        out.extend(self.materials.iter().map(Material::encode));
        out.extend(self.render.encode());
        Ok(out)
    }

    /// Builds the `MAIN` chunk.
    pub fn encode(&self) -> VoxResult<Chunk> {
        Ok(Chunk::container(ChunkId::MAIN, self.children()?))
    }
}

fn unexpected(chunk: &Chunk, reason: &'static str) -> VoxError {
    VoxError::UnexpectedChunk { chunk: chunk.id, offset: chunk.offset, reason }
}

fn leaf(chunk: &Chunk) -> VoxResult<&Chunk> {
    if chunk.children.is_empty() {
        Ok(chunk)
    } else {
        Err(unexpected(chunk, "only MAIN may have children"))
    }
}

fn next_xyzi<'a>(size: &Chunk, children: &mut Peekable<Iter<'a, Chunk>>) -> VoxResult<&'a Chunk> {
    match children.next_if(|chunk| chunk.id == ChunkId::XYZI) {
        Some(xyzi) => leaf(xyzi),
        None => Err(unexpected(size, "SIZE must be followed by XYZI")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridSize, VoxelRecord};
    use crate::scene::{GroupNode, Node, ShapeNode, TransformNode};

    fn one_model() -> VoxelGrid {
        VoxelGrid::new(GridSize::new(1, 1, 1), vec![VoxelRecord::new(0, 0, 0, 7)])
    }

    fn sample() -> VoxDocument {
        let mut scene = SceneGraph::new();
        scene.push(Node::Transform(TransformNode::new(1)));
        scene.push(Node::Group(GroupNode { children: vec![2] }));
        scene.push(Node::Transform(TransformNode { layer: Some(0), ..TransformNode::new(3) }));
        scene.push(Node::Shape(ShapeNode { model: 0 }));
        VoxDocument {
            models: vec![one_model()],
            pack: true,
            scene,
            layers: vec![Layer::named(0, "0")],
            palette: Some(Palette::default()),
            index_map: None,
            materials: vec![Material::default_for(7)],
            render: RenderSettings::defaults(),
        }
    }

    #[test]
    fn test_round_trip() {
        let document = sample();
        let root = document.encode().unwrap();
        assert_eq!(root.children[0].id, ChunkId::PACK);
        assert_eq!(root.children[1].id, ChunkId::SIZE);
        assert_eq!(root.children[2].id, ChunkId::XYZI);
        assert_eq!(VoxDocument::decode(&root, KeyOrder::Strict).unwrap(), document);
    }

    #[test]
    fn test_models_only_file() {
        let document = VoxDocument { models: vec![one_model()], ..VoxDocument::new() };
        let decoded = VoxDocument::decode(&document.encode().unwrap(), KeyOrder::Strict).unwrap();
        assert!(decoded.scene.is_empty());
        assert!(decoded.palette.is_none());
        assert_eq!(*decoded.palette(), Palette::default());
        assert_eq!(decoded.material(3), Material::default_for(3));
    }

    #[test]
    fn test_xyzi_must_follow_size() {
        let [size, xyzi] = one_model().encode().unwrap();
        let root = Chunk::container(ChunkId::MAIN, vec![xyzi.clone(), size.clone()]);
        assert!(matches!(
            VoxDocument::decode(&root, KeyOrder::Strict),
            Err(VoxError::UnexpectedChunk { chunk: ChunkId::XYZI, .. })
        ));

        let root = Chunk::container(ChunkId::MAIN, vec![size, Palette::default().encode(), xyzi]);
        assert!(matches!(
            VoxDocument::decode(&root, KeyOrder::Strict),
            Err(VoxError::UnexpectedChunk { chunk: ChunkId::SIZE, .. })
        ));
    }

    #[test]
    fn test_pack_count_must_match() {
        let mut root = sample().encode().unwrap();
        root.children[0] = grid::encode_pack(2);
        assert!(matches!(
            VoxDocument::decode(&root, KeyOrder::Strict),
            Err(VoxError::ChunkLengthMismatch { chunk: ChunkId::PACK, expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_and_nested_chunks_are_rejected() {
        let mut root = sample().encode().unwrap();
        root.children.push(Chunk::new(ChunkId(*b"NOTE"), Vec::new()));
        assert!(matches!(
            VoxDocument::decode(&root, KeyOrder::Strict),
            Err(VoxError::UnexpectedChunk { chunk: ChunkId(tag), .. }) if &tag == b"NOTE"
        ));

        let mut root = sample().encode().unwrap();
        root.children[3].children.push(Chunk::new(ChunkId::PACK, vec![0; 4]));
        assert!(matches!(
            VoxDocument::decode(&root, KeyOrder::Strict),
            Err(VoxError::UnexpectedChunk { reason: "only MAIN may have children", .. })
        ));
    }

    #[test]
    fn test_shape_must_reference_a_model() {
        let mut document = sample();
        document.models.clear();
        document.pack = false;
        assert!(matches!(document.encode(), Err(VoxError::MalformedNode { chunk: ChunkId::SHAPE, .. })));
    }

    #[test]
    fn test_index_map_is_kept() {
        let mut root = sample().encode().unwrap();
        let entries: Vec<u8> = (0..=255).rev().collect();
        root.children.push(Chunk::new(ChunkId::IMAP, entries.clone()));
        let document = VoxDocument::decode(&root, KeyOrder::Strict).unwrap();
        assert_eq!(document.index_map.as_ref().unwrap().entries().to_vec(), entries);
        assert_eq!(document.encode().unwrap().children.last().unwrap().id, ChunkId::RENDER);
    }
}
