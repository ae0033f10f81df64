//! # Flat Model
//!
//! The engine-facing view of a file: one model as a list of colored unit
//! cubes with their exposed faces.
//!
//! ```text
//! read:  VoxDocument → first shape's model → palette colors → face masks
//! write: VoxelModel → palette assignment → one model + minimal scene
//! ```
//!
//! The synthesized scene is a root transform over a group holding one
//! transform that places the model on layer 0.

use crate::document::VoxDocument;
use crate::error::{VoxError, VoxResult};
use crate::faces::{self, FaceMask, Occupancy};
use crate::grid::{GridSize, VoxelGrid, VoxelRecord};
use crate::material;
use crate::palette::{PaletteBuilder, Rgba};
use crate::render::RenderSettings;
use crate::scene::{GroupNode, Layer, Node, NodeId, SceneGraph, ScenePart, ShapeNode, TransformNode};

/// Layers written with every synthesized file.
const DEFAULT_LAYERS: u32 = 8;

/// A colored unit cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColoredVoxel {
    /// X coordinate.
    pub x: u8,
    /// Y coordinate.
    pub y: u8,
    /// Z coordinate.
    pub z: u8,
    /// Color from the palette.
    pub color: Rgba,
    /// Faces not covered by a neighbor. Ignored on write.
    pub faces: FaceMask,
}

impl ColoredVoxel {
    /// Creates a voxel with every face visible.
    #[inline]
    #[must_use]
    pub const fn new(x: u8, y: u8, z: u8, color: Rgba) -> Self {
        Self { x, y, z, color, faces: FaceMask::ALL }
    }
}

/// Flat list of colored voxels in a grid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelModel {
    /// Grid dimensions.
    pub size: GridSize,
    /// Voxels, in file order on read.
    pub voxels: Vec<ColoredVoxel>,
}

impl VoxelModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new(size: GridSize) -> Self {
        Self { size, voxels: Vec::new() }
    }

    /// Adds a voxel with every face visible.
    pub fn push(&mut self, x: u8, y: u8, z: u8, color: Rgba) {
        self.voxels.push(ColoredVoxel::new(x, y, z, color));
    }

    /// Number of voxels.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Returns true if there are no voxels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Voxels with at least one exposed face.
    pub fn visible(&self) -> impl Iterator<Item = &ColoredVoxel> {
        self.voxels.iter().filter(|voxel| !voxel.faces.is_empty())
    }

    /// Recomputes every face mask from the current voxel set.
    pub fn resolve_faces(&mut self) {
        let records: Vec<_> = self
            .voxels
            .iter()
            .map(|voxel| VoxelRecord::new(voxel.x, voxel.y, voxel.z, 1))
            .collect();
        for (voxel, mask) in self.voxels.iter_mut().zip(faces::resolve_faces(self.size, &records)) {
            voxel.faces = mask;
        }
    }
}

/// A file read through the flat-model path.
///
/// Keeps the decoded document so tools can reach the scene graph.
#[derive(Clone, Debug)]
pub struct ParsedModel {
    model: VoxelModel,
    shape: Option<NodeId>,
    document: VoxDocument,
}

impl ParsedModel {
    /// The flattened model.
    #[inline]
    #[must_use]
    pub const fn model(&self) -> &VoxelModel {
        &self.model
    }

    /// Shape node the model was taken from, if the file has a scene.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> Option<NodeId> {
        self.shape
    }

    /// Everything the file held.
    #[inline]
    #[must_use]
    pub const fn document(&self) -> &VoxDocument {
        &self.document
    }

    /// Scene nodes of the file.
    #[inline]
    #[must_use]
    pub const fn scene(&self) -> &SceneGraph {
        &self.document.scene
    }

    /// Transforms with their world placement.
    ///
    /// # Errors
    ///
    /// Fails if the scene does not start with a transform or has a cycle.
    pub fn parts(&self) -> VoxResult<Vec<ScenePart>> {
        self.document.scene.parts(&self.document.layers)
    }

    /// Takes the flattened model.
    #[must_use]
    pub fn into_model(self) -> VoxelModel {
        self.model
    }
}

/// Picks the model to show and resolves its colors and faces.
///
/// The model is the one placed by the first shape node, or model 0 when
/// the file has no scene graph.
///
/// # Errors
///
/// `MissingModel` if there is nothing to show, `MultiModelUnsupported`
/// if `single_model` is set and the scene has more than one shape.
pub fn flatten(document: VoxDocument, single_model: bool) -> VoxResult<ParsedModel> {
    let shapes = document.scene.shapes().count();
    if single_model && shapes > 1 {
        return Err(VoxError::MultiModelUnsupported { shapes });
    }

    let first = document.scene.shapes().next().map(|(id, shape)| (id, shape.model));
    let (shape, index) = match first {
        Some((id, model)) => (Some(id), model),
        None => (None, 0),
    };
    let model = {
        let grid = document.models.get(index).ok_or(VoxError::MissingModel)?;
        let palette = document.palette();
        let masks = faces::resolve_faces(grid.size, &grid.voxels);
        let voxels = grid
            .voxels
            .iter()
            .zip(masks)
            .map(|(record, faces)| ColoredVoxel {
                x: record.x,
                y: record.y,
                z: record.z,
                color: palette.color(record.color_index),
                faces,
            })
            .collect();
        VoxelModel { size: grid.size, voxels }
    };

    tracing::debug!(
        size = %model.size,
        voxels = model.len(),
        visible = model.visible().count(),
        model = index,
        "flattened model"
    );
    Ok(ParsedModel { model, shape, document })
}

/// Builds a complete document around one model.
///
/// Every check runs before the document is built, so nothing is written
/// for a model that cannot be stored.
///
/// # Errors
///
/// `EmptyModel`, `VoxelOutOfBounds`, `DuplicateVoxel` or `TooManyColors`.
pub fn synthesize(model: &VoxelModel) -> VoxResult<VoxDocument> {
    if model.voxels.is_empty() {
        return Err(VoxError::EmptyModel);
    }

    let mut builder = PaletteBuilder::new();
    let mut occupied = Occupancy::new(model.size);
    let mut records = Vec::with_capacity(model.voxels.len());
    for voxel in &model.voxels {
        let (x, y, z) = (u32::from(voxel.x), u32::from(voxel.y), u32::from(voxel.z));
        if !model.size.contains(x, y, z) {
            return Err(VoxError::VoxelOutOfBounds { x, y, z, size: model.size });
        }
        if occupied.is_filled(x.into(), y.into(), z.into()) {
            return Err(VoxError::DuplicateVoxel { x: voxel.x, y: voxel.y, z: voxel.z });
        }
        occupied.insert(voxel.x, voxel.y, voxel.z);
        let index = builder.index_of(voxel.color.rgb())?;
        records.push(VoxelRecord::new(voxel.x, voxel.y, voxel.z, index));
    }
    tracing::debug!(voxels = records.len(), colors = builder.len(), "assigned palette");

    let mut scene = SceneGraph::new();
    scene.push(Node::Transform(TransformNode::new(1)));
    scene.push(Node::Group(GroupNode { children: vec![2] }));
    scene.push(Node::Transform(TransformNode { layer: Some(0), ..TransformNode::new(3) }));
    scene.push(Node::Shape(ShapeNode { model: 0 }));

    Ok(VoxDocument {
        models: vec![VoxelGrid::new(model.size, records)],
        pack: false,
        scene,
        layers: (0..DEFAULT_LAYERS).map(|id| Layer::named(id, id.to_string())).collect(),
        palette: Some(builder.finish()),
        index_map: None,
        materials: material::fill_slots(&[]),
        render: RenderSettings::defaults(),
    })
}
