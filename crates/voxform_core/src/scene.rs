//! # Scene Graph
//!
//! Transform, group and shape nodes plus layers, stored in a dense arena.
//!
//! ## Node Layouts
//!
//! ```text
//! nTRN: id, DICT{_name, _hidden}, child, reserved(-1), layer, frames(1), DICT{_r, _t}
//! nGRP: id, DICT{}, count, count × child id
//! nSHP: id, DICT{}, models(1), model id, DICT{}
//! LAYR: id, DICT{_name, _hidden}, reserved(-1)
//! ```
//!
//! ## Ids
//!
//! File node ids are only used to resolve references while reading. Every
//! node gets the arena index of its position in file order, and on write
//! node `i` is emitted with id `i`. A transform points at a group or shape,
//! a group points at transforms.

use std::collections::{HashMap, VecDeque};

use crate::chunk::{Chunk, ChunkId, CHUNK_HEADER_LEN};
use crate::cursor::{ByteCursor, ByteWriter};
use crate::dict::Dict;
use crate::error::{VoxError, VoxResult};
use crate::text;

/// Index of a node in a [`SceneGraph`].
pub type NodeId = usize;

// ============================================================================
// ROTATION
// ============================================================================

/// Packed rotation byte of a transform frame.
///
/// ```text
/// bits 0-1 : column of the non-zero entry in row 0
/// bits 2-3 : column of the non-zero entry in row 1
/// bit  4   : sign of row 0 (1 = negative)
/// bit  5   : sign of row 1
/// bit  6   : sign of row 2
/// ```
///
/// Row 2's column is whichever column rows 0 and 1 do not use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rotation(u8);

impl Rotation {
    /// No rotation.
    pub const IDENTITY: Self = Self(0b0000_0100);

    /// Validates a raw rotation byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        let col0 = byte & 0b11;
        let col1 = (byte >> 2) & 0b11;
        if col0 > 2 || col1 > 2 || col0 == col1 || byte & 0x80 != 0 {
            return None;
        }
        Some(Self(byte))
    }

    /// Raw byte.
    #[inline]
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0
    }

    /// Signed permutation matrix, `matrix[row][column]`.
    #[must_use]
    pub fn matrix(self) -> [[i32; 3]; 3] {
        let col0 = usize::from(self.0 & 0b11);
        let col1 = usize::from((self.0 >> 2) & 0b11);
        let col2 = 3 - col0 - col1;
        let sign = |bit: u8| if self.0 & bit != 0 { -1 } else { 1 };

        let mut m = [[0; 3]; 3];
        m[0][col0] = sign(0x10);
        m[1][col1] = sign(0x20);
        m[2][col2] = sign(0x40);
        m
    }

    /// Packs a signed permutation matrix. Returns `None` for anything else.
    #[must_use]
    pub fn from_matrix(m: [[i32; 3]; 3]) -> Option<Self> {
        let mut cols = [0u8; 3];
        let mut byte = 0u8;
        for (row, values) in m.iter().enumerate() {
            let mut found = None;
            for (col, &value) in values.iter().enumerate() {
                match value {
                    0 => {}
                    1 | -1 if found.is_none() => found = Some((col as u8, value)),
                    _ => return None,
                }
            }
            let (col, value) = found?;
            cols[row] = col;
            if value < 0 {
                byte |= 0x10u8 << row;
            }
        }
        if cols[0] == cols[1] || cols[2] != 3 - cols[0] - cols[1] {
            return None;
        }
        byte |= cols[0] | (cols[1] << 2);
        Self::from_byte(byte)
    }

    /// Rotates a vector. Widened so `-i32::MIN` fits.
    #[must_use]
    pub fn apply(self, v: [i32; 3]) -> [i64; 3] {
        let m = self.matrix();
        let mut out = [0; 3];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = (0..3).map(|col| i64::from(m[row][col]) * i64::from(v[col])).sum();
        }
        out
    }

    /// `self * child`: the rotation of a child frame expressed in this frame.
    #[must_use]
    pub fn then(self, child: Self) -> Self {
        let a = self.matrix();
        let b = child.matrix();
        let mut m = [[0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, slot) in row.iter_mut().enumerate() {
                *slot = (0..3).map(|k| a[i][k] * b[k][j]).sum();
            }
        }
        // A product of signed permutations is a signed permutation.
        Self::from_matrix(m).unwrap_or(Self::IDENTITY)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// NODES
// ============================================================================

/// Positions its child and assigns it to a layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformNode {
    /// `_name` attribute.
    pub name: Option<String>,
    /// `_hidden` attribute, kept as stored.
    pub hidden: Option<bool>,
    /// Group or shape this transform positions.
    pub child: NodeId,
    /// Layer id, `None` when stored as -1.
    pub layer: Option<u32>,
    /// `_r` frame attribute.
    pub rotation: Option<Rotation>,
    /// `_t` frame attribute.
    pub translation: Option<[i32; 3]>,
}

impl TransformNode {
    /// Creates an unnamed transform with no frame attributes.
    #[must_use]
    pub fn new(child: NodeId) -> Self {
        Self { child, ..Self::default() }
    }

    /// Whether the node is hidden.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    /// Rotation, identity when absent.
    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation.unwrap_or_default()
    }

    /// Translation, zero when absent.
    #[inline]
    #[must_use]
    pub fn translation(&self) -> [i32; 3] {
        self.translation.unwrap_or_default()
    }
}

/// Groups transforms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupNode {
    /// Child transforms, in order.
    pub children: Vec<NodeId>,
}

/// Places one voxel model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeNode {
    /// Index into the file's model list.
    pub model: usize,
}

/// A scene node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// `nTRN`.
    Transform(TransformNode),
    /// `nGRP`.
    Group(GroupNode),
    /// `nSHP`.
    Shape(ShapeNode),
}

impl Node {
    /// Chunk tag this node is stored under.
    #[must_use]
    pub const fn chunk_id(&self) -> ChunkId {
        match self {
            Self::Transform(_) => ChunkId::TRANSFORM,
            Self::Group(_) => ChunkId::GROUP,
            Self::Shape(_) => ChunkId::SHAPE,
        }
    }
}

/// A named visibility group referenced by transforms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layer {
    /// Layer id.
    pub id: u32,
    /// `_name` attribute.
    pub name: Option<String>,
    /// `_hidden` attribute, kept as stored.
    pub hidden: Option<bool>,
}

impl Layer {
    /// Creates a named, visible layer.
    #[must_use]
    pub fn named(id: u32, name: impl Into<String>) -> Self {
        Self { id, name: Some(name.into()), hidden: None }
    }

    /// Whether the layer is hidden.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    /// Parses a `LAYR` chunk.
    pub fn decode(chunk: &Chunk) -> VoxResult<Self> {
        let mut cursor = body_cursor(chunk);
        let raw_id = cursor.read_i32("layer id")?;
        let id = u32::try_from(raw_id).map_err(|_| VoxError::MalformedNode {
            chunk: ChunkId::LAYER,
            node_id: raw_id,
            reason: "layer id must not be negative".to_owned(),
        })?;

        let attributes = Dict::decode(&mut cursor)?;
        let (name, hidden) = decode_name_hidden(ChunkId::LAYER, &attributes)?;

        let reserved = cursor.read_i32("layer reserved id")?;
        if reserved != -1 {
            return Err(VoxError::MalformedNode {
                chunk: ChunkId::LAYER,
                node_id: raw_id,
                reason: format!("reserved id was {reserved}, expected -1"),
            });
        }
        cursor.expect_end(chunk.id, chunk.offset)?;
        Ok(Self { id, name, hidden })
    }

    /// Serializes a `LAYR` chunk.
    #[must_use]
    pub fn encode(&self) -> Chunk {
        let mut out = ByteWriter::new();
        out.write_i32(self.id as i32);
        encode_name_hidden(self.name.as_deref(), self.hidden).encode(&mut out);
        out.write_i32(-1);
        Chunk::new(ChunkId::LAYER, out.into_inner())
    }
}

fn body_cursor(chunk: &Chunk) -> ByteCursor<'_> {
    ByteCursor::new(&chunk.body, chunk.offset + CHUNK_HEADER_LEN)
}

fn decode_name_hidden(chunk: ChunkId, attributes: &Dict) -> VoxResult<(Option<String>, Option<bool>)> {
    let mut name = None;
    let mut hidden = None;
    for (key, value) in attributes.iter() {
        match key {
            "_name" => name = Some(value.to_owned()),
            "_hidden" => hidden = Some(text::parse_bool(chunk, key, value)?),
            _ => {
                return Err(VoxError::UnknownAttributeKey {
                    chunk,
                    key: key.to_owned(),
                    value: value.to_owned(),
                })
            }
        }
    }
    Ok((name, hidden))
}

fn encode_name_hidden(name: Option<&str>, hidden: Option<bool>) -> Dict {
    let mut dict = Dict::new();
    if let Some(name) = name {
        dict.push("_name", name);
    }
    if let Some(hidden) = hidden {
        dict.push("_hidden", text::format_bool(hidden));
    }
    dict
}

fn expect_empty(chunk: ChunkId, node_id: i32, attributes: &Dict, what: &str) -> VoxResult<()> {
    match attributes.entry(0) {
        None => Ok(()),
        Some((key, value)) => Err(VoxError::MalformedNode {
            chunk,
            node_id,
            reason: format!("{what} must be empty, found {key}={value}"),
        }),
    }
}

fn file_id(index: NodeId) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

// ============================================================================
// DECODING
// ============================================================================

/// A node as read from a chunk, before file ids are resolved.
struct PendingNode {
    id: i32,
    node: Node,
    /// File ids referenced by the node, in field order.
    links: Vec<i32>,
}

/// Collects node chunks in file order and resolves them into a [`SceneGraph`].
#[derive(Default)]
pub struct SceneDecoder {
    pending: Vec<PendingNode>,
}

impl SceneDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes read so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no node has been read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Parses one `nTRN`, `nGRP` or `nSHP` chunk.
    pub fn push_chunk(&mut self, chunk: &Chunk) -> VoxResult<()> {
        let pending = match chunk.id {
            ChunkId::TRANSFORM => decode_transform(chunk)?,
            ChunkId::GROUP => decode_group(chunk)?,
            ChunkId::SHAPE => decode_shape(chunk)?,
            other => {
                return Err(VoxError::UnexpectedChunk {
                    chunk: other,
                    offset: chunk.offset,
                    reason: "not a scene node",
                })
            }
        };
        self.pending.push(pending);
        Ok(())
    }

    /// Remaps file ids to arena indices and validates the graph.
    pub fn finish(self, model_count: usize) -> VoxResult<SceneGraph> {
        let mut index_of = HashMap::with_capacity(self.pending.len());
        for (index, pending) in self.pending.iter().enumerate() {
            if index_of.insert(pending.id, index).is_some() {
                return Err(VoxError::DuplicateNodeId { id: pending.id });
            }
        }

        let mut nodes = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let mut resolved = Vec::with_capacity(pending.links.len());
            for &to in &pending.links {
                let index = index_of
                    .get(&to)
                    .copied()
                    .ok_or(VoxError::DanglingNodeReference { from: pending.id, to })?;
                resolved.push(index);
            }

            let node = match pending.node {
                Node::Transform(mut transform) => {
                    transform.child = resolved.first().copied().unwrap_or_default();
                    Node::Transform(transform)
                }
                Node::Group(_) => Node::Group(GroupNode { children: resolved }),
                shape @ Node::Shape(_) => shape,
            };
            nodes.push(node);
        }

        let graph = SceneGraph { nodes };
        graph.validate(model_count)?;
        Ok(graph)
    }
}

fn decode_transform(chunk: &Chunk) -> VoxResult<PendingNode> {
    let mut cursor = body_cursor(chunk);
    let id = cursor.read_i32("node id")?;
    let attributes = Dict::decode(&mut cursor)?;
    let (name, hidden) = decode_name_hidden(chunk.id, &attributes)?;

    let child = cursor.read_i32("transform child id")?;
    let reserved = cursor.read_i32("transform reserved id")?;
    let layer = cursor.read_i32("transform layer id")?;
    let frames = cursor.read_i32("transform frame count")?;
    let malformed = |reason: String| VoxError::MalformedNode { chunk: chunk.id, node_id: id, reason };
    if reserved != -1 {
        return Err(malformed(format!("reserved id was {reserved}, expected -1")));
    }
    if frames != 1 {
        return Err(malformed(format!("frame count was {frames}, expected 1")));
    }
    let layer = match layer {
        -1 => None,
        value => Some(u32::try_from(value).map_err(|_| malformed(format!("invalid layer id {value}")))?),
    };

    let frame = Dict::decode(&mut cursor)?;
    let mut rotation = None;
    let mut translation = None;
    for (key, value) in frame.iter() {
        match key {
            "_r" => {
                let byte = text::parse_int::<u8>(chunk.id, key, value)?;
                rotation = Some(Rotation::from_byte(byte).ok_or_else(|| VoxError::InvalidAttributeValue {
                    chunk: chunk.id,
                    key: key.to_owned(),
                    value: value.to_owned(),
                    reason: "not a rotation",
                })?);
            }
            "_t" => translation = Some(text::parse_ints::<3>(chunk.id, key, value)?),
            _ => {
                return Err(VoxError::UnknownAttributeKey {
                    chunk: chunk.id,
                    key: key.to_owned(),
                    value: value.to_owned(),
                })
            }
        }
    }
    cursor.expect_end(chunk.id, chunk.offset)?;

    let node = TransformNode { name, hidden, child: 0, layer, rotation, translation };
    Ok(PendingNode { id, node: Node::Transform(node), links: vec![child] })
}

fn decode_group(chunk: &Chunk) -> VoxResult<PendingNode> {
    let mut cursor = body_cursor(chunk);
    let id = cursor.read_i32("node id")?;
    let attributes = Dict::decode(&mut cursor)?;
    expect_empty(chunk.id, id, &attributes, "group attributes")?;

    let count = cursor.read_i32("group child count")?;
    let count = usize::try_from(count).map_err(|_| VoxError::MalformedNode {
        chunk: chunk.id,
        node_id: id,
        reason: format!("negative child count {count}"),
    })?;
    if count.saturating_mul(4) > cursor.remaining() {
        return Err(VoxError::Truncated {
            context: "group child ids",
            offset: cursor.offset(),
            needed: count as u64 * 4,
            remaining: cursor.remaining() as u64,
        });
    }
    let mut links = Vec::with_capacity(count);
    for _ in 0..count {
        links.push(cursor.read_i32("group child id")?);
    }
    cursor.expect_end(chunk.id, chunk.offset)?;

    Ok(PendingNode { id, node: Node::Group(GroupNode::default()), links })
}

fn decode_shape(chunk: &Chunk) -> VoxResult<PendingNode> {
    let mut cursor = body_cursor(chunk);
    let id = cursor.read_i32("node id")?;
    let attributes = Dict::decode(&mut cursor)?;
    expect_empty(chunk.id, id, &attributes, "shape attributes")?;

    let models = cursor.read_i32("shape model count")?;
    let malformed = |reason: String| VoxError::MalformedNode { chunk: chunk.id, node_id: id, reason };
    if models != 1 {
        return Err(malformed(format!("model count was {models}, expected 1")));
    }
    let model = cursor.read_i32("shape model id")?;
    let model = usize::try_from(model).map_err(|_| malformed(format!("negative model id {model}")))?;
    let model_attributes = Dict::decode(&mut cursor)?;
    expect_empty(chunk.id, id, &model_attributes, "model attributes")?;
    cursor.expect_end(chunk.id, chunk.offset)?;

    Ok(PendingNode { id, node: Node::Shape(ShapeNode { model }), links: Vec::new() })
}

// ============================================================================
// SCENE GRAPH
// ============================================================================

/// Nodes indexed by dense arena position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    /// Creates an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Appends a node and returns its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Number of nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All nodes in id order.
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Shape nodes in id order.
    pub fn shapes(&self) -> impl Iterator<Item = (NodeId, &ShapeNode)> {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match node {
            Node::Shape(shape) => Some((id, shape)),
            _ => None,
        })
    }

    /// Checks references, node kinds, model indices and that the nodes form
    /// one tree rooted at node 0.
    pub fn validate(&self, model_count: usize) -> VoxResult<()> {
        for (id, node) in self.nodes.iter().enumerate() {
            let malformed = |reason: String| VoxError::MalformedNode {
                chunk: node.chunk_id(),
                node_id: file_id(id),
                reason,
            };
            match node {
                Node::Transform(transform) => match self.nodes.get(transform.child) {
                    None => {
                        return Err(VoxError::DanglingNodeReference {
                            from: file_id(id),
                            to: file_id(transform.child),
                        })
                    }
                    Some(Node::Transform(_)) => {
                        return Err(malformed(format!(
                            "child {} is a transform, expected a group or shape",
                            transform.child
                        )))
                    }
                    Some(_) => {}
                },
                Node::Group(group) => {
                    for &child in &group.children {
                        match self.nodes.get(child) {
                            None => {
                                return Err(VoxError::DanglingNodeReference {
                                    from: file_id(id),
                                    to: file_id(child),
                                })
                            }
                            Some(Node::Transform(_)) => {}
                            Some(_) => {
                                return Err(malformed(format!("child {child} is not a transform")))
                            }
                        }
                    }
                }
                Node::Shape(shape) => {
                    if shape.model >= model_count {
                        return Err(malformed(format!(
                            "model {} out of range ({model_count} models)",
                            shape.model
                        )));
                    }
                }
            }
        }
        self.validate_tree()
    }

    /// Depth-first walk from node 0: every node is reached exactly once.
    ///
    /// Assumes references were already checked to be in range.
    fn validate_tree(&self) -> VoxResult<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unseen,
            Open,
            Done,
        }

        let malformed = |id: NodeId, reason: &str| VoxError::MalformedNode {
            chunk: self.nodes[id].chunk_id(),
            node_id: file_id(id),
            reason: reason.to_owned(),
        };

        match self.nodes.first() {
            None => return Ok(()),
            Some(Node::Transform(_)) => {}
            Some(_) => return Err(malformed(0, "root node must be a transform")),
        }

        let mut marks = vec![Mark::Unseen; self.nodes.len()];
        let mut stack = vec![(0usize, false)];
        while let Some((id, leaving)) = stack.pop() {
            if leaving {
                marks[id] = Mark::Done;
                continue;
            }
            match marks[id] {
                Mark::Open => return Err(malformed(id, "scene graph contains a cycle")),
                Mark::Done => return Err(malformed(id, "node is reached from more than one parent")),
                Mark::Unseen => {}
            }
            marks[id] = Mark::Open;
            stack.push((id, true));
            let children: &[NodeId] = match &self.nodes[id] {
                Node::Transform(transform) => std::slice::from_ref(&transform.child),
                Node::Group(group) => &group.children,
                Node::Shape(_) => &[],
            };
            stack.extend(children.iter().rev().map(|&child| (child, false)));
        }

        match marks.iter().position(|&mark| mark == Mark::Unseen) {
            Some(id) => Err(malformed(id, "node is not reachable from the root")),
            None => Ok(()),
        }
    }

    /// Serializes every node, node `i` with id `i`.
    #[must_use]
    pub fn encode(&self) -> Vec<Chunk> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(id, node)| encode_node(file_id(id), node))
            .collect()
    }

    /// Walks transforms breadth-first from node 0.
    ///
    /// Every transform reached becomes one [`ScenePart`] with its world
    /// placement composed from its ancestors. Hidden layers hide their parts.
    pub fn parts(&self, layers: &[Layer]) -> VoxResult<Vec<ScenePart>> {
        let mut parts = Vec::new();
        if self.nodes.is_empty() {
            return Ok(parts);
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([(0usize, None::<usize>)]);
        while let Some((id, parent)) = queue.pop_front() {
            let Some(Node::Transform(transform)) = self.nodes.get(id) else {
                let chunk = self.nodes.get(id).map_or(ChunkId::TRANSFORM, Node::chunk_id);
                return Err(VoxError::MalformedNode {
                    chunk,
                    node_id: file_id(id),
                    reason: "expected a transform".to_owned(),
                });
            };
            if std::mem::replace(&mut visited[id], true) {
                return Err(VoxError::MalformedNode {
                    chunk: ChunkId::TRANSFORM,
                    node_id: file_id(id),
                    reason: "scene graph contains a cycle".to_owned(),
                });
            }

            let (world_translation, world_rotation) = match parent {
                Some(p) => {
                    let parent: &ScenePart = &parts[p];
                    let offset = parent.world_rotation.apply(transform.translation());
                    let mut world = [0i64; 3];
                    for (axis, slot) in world.iter_mut().enumerate() {
                        *slot = parent.world_translation[axis].checked_add(offset[axis]).ok_or_else(|| {
                            VoxError::MalformedNode {
                                chunk: ChunkId::TRANSFORM,
                                node_id: file_id(id),
                                reason: "world translation overflows".to_owned(),
                            }
                        })?;
                    }
                    (world, parent.world_rotation.then(transform.rotation()))
                }
                None => (transform.translation().map(i64::from), transform.rotation()),
            };
            let layer_hidden = transform
                .layer
                .and_then(|layer| layers.iter().find(|l| l.id == layer))
                .is_some_and(Layer::is_hidden);

            let index = parts.len();
            let mut model = None;
            match self.nodes.get(transform.child) {
                Some(Node::Group(group)) => {
                    queue.extend(group.children.iter().map(|&child| (child, Some(index))));
                }
                Some(Node::Shape(shape)) => model = Some(shape.model),
                _ => {
                    return Err(VoxError::MalformedNode {
                        chunk: ChunkId::TRANSFORM,
                        node_id: file_id(id),
                        reason: format!("child {} is not a group or shape", transform.child),
                    })
                }
            }

            parts.push(ScenePart {
                node: id,
                name: transform.name.clone(),
                parent,
                translation: transform.translation(),
                rotation: transform.rotation(),
                world_translation,
                world_rotation,
                layer: transform.layer,
                hidden: transform.is_hidden() || layer_hidden,
                model,
            });
        }
        Ok(parts)
    }
}

fn encode_node(id: i32, node: &Node) -> Chunk {
    let mut out = ByteWriter::new();
    out.write_i32(id);
    match node {
        Node::Transform(transform) => {
            encode_name_hidden(transform.name.as_deref(), transform.hidden).encode(&mut out);
            out.write_i32(file_id(transform.child));
            out.write_i32(-1);
            out.write_i32(transform.layer.map_or(-1, |layer| layer as i32));
            out.write_i32(1);
            let mut frame = Dict::new();
            if let Some(rotation) = transform.rotation {
                frame.push("_r", rotation.byte().to_string());
            }
            if let Some(translation) = transform.translation {
                frame.push("_t", text::format_ints(&translation));
            }
            frame.encode(&mut out);
        }
        Node::Group(group) => {
            Dict::new().encode(&mut out);
            out.write_len(group.children.len());
            for &child in &group.children {
                out.write_i32(file_id(child));
            }
        }
        Node::Shape(shape) => {
            Dict::new().encode(&mut out);
            out.write_i32(1);
            out.write_i32(i32::try_from(shape.model).unwrap_or(i32::MAX));
            Dict::new().encode(&mut out);
        }
    }
    Chunk::new(node.chunk_id(), out.into_inner())
}

/// One transform reached by [`SceneGraph::parts`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenePart {
    /// Transform node this part comes from.
    pub node: NodeId,
    /// Node name.
    pub name: Option<String>,
    /// Index of the parent part.
    pub parent: Option<usize>,
    /// Translation relative to the parent.
    pub translation: [i32; 3],
    /// Rotation relative to the parent.
    pub rotation: Rotation,
    /// Translation in model space. Nested offsets can leave the `i32` range.
    pub world_translation: [i64; 3],
    /// Rotation in model space.
    pub world_rotation: Rotation,
    /// Layer id.
    pub layer: Option<u32>,
    /// Hidden by the node or its layer.
    pub hidden: bool,
    /// Model placed by this part, if its child is a shape.
    pub model: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> SceneGraph {
        let mut graph = SceneGraph::new();
        graph.push(Node::Transform(TransformNode::new(1)));
        graph.push(Node::Group(GroupNode { children: vec![2] }));
        graph.push(Node::Transform(TransformNode {
            name: Some("arm".to_owned()),
            layer: Some(0),
            translation: Some([1, -2, 3]),
            rotation: Some(Rotation::from_byte(0b0010_0001).unwrap()),
            ..TransformNode::new(3)
        }));
        graph.push(Node::Shape(ShapeNode { model: 0 }));
        graph
    }

    fn decode_all(chunks: &[Chunk], models: usize) -> VoxResult<SceneGraph> {
        let mut decoder = SceneDecoder::new();
        for chunk in chunks {
            decoder.push_chunk(chunk)?;
        }
        decoder.finish(models)
    }

    #[test]
    fn test_rotation_identity_matrix() {
        assert_eq!(Rotation::IDENTITY.matrix(), [[1, 0, 0], [0, 1, 0], [0, 0, 1]]);
        assert_eq!(Rotation::from_matrix(Rotation::IDENTITY.matrix()), Some(Rotation::IDENTITY));
    }

    #[test]
    fn test_rotation_validation() {
        assert!(Rotation::from_byte(0).is_none()); // both rows on column 0
        assert!(Rotation::from_byte(0b0000_0011).is_none());
        assert!(Rotation::from_byte(0x84).is_none());
        assert!(Rotation::from_byte(0b0111_0110).is_some());
    }

    #[test]
    fn test_rotation_round_trips_all_bytes() {
        for byte in 0..=u8::MAX {
            if let Some(rotation) = Rotation::from_byte(byte) {
                assert_eq!(Rotation::from_matrix(rotation.matrix()), Some(rotation));
            }
        }
    }

    #[test]
    fn test_rotation_compose() {
        // 90 degrees about z: x -> y, y -> -x
        let quarter = Rotation::from_matrix([[0, -1, 0], [1, 0, 0], [0, 0, 1]]).unwrap();
        assert_eq!(quarter.apply([1, 0, 0]), [0, 1, 0]);
        let half = quarter.then(quarter);
        assert_eq!(half.matrix(), [[-1, 0, 0], [0, -1, 0], [0, 0, 1]]);
        assert_eq!(half.then(half), Rotation::IDENTITY);
    }

    #[test]
    fn test_node_round_trip_is_byte_identical() {
        let graph = chain();
        let chunks = graph.encode();
        let decoded = decode_all(&chunks, 1).unwrap();
        assert_eq!(decoded, graph);
        assert_eq!(decoded.encode(), chunks);
    }

    #[test]
    fn test_file_ids_are_densified() {
        let graph = chain();
        let mut chunks = graph.encode();
        // Renumber node ids 0..3 to 10, 20, 30, 40 and patch references.
        let remap = |id: i32| (id + 1) * 10;
        for chunk in &mut chunks {
            let id = i32::from_le_bytes(chunk.body[0..4].try_into().unwrap());
            chunk.body[0..4].copy_from_slice(&remap(id).to_le_bytes());
        }
        // nTRN 0: child at 4 + dict(4)
        chunks[0].body[8..12].copy_from_slice(&remap(1).to_le_bytes());
        // nGRP 1: one child after dict + count
        chunks[1].body[12..16].copy_from_slice(&remap(2).to_le_bytes());
        // nTRN 2: child after its attribute dictionary
        let dict_len = Dict::new().with("_name", "arm").encoded_len();
        let at = 4 + dict_len;
        chunks[2].body[at..at + 4].copy_from_slice(&remap(3).to_le_bytes());

        let decoded = decode_all(&chunks, 1).unwrap();
        assert_eq!(decoded, graph);
    }

    #[test]
    fn test_duplicate_and_dangling_ids() {
        let mut chunks = chain().encode();
        chunks[3].body[0..4].copy_from_slice(&2i32.to_le_bytes());
        assert!(matches!(decode_all(&chunks, 1), Err(VoxError::DuplicateNodeId { id: 2 })));

        let mut chunks = chain().encode();
        chunks[1].body[12..16].copy_from_slice(&9i32.to_le_bytes());
        assert!(matches!(
            decode_all(&chunks, 1),
            Err(VoxError::DanglingNodeReference { from: 1, to: 9 })
        ));
    }

    #[test]
    fn test_shape_model_must_exist() {
        let chunks = chain().encode();
        assert!(matches!(
            decode_all(&chunks, 0),
            Err(VoxError::MalformedNode { chunk: ChunkId::SHAPE, node_id: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_transform_attribute_is_rejected() {
        let mut out = ByteWriter::new();
        out.write_i32(0);
        Dict::new().with("_color", "red").encode(&mut out);
        let chunk = Chunk::new(ChunkId::TRANSFORM, out.into_inner());
        assert!(matches!(
            SceneDecoder::new().push_chunk(&chunk),
            Err(VoxError::UnknownAttributeKey { chunk: ChunkId::TRANSFORM, .. })
        ));
    }

    #[test]
    fn test_group_attributes_must_be_empty() {
        let mut out = ByteWriter::new();
        out.write_i32(0);
        Dict::new().with("_name", "g").encode(&mut out);
        out.write_i32(0);
        let chunk = Chunk::new(ChunkId::GROUP, out.into_inner());
        assert!(matches!(
            SceneDecoder::new().push_chunk(&chunk),
            Err(VoxError::MalformedNode { chunk: ChunkId::GROUP, node_id: 0, .. })
        ));
    }

    #[test]
    fn test_trailing_body_bytes_are_rejected() {
        let mut chunk = encode_node(0, &Node::Shape(ShapeNode { model: 0 }));
        chunk.body.push(0);
        assert!(matches!(
            SceneDecoder::new().push_chunk(&chunk),
            Err(VoxError::ChunkLengthMismatch { field: "body", .. })
        ));
    }

    #[test]
    fn test_layer_round_trip() {
        let layer = Layer { id: 3, name: Some("Hidden".to_owned()), hidden: Some(true) };
        assert_eq!(Layer::decode(&layer.encode()).unwrap(), layer);

        let mut chunk = Layer::named(0, "0").encode();
        let len = chunk.body.len();
        chunk.body[len - 4..].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            Layer::decode(&chunk),
            Err(VoxError::MalformedNode { chunk: ChunkId::LAYER, .. })
        ));
    }

    #[test]
    fn test_parts_compose_placement() {
        let layers = vec![Layer { id: 0, name: None, hidden: Some(true) }];
        let parts = chain().parts(&layers).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].parent, None);
        assert_eq!(parts[0].model, None);
        assert_eq!(parts[1].parent, Some(0));
        assert_eq!(parts[1].name.as_deref(), Some("arm"));
        assert_eq!(parts[1].world_translation, [1, -2, 3]);
        assert_eq!(parts[1].model, Some(0));
        assert!(parts[1].hidden);
        assert!(!parts[0].hidden);
    }

    #[test]
    fn test_parts_widen_world_translation() {
        let mut graph = SceneGraph::new();
        graph.push(Node::Transform(TransformNode { translation: Some([i32::MAX, 0, 0]), ..TransformNode::new(1) }));
        graph.push(Node::Group(GroupNode { children: vec![2, 4] }));
        graph.push(Node::Transform(TransformNode { translation: Some([1, 0, 0]), ..TransformNode::new(3) }));
        graph.push(Node::Shape(ShapeNode { model: 0 }));
        graph.push(Node::Transform(TransformNode { translation: Some([0, i32::MIN, 0]), ..TransformNode::new(5) }));
        graph.push(Node::Shape(ShapeNode { model: 0 }));
        graph.validate(1).unwrap();

        let parts = graph.parts(&[]).unwrap();
        assert_eq!(parts[1].world_translation, [i64::from(i32::MAX) + 1, 0, 0]);
        assert_eq!(parts[2].world_translation, [i64::from(i32::MAX), i64::from(i32::MIN), 0]);
    }

    #[test]
    fn test_negated_minimum_translation() {
        // Row 0 takes column 0 negated, row 1 column 1, row 2 column 2.
        let flip_x = Rotation::from_byte(0b0001_0100).unwrap();
        assert_eq!(flip_x.apply([i32::MIN, 0, 0]), [-i64::from(i32::MIN), 0, 0]);

        let mut graph = SceneGraph::new();
        graph.push(Node::Transform(TransformNode { rotation: Some(flip_x), ..TransformNode::new(1) }));
        graph.push(Node::Group(GroupNode { children: vec![2] }));
        graph.push(Node::Transform(TransformNode { translation: Some([i32::MIN, 0, 0]), ..TransformNode::new(3) }));
        graph.push(Node::Shape(ShapeNode { model: 0 }));

        let parts = graph.parts(&[]).unwrap();
        assert_eq!(parts[1].world_translation, [1i64 << 31, 0, 0]);
    }

    #[test]
    fn test_validate_rejects_cycles() {
        // The inner transform points back at the group that holds it.
        let mut graph = SceneGraph::new();
        graph.push(Node::Transform(TransformNode::new(1)));
        graph.push(Node::Group(GroupNode { children: vec![2] }));
        graph.push(Node::Transform(TransformNode::new(1)));
        assert!(matches!(
            graph.validate(0),
            Err(VoxError::MalformedNode { chunk: ChunkId::GROUP, node_id: 1, reason }) if reason.contains("cycle")
        ));
        assert!(decode_all(&graph.encode(), 0).is_err());
    }

    #[test]
    fn test_validate_rejects_shared_and_unreachable_nodes() {
        let mut graph = SceneGraph::new();
        graph.push(Node::Transform(TransformNode::new(1)));
        graph.push(Node::Group(GroupNode { children: vec![2, 2] }));
        graph.push(Node::Transform(TransformNode::new(3)));
        graph.push(Node::Shape(ShapeNode { model: 0 }));
        assert!(matches!(
            graph.validate(1),
            Err(VoxError::MalformedNode { node_id: 2, reason, .. }) if reason.contains("more than one parent")
        ));

        let mut graph = chain();
        graph.push(Node::Transform(TransformNode::new(3)));
        assert!(matches!(
            graph.validate(1),
            Err(VoxError::MalformedNode { node_id: 4, reason, .. }) if reason.contains("not reachable")
        ));

        let mut graph = SceneGraph::new();
        graph.push(Node::Shape(ShapeNode { model: 0 }));
        assert!(matches!(
            graph.validate(1),
            Err(VoxError::MalformedNode { chunk: ChunkId::SHAPE, node_id: 0, .. })
        ));
        assert!(SceneGraph::new().validate(0).is_ok());
    }

    #[test]
    fn test_parts_reject_cycles() {
        let mut graph = SceneGraph::new();
        graph.push(Node::Transform(TransformNode::new(1)));
        graph.push(Node::Group(GroupNode { children: vec![0] }));
        assert!(matches!(
            graph.parts(&[]),
            Err(VoxError::MalformedNode { reason, .. }) if reason.contains("cycle")
        ));
    }
}
