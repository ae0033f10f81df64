//! # Render Objects
//!
//! `rOBJ` chunks carry editor render settings. Each body is a single
//! dictionary whose first key is `_type`; the type selects a fixed key
//! sequence:
//!
//! ```text
//! _inf       _i _k _angle _area _disk
//! _uni       _i _k
//! _atm       _ray_d _ray_k _mie_d _mie_k _mie_g _o3_d _o3_k
//! _fog_uni   _d _k
//! _lens      _fov _dof _expo _vig _sg _blade_n _blade_r
//! _bloom     _mix _scale _aspect _threshold
//! _tone      _aces _gam
//! _ground    _color _hor
//! _bg        _color
//! _edge      _color _width
//! _grid      _color _spacing _width _display
//! _setting   _ground _sw _aa _grid _edge _bg_c _bg_a _scale
//! ```
//!
//! The codec does not interpret these values. A [`RenderObject`] keeps the
//! validated dictionary exactly as read so it is re-emitted byte for byte;
//! the typed records ([`Sun`], [`Lens`], ...) are views decoded on demand.

use crate::chunk::{Chunk, ChunkId, CHUNK_HEADER_LEN};
use crate::config::KeyOrder;
use crate::cursor::{ByteCursor, ByteWriter};
use crate::dict::Dict;
use crate::error::{VoxError, VoxResult};
use crate::text;

/// Text shape of a render attribute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ValueKind {
    Float,
    Bool,
    Rgb,
    Angle,
    U8,
    I16,
    I32,
    U32,
}

impl ValueKind {
    fn check(self, key: &str, value: &str) -> VoxResult<()> {
        let c = ChunkId::RENDER;
        match self {
            Self::Float => text::parse_float(c, key, value).map(drop),
            Self::Bool => text::parse_bool(c, key, value).map(drop),
            Self::Rgb => text::parse_rgb(c, key, value).map(drop),
            Self::Angle => parse_angle(key, value).map(drop),
            Self::U8 => text::parse_int::<u8>(c, key, value).map(drop),
            Self::I16 => text::parse_int::<i16>(c, key, value).map(drop),
            Self::I32 => text::parse_int::<i32>(c, key, value).map(drop),
            Self::U32 => text::parse_int::<u32>(c, key, value).map(drop),
        }
    }
}

fn parse_angle(key: &str, value: &str) -> VoxResult<[i8; 2]> {
    let [a, b] = text::parse_ints::<2>(ChunkId::RENDER, key, value)?;
    match (i8::try_from(a), i8::try_from(b)) {
        (Ok(a), Ok(b)) => Ok([a, b]),
        _ => Err(VoxError::InvalidAttributeValue {
            chunk: ChunkId::RENDER,
            key: key.to_owned(),
            value: value.to_owned(),
            reason: "angle outside -128..=127",
        }),
    }
}

/// The twelve render object types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderKind {
    /// `_inf`
    Sun,
    /// `_uni`
    UniformSky,
    /// `_atm`
    AtmosphericSky,
    /// `_fog_uni`
    Fog,
    /// `_lens`
    Lens,
    /// `_bloom`
    Bloom,
    /// `_tone`
    Tone,
    /// `_ground`
    Ground,
    /// `_bg`
    Background,
    /// `_edge`
    Edge,
    /// `_grid`
    Grid,
    /// `_setting`
    GlobalSettings,
}

impl RenderKind {
    /// Every kind, in the order files are written.
    pub const ALL: [Self; 12] = [
        Self::Sun,
        Self::UniformSky,
        Self::AtmosphericSky,
        Self::Fog,
        Self::Lens,
        Self::Bloom,
        Self::Tone,
        Self::Ground,
        Self::Background,
        Self::Edge,
        Self::Grid,
        Self::GlobalSettings,
    ];

    /// Value of the `_type` key.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Sun => "_inf",
            Self::UniformSky => "_uni",
            Self::AtmosphericSky => "_atm",
            Self::Fog => "_fog_uni",
            Self::Lens => "_lens",
            Self::Bloom => "_bloom",
            Self::Tone => "_tone",
            Self::Ground => "_ground",
            Self::Background => "_bg",
            Self::Edge => "_edge",
            Self::Grid => "_grid",
            Self::GlobalSettings => "_setting",
        }
    }

    /// Looks up a kind by its `_type` value.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }

    /// Keys following `_type`, in order.
    pub fn keys(self) -> impl Iterator<Item = &'static str> {
        self.schema().iter().map(|&(key, _)| key)
    }

    fn schema(self) -> &'static [(&'static str, ValueKind)] {
        use ValueKind::{Angle, Bool, Float, Rgb, I16, I32, U32, U8};
        match self {
            Self::Sun => &[("_i", Float), ("_k", Rgb), ("_angle", Angle), ("_area", Float), ("_disk", Bool)],
            Self::UniformSky => &[("_i", Float), ("_k", Rgb)],
            Self::AtmosphericSky => &[
                ("_ray_d", Float),
                ("_ray_k", Rgb),
                ("_mie_d", Float),
                ("_mie_k", Rgb),
                ("_mie_g", Float),
                ("_o3_d", Float),
                ("_o3_k", Rgb),
            ],
            Self::Fog => &[("_d", Float), ("_k", Rgb)],
            Self::Lens => &[
                ("_fov", I32),
                ("_dof", Float),
                ("_expo", Float),
                ("_vig", Bool),
                ("_sg", Bool),
                ("_blade_n", U8),
                ("_blade_r", I16),
            ],
            Self::Bloom => &[("_mix", Float), ("_scale", Float), ("_aspect", Float), ("_threshold", Float)],
            Self::Tone => &[("_aces", Bool), ("_gam", Float)],
            Self::Ground => &[("_color", Rgb), ("_hor", Float)],
            Self::Background => &[("_color", Rgb)],
            Self::Edge => &[("_color", Rgb), ("_width", Float)],
            Self::Grid => &[("_color", Rgb), ("_spacing", U32), ("_width", Float), ("_display", Bool)],
            Self::GlobalSettings => &[
                ("_ground", Bool),
                ("_sw", Bool),
                ("_aa", Bool),
                ("_grid", Bool),
                ("_edge", Bool),
                ("_bg_c", Bool),
                ("_bg_a", Bool),
                ("_scale", Rgb),
            ],
        }
    }
}

// ============================================================================
// RENDER OBJECT
// ============================================================================

/// A validated `rOBJ` dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderObject {
    kind: RenderKind,
    attributes: Dict,
}

impl RenderObject {
    /// Validates a dictionary against its type's key sequence.
    pub fn from_dict(attributes: Dict, order: KeyOrder) -> VoxResult<Self> {
        let malformed = |render_type: &str, reason: String| VoxError::MalformedRenderObject {
            render_type: render_type.to_owned(),
            reason,
        };

        let type_name = match attributes.entry(0) {
            Some(("_type", value)) => value,
            Some((key, _)) => return Err(malformed("", format!("first key must be _type, found {key}"))),
            None => return Err(malformed("", "no properties".to_owned())),
        };
        let kind = RenderKind::from_type_name(type_name)
            .ok_or_else(|| malformed(type_name, "unknown render object type".to_owned()))?;

        let schema = kind.schema();
        if attributes.len() != schema.len() + 1 {
            return Err(malformed(
                type_name,
                format!("expected {} properties, found {}", schema.len() + 1, attributes.len()),
            ));
        }

        for (position, &(expected, value_kind)) in schema.iter().enumerate() {
            let value = match order {
                KeyOrder::Strict => match attributes.entry(position + 1) {
                    Some((key, value)) if key == expected => value,
                    Some((key, _)) => {
                        return Err(malformed(
                            type_name,
                            format!("property {} must be {expected}, found {key}", position + 1),
                        ))
                    }
                    None => return Err(malformed(type_name, format!("missing {expected}"))),
                },
                KeyOrder::Relaxed => {
                    let mut matches = attributes.iter().skip(1).filter(|(key, _)| *key == expected);
                    match (matches.next(), matches.next()) {
                        (Some((_, value)), None) => value,
                        (None, _) => return Err(malformed(type_name, format!("missing {expected}"))),
                        (Some(_), Some(_)) => {
                            return Err(malformed(type_name, format!("{expected} appears twice")))
                        }
                    }
                }
            };
            value_kind.check(expected, value)?;
        }

        Ok(Self { kind, attributes })
    }

    /// Parses an `rOBJ` chunk.
    pub fn decode(chunk: &Chunk, order: KeyOrder) -> VoxResult<Self> {
        let mut cursor = ByteCursor::new(&chunk.body, chunk.offset + CHUNK_HEADER_LEN);
        let attributes = Dict::decode(&mut cursor)?;
        cursor.expect_end(chunk.id, chunk.offset)?;
        Self::from_dict(attributes, order)
    }

    /// Serializes an `rOBJ` chunk.
    #[must_use]
    pub fn encode(&self) -> Chunk {
        let mut out = ByteWriter::with_capacity(self.attributes.encoded_len());
        self.attributes.encode(&mut out);
        Chunk::new(ChunkId::RENDER, out.into_inner())
    }

    /// Object type.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> RenderKind {
        self.kind
    }

    /// Dictionary as stored, `_type` first.
    #[inline]
    #[must_use]
    pub const fn attributes(&self) -> &Dict {
        &self.attributes
    }

    /// Raw text of one property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    fn from_pairs(kind: RenderKind, values: Vec<String>) -> Self {
        let mut attributes = Dict::new().with("_type", kind.type_name());
        for (key, value) in kind.keys().zip(values) {
            attributes.push(key, value);
        }
        Self { kind, attributes }
    }

    fn raw(&self, key: &str) -> VoxResult<&str> {
        self.get(key).ok_or_else(|| VoxError::MalformedRenderObject {
            render_type: self.kind.type_name().to_owned(),
            reason: format!("missing {key}"),
        })
    }

    fn float(&self, key: &str) -> VoxResult<f32> {
        text::parse_float(ChunkId::RENDER, key, self.raw(key)?)
    }

    fn flag(&self, key: &str) -> VoxResult<bool> {
        text::parse_bool(ChunkId::RENDER, key, self.raw(key)?)
    }

    fn rgb(&self, key: &str) -> VoxResult<[u8; 3]> {
        text::parse_rgb(ChunkId::RENDER, key, self.raw(key)?)
    }

    fn int<T: std::str::FromStr>(&self, key: &str) -> VoxResult<T> {
        text::parse_int(ChunkId::RENDER, key, self.raw(key)?)
    }

    fn expect_kind(&self, kind: RenderKind) -> VoxResult<()> {
        if self.kind == kind {
            return Ok(());
        }
        Err(VoxError::MalformedRenderObject {
            render_type: self.kind.type_name().to_owned(),
            reason: format!("expected a {} object", kind.type_name()),
        })
    }
}

// ============================================================================
// TYPED RECORDS
// ============================================================================

/// A typed view of one render object type.
pub trait RenderRecord: Sized + Default {
    /// Object type this record decodes.
    const KIND: RenderKind;

    /// Decodes the record from a validated object of [`Self::KIND`].
    fn from_object(object: &RenderObject) -> VoxResult<Self>;

    /// Builds the object this record is written as.
    fn to_object(&self) -> RenderObject;
}

fn float(value: f32) -> String {
    text::format_float(value)
}

fn flag(value: bool) -> String {
    text::format_bool(value).to_owned()
}

/// `_inf`: directional sun light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sun {
    /// `_i`
    pub intensity: f32,
    /// `_k`
    pub color: [u8; 3],
    /// `_angle`
    pub angle: [i8; 2],
    /// `_area`
    pub area: f32,
    /// `_disk`
    pub disk: bool,
}

impl Default for Sun {
    fn default() -> Self {
        Self { intensity: 0.6, color: [255, 255, 255], angle: [50, 50], area: 0.07, disk: false }
    }
}

impl RenderRecord for Sun {
    const KIND: RenderKind = RenderKind::Sun;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self {
            intensity: object.float("_i")?,
            color: object.rgb("_k")?,
            angle: parse_angle("_angle", object.raw("_angle")?)?,
            area: object.float("_area")?,
            disk: object.flag("_disk")?,
        })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(
            Self::KIND,
            vec![
                float(self.intensity),
                text::format_rgb(self.color),
                format!("{} {}", self.angle[0], self.angle[1]),
                float(self.area),
                flag(self.disk),
            ],
        )
    }
}

/// `_uni`: uniform sky light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformSky {
    /// `_i`
    pub intensity: f32,
    /// `_k`
    pub color: [u8; 3],
}

impl Default for UniformSky {
    fn default() -> Self {
        Self { intensity: 0.7, color: [255, 255, 255] }
    }
}

impl RenderRecord for UniformSky {
    const KIND: RenderKind = RenderKind::UniformSky;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self { intensity: object.float("_i")?, color: object.rgb("_k")? })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(Self::KIND, vec![float(self.intensity), text::format_rgb(self.color)])
    }
}

/// `_atm`: physically based sky.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtmosphericSky {
    /// `_ray_d`
    pub rayleigh_density: f32,
    /// `_ray_k`
    pub rayleigh_color: [u8; 3],
    /// `_mie_d`
    pub mie_density: f32,
    /// `_mie_k`
    pub mie_color: [u8; 3],
    /// `_mie_g`
    pub mie_phase: f32,
    /// `_o3_d`
    pub ozone_density: f32,
    /// `_o3_k`
    pub ozone_color: [u8; 3],
}

impl Default for AtmosphericSky {
    fn default() -> Self {
        Self {
            rayleigh_density: 0.4,
            rayleigh_color: [45, 104, 255],
            mie_density: 0.4,
            mie_color: [255, 255, 255],
            mie_phase: 0.85,
            ozone_density: 0.0,
            ozone_color: [105, 255, 110],
        }
    }
}

impl RenderRecord for AtmosphericSky {
    const KIND: RenderKind = RenderKind::AtmosphericSky;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self {
            rayleigh_density: object.float("_ray_d")?,
            rayleigh_color: object.rgb("_ray_k")?,
            mie_density: object.float("_mie_d")?,
            mie_color: object.rgb("_mie_k")?,
            mie_phase: object.float("_mie_g")?,
            ozone_density: object.float("_o3_d")?,
            ozone_color: object.rgb("_o3_k")?,
        })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(
            Self::KIND,
            vec![
                float(self.rayleigh_density),
                text::format_rgb(self.rayleigh_color),
                float(self.mie_density),
                text::format_rgb(self.mie_color),
                float(self.mie_phase),
                float(self.ozone_density),
                text::format_rgb(self.ozone_color),
            ],
        )
    }
}

/// `_fog_uni`: uniform fog.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    /// `_d`
    pub density: f32,
    /// `_k`
    pub color: [u8; 3],
}

impl Default for Fog {
    fn default() -> Self {
        Self { density: 0.0, color: [255, 255, 255] }
    }
}

impl RenderRecord for Fog {
    const KIND: RenderKind = RenderKind::Fog;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self { density: object.float("_d")?, color: object.rgb("_k")? })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(Self::KIND, vec![float(self.density), text::format_rgb(self.color)])
    }
}

/// `_lens`: camera lens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lens {
    /// `_fov`, degrees.
    pub field_of_view: i32,
    /// `_dof`
    pub depth_of_field: f32,
    /// `_expo`
    pub exposure: f32,
    /// `_vig`
    pub vignette: bool,
    /// `_sg`
    pub stereographic: bool,
    /// `_blade_n`
    pub blade_count: u8,
    /// `_blade_r`
    pub blade_rotation: i16,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            field_of_view: 45,
            depth_of_field: 0.25,
            exposure: 1.0,
            vignette: false,
            stereographic: false,
            blade_count: 0,
            blade_rotation: 0,
        }
    }
}

impl RenderRecord for Lens {
    const KIND: RenderKind = RenderKind::Lens;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self {
            field_of_view: object.int("_fov")?,
            depth_of_field: object.float("_dof")?,
            exposure: object.float("_expo")?,
            vignette: object.flag("_vig")?,
            stereographic: object.flag("_sg")?,
            blade_count: object.int("_blade_n")?,
            blade_rotation: object.int("_blade_r")?,
        })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(
            Self::KIND,
            vec![
                self.field_of_view.to_string(),
                float(self.depth_of_field),
                float(self.exposure),
                flag(self.vignette),
                flag(self.stereographic),
                self.blade_count.to_string(),
                self.blade_rotation.to_string(),
            ],
        )
    }
}

/// `_bloom`: post-process bloom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bloom {
    /// `_mix`
    pub mix: f32,
    /// `_scale`
    pub scale: f32,
    /// `_aspect`
    pub aspect: f32,
    /// `_threshold`
    pub threshold: f32,
}

impl Default for Bloom {
    fn default() -> Self {
        Self { mix: 0.5, scale: 0.0, aspect: 0.0, threshold: 1.0 }
    }
}

impl RenderRecord for Bloom {
    const KIND: RenderKind = RenderKind::Bloom;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self {
            mix: object.float("_mix")?,
            scale: object.float("_scale")?,
            aspect: object.float("_aspect")?,
            threshold: object.float("_threshold")?,
        })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(
            Self::KIND,
            vec![float(self.mix), float(self.scale), float(self.aspect), float(self.threshold)],
        )
    }
}

/// `_tone`: tone mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    /// `_aces`
    pub aces: bool,
    /// `_gam`
    pub gamma: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self { aces: false, gamma: 2.2 }
    }
}

impl RenderRecord for Tone {
    const KIND: RenderKind = RenderKind::Tone;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self { aces: object.flag("_aces")?, gamma: object.float("_gam")? })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(Self::KIND, vec![flag(self.aces), float(self.gamma)])
    }
}

/// `_ground`: ground plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ground {
    /// `_color`
    pub color: [u8; 3],
    /// `_hor`
    pub horizon: f32,
}

impl Default for Ground {
    fn default() -> Self {
        Self { color: [80, 80, 80], horizon: 0.1 }
    }
}

impl RenderRecord for Ground {
    const KIND: RenderKind = RenderKind::Ground;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self { color: object.rgb("_color")?, horizon: object.float("_hor")? })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(Self::KIND, vec![text::format_rgb(self.color), float(self.horizon)])
    }
}

/// `_bg`: background color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Background {
    /// `_color`
    pub color: [u8; 3],
}

impl RenderRecord for Background {
    const KIND: RenderKind = RenderKind::Background;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self { color: object.rgb("_color")? })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(Self::KIND, vec![text::format_rgb(self.color)])
    }
}

/// `_edge`: outline rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    /// `_color`
    pub color: [u8; 3],
    /// `_width`
    pub width: f32,
}

impl Default for Edge {
    fn default() -> Self {
        Self { color: [0, 0, 0], width: 0.2 }
    }
}

impl RenderRecord for Edge {
    const KIND: RenderKind = RenderKind::Edge;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self { color: object.rgb("_color")?, width: object.float("_width")? })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(Self::KIND, vec![text::format_rgb(self.color), float(self.width)])
    }
}

/// `_grid`: editor grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    /// `_color`
    pub color: [u8; 3],
    /// `_spacing`
    pub spacing: u32,
    /// `_width`
    pub width: f32,
    /// `_display`: drawn on the ground.
    pub on_ground: bool,
}

impl Default for Grid {
    fn default() -> Self {
        Self { color: [0, 0, 0], spacing: 1, width: 0.05, on_ground: false }
    }
}

impl RenderRecord for Grid {
    const KIND: RenderKind = RenderKind::Grid;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self {
            color: object.rgb("_color")?,
            spacing: object.int("_spacing")?,
            width: object.float("_width")?,
            on_ground: object.flag("_display")?,
        })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(
            Self::KIND,
            vec![
                text::format_rgb(self.color),
                self.spacing.to_string(),
                float(self.width),
                flag(self.on_ground),
            ],
        )
    }
}

/// `_setting`: global display toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalSettings {
    /// `_ground`
    pub ground: bool,
    /// `_sw`: shadows.
    pub shadow: bool,
    /// `_aa`
    pub antialias: bool,
    /// `_grid`
    pub grid: bool,
    /// `_edge`
    pub edge: bool,
    /// `_bg_c`
    pub background: bool,
    /// `_bg_a`: transparent background.
    pub background_transparent: bool,
    /// `_scale`
    pub scale: [u8; 3],
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            ground: true,
            shadow: true,
            antialias: true,
            grid: false,
            edge: false,
            background: false,
            background_transparent: false,
            scale: [1, 1, 1],
        }
    }
}

impl RenderRecord for GlobalSettings {
    const KIND: RenderKind = RenderKind::GlobalSettings;

    fn from_object(object: &RenderObject) -> VoxResult<Self> {
        object.expect_kind(Self::KIND)?;
        Ok(Self {
            ground: object.flag("_ground")?,
            shadow: object.flag("_sw")?,
            antialias: object.flag("_aa")?,
            grid: object.flag("_grid")?,
            edge: object.flag("_edge")?,
            background: object.flag("_bg_c")?,
            background_transparent: object.flag("_bg_a")?,
            scale: object.rgb("_scale")?,
        })
    }

    fn to_object(&self) -> RenderObject {
        RenderObject::from_pairs(
            Self::KIND,
            vec![
                flag(self.ground),
                flag(self.shadow),
                flag(self.antialias),
                flag(self.grid),
                flag(self.edge),
                flag(self.background),
                flag(self.background_transparent),
                text::format_rgb(self.scale),
            ],
        )
    }
}

// ============================================================================
// SETTINGS BUNDLE
// ============================================================================

/// All render objects of a file, in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderSettings {
    objects: Vec<RenderObject>,
}

impl RenderSettings {
    /// Creates an empty bundle.
    #[must_use]
    pub const fn new() -> Self {
        Self { objects: Vec::new() }
    }

    /// The twelve default objects, in write order.
    #[must_use]
    pub fn defaults() -> Self {
        let objects = vec![
            Sun::default().to_object(),
            UniformSky::default().to_object(),
            AtmosphericSky::default().to_object(),
            Fog::default().to_object(),
            Lens::default().to_object(),
            Bloom::default().to_object(),
            Tone::default().to_object(),
            Ground::default().to_object(),
            Background::default().to_object(),
            Edge::default().to_object(),
            Grid::default().to_object(),
            GlobalSettings::default().to_object(),
        ];
        Self { objects }
    }

    /// Appends an object.
    pub fn push(&mut self, object: RenderObject) {
        self.objects.push(object);
    }

    /// Objects in file order.
    #[inline]
    #[must_use]
    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    /// Number of objects.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if there are no objects.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First object of `kind`.
    #[must_use]
    pub fn get(&self, kind: RenderKind) -> Option<&RenderObject> {
        self.objects.iter().find(|object| object.kind == kind)
    }

    /// Decodes the first object of `T`'s type, or `T::default()` if absent.
    pub fn record<T: RenderRecord>(&self) -> VoxResult<T> {
        self.get(T::KIND).map_or_else(|| Ok(T::default()), T::from_object)
    }

    /// Replaces the first object of `T`'s type, appending if absent.
    pub fn set<T: RenderRecord>(&mut self, record: &T) {
        let object = record.to_object();
        match self.objects.iter_mut().find(|o| o.kind == T::KIND) {
            Some(slot) => *slot = object,
            None => self.objects.push(object),
        }
    }

    /// Serializes every object.
    #[must_use]
    pub fn encode(&self) -> Vec<Chunk> {
        self.objects.iter().map(RenderObject::encode).collect()
    }

    /// Sun light.
    pub fn sun(&self) -> VoxResult<Sun> {
        self.record()
    }

    /// Uniform sky.
    pub fn uniform_sky(&self) -> VoxResult<UniformSky> {
        self.record()
    }

    /// Atmospheric sky.
    pub fn atmospheric_sky(&self) -> VoxResult<AtmosphericSky> {
        self.record()
    }

    /// Fog.
    pub fn fog(&self) -> VoxResult<Fog> {
        self.record()
    }

    /// Lens.
    pub fn lens(&self) -> VoxResult<Lens> {
        self.record()
    }

    /// Bloom.
    pub fn bloom(&self) -> VoxResult<Bloom> {
        self.record()
    }

    /// Tone mapping.
    pub fn tone(&self) -> VoxResult<Tone> {
        self.record()
    }

    /// Ground plane.
    pub fn ground(&self) -> VoxResult<Ground> {
        self.record()
    }

    /// Background.
    pub fn background(&self) -> VoxResult<Background> {
        self.record()
    }

    /// Edges.
    pub fn edge(&self) -> VoxResult<Edge> {
        self.record()
    }

    /// Grid.
    pub fn grid(&self) -> VoxResult<Grid> {
        self.record()
    }

    /// Global settings.
    pub fn global_settings(&self) -> VoxResult<GlobalSettings> {
        self.record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_objects_validate_strictly() {
        let settings = RenderSettings::defaults();
        assert_eq!(settings.len(), 12);
        for (object, kind) in settings.objects().iter().zip(RenderKind::ALL) {
            assert_eq!(object.kind(), kind);
            let chunk = object.encode();
            let decoded = RenderObject::decode(&chunk, KeyOrder::Strict).unwrap();
            assert_eq!(&decoded, object);
        }
    }

    #[test]
    fn test_default_sun_text() {
        let sun = Sun::default().to_object();
        let pairs: Vec<_> = sun.attributes().iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("_type", "_inf"),
                ("_i", "0.6"),
                ("_k", "255 255 255"),
                ("_angle", "50 50"),
                ("_area", "0.07"),
                ("_disk", "0"),
            ]
        );
    }

    #[test]
    fn test_text_is_preserved_verbatim() {
        let dict = Dict::new().with("_type", "_tone").with("_aces", "1").with("_gam", "2.20");
        let object = RenderObject::from_dict(dict.clone(), KeyOrder::Strict).unwrap();
        assert_eq!(object.attributes(), &dict);
        assert_eq!(Tone::from_object(&object).unwrap(), Tone { aces: true, gamma: 2.2 });
    }

    #[test]
    fn test_strict_rejects_reordered_keys() {
        let dict = Dict::new().with("_type", "_tone").with("_gam", "2.2").with("_aces", "0");
        assert!(matches!(
            RenderObject::from_dict(dict.clone(), KeyOrder::Strict),
            Err(VoxError::MalformedRenderObject { .. })
        ));
        let object = RenderObject::from_dict(dict, KeyOrder::Relaxed).unwrap();
        assert_eq!(object.kind(), RenderKind::Tone);
    }

    #[test]
    fn test_rejects_wrong_count_and_duplicates() {
        let dict = Dict::new().with("_type", "_bg");
        assert!(matches!(
            RenderObject::from_dict(dict, KeyOrder::Relaxed),
            Err(VoxError::MalformedRenderObject { render_type, .. }) if render_type == "_bg"
        ));

        let dict = Dict::new().with("_type", "_tone").with("_gam", "2.2").with("_gam", "1");
        assert!(RenderObject::from_dict(dict, KeyOrder::Relaxed).is_err());
    }

    #[test]
    fn test_rejects_unknown_type_and_missing_type() {
        let dict = Dict::new().with("_type", "_laser");
        assert!(matches!(
            RenderObject::from_dict(dict, KeyOrder::Strict),
            Err(VoxError::MalformedRenderObject { reason, .. }) if reason.contains("unknown")
        ));
        let dict = Dict::new().with("_i", "1").with("_type", "_uni");
        assert!(RenderObject::from_dict(dict, KeyOrder::Strict).is_err());
        assert!(RenderObject::from_dict(Dict::new(), KeyOrder::Strict).is_err());
    }

    #[test]
    fn test_values_are_type_checked() {
        let dict = Dict::new().with("_type", "_uni").with("_i", "bright").with("_k", "1 1 1");
        assert!(matches!(
            RenderObject::from_dict(dict, KeyOrder::Strict),
            Err(VoxError::InvalidAttributeValue { chunk: ChunkId::RENDER, .. })
        ));
        let dict = Dict::new().with("_type", "_fog_uni").with("_d", "0").with("_k", "1 1");
        assert!(RenderObject::from_dict(dict, KeyOrder::Strict).is_err());
    }

    #[test]
    fn test_typed_views_fall_back_to_defaults() {
        let mut settings = RenderSettings::new();
        assert_eq!(settings.lens().unwrap(), Lens::default());

        let lens = Lens { field_of_view: 60, exposure: 1.5, ..Lens::default() };
        settings.set(&lens);
        settings.set(&lens);
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.lens().unwrap(), lens);
        assert_eq!(settings.get(RenderKind::Lens).unwrap().get("_fov"), Some("60"));
    }
}
