//! # Materials
//!
//! One `MATL` chunk per palette slot.
//!
//! ```text
//! MATL:
//! ├── id (4 bytes, 0..=255)
//! └── DICT { _type, _weight, _plastic, _rough, _spec, _ior, _att, _flux, _ldr }
//! ```
//!
//! Keys are optional on read; absent keys keep the [`Material::DEFAULT`]
//! value. All nine keys are always written, in the order above.

use crate::chunk::{Chunk, ChunkId, CHUNK_HEADER_LEN};
use crate::cursor::{ByteCursor, ByteWriter};
use crate::dict::Dict;
use crate::error::{VoxError, VoxResult};
use crate::text;

/// Number of material slots, one per palette entry.
pub const MATERIAL_SLOTS: usize = 256;

/// Surface kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// `_diffuse`
    #[default]
    Diffuse,
    /// `_metal`
    Metal,
    /// `_glass`
    Glass,
    /// `_emit`
    Emit,
}

impl MaterialKind {
    /// Attribute text for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diffuse => "_diffuse",
            Self::Metal => "_metal",
            Self::Glass => "_glass",
            Self::Emit => "_emit",
        }
    }

    /// Parses attribute text.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "_diffuse" => Some(Self::Diffuse),
            "_metal" => Some(Self::Metal),
            "_glass" => Some(Self::Glass),
            "_emit" => Some(Self::Emit),
            _ => None,
        }
    }
}

/// Surface properties of one palette slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Palette slot.
    pub id: u8,
    /// Surface kind.
    pub kind: MaterialKind,
    /// Blend weight of the kind.
    pub weight: f32,
    /// Roughness.
    pub roughness: f32,
    /// Specularity.
    pub specularity: f32,
    /// Index of refraction.
    pub index_of_refraction: f32,
    /// Attenuation.
    pub attenuation: f32,
    /// Emission power.
    pub flux: f32,
    /// Plastic flag.
    pub is_plastic: bool,
    /// Low dynamic range flag.
    pub is_low_dynamic_range: bool,
}

impl Material {
    /// Record used for slots a file does not describe.
    pub const DEFAULT: Self = Self {
        id: 0,
        kind: MaterialKind::Diffuse,
        weight: 1.0,
        roughness: 0.1,
        specularity: 0.5,
        index_of_refraction: 0.3,
        attenuation: 0.0,
        flux: 0.0,
        is_plastic: false,
        is_low_dynamic_range: false,
    };

    /// Default material for `id`.
    #[must_use]
    pub const fn default_for(id: u8) -> Self {
        let mut material = Self::DEFAULT;
        material.id = id;
        material
    }

    /// Parses a `MATL` chunk.
    pub fn decode(chunk: &Chunk) -> VoxResult<Self> {
        let mut cursor = ByteCursor::new(&chunk.body, chunk.offset + CHUNK_HEADER_LEN);
        let raw_id = cursor.read_i32("material id")?;
        let id = u8::try_from(raw_id).map_err(|_| VoxError::InvalidAttributeValue {
            chunk: ChunkId::MATERIAL,
            key: "id".to_owned(),
            value: raw_id.to_string(),
            reason: "material id outside 0..=255",
        })?;
        let properties = Dict::decode(&mut cursor)?;
        cursor.expect_end(chunk.id, chunk.offset)?;

        let mut material = Self::default_for(id);
        let c = ChunkId::MATERIAL;
        for (key, value) in properties.iter() {
            match key {
                "_type" => {
                    material.kind = MaterialKind::parse(value).ok_or_else(|| {
                        VoxError::InvalidAttributeValue {
                            chunk: c,
                            key: key.to_owned(),
                            value: value.to_owned(),
                            reason: "unknown material type",
                        }
                    })?;
                }
                "_weight" => material.weight = text::parse_float(c, key, value)?,
                "_rough" => material.roughness = text::parse_float(c, key, value)?,
                "_spec" => material.specularity = text::parse_float(c, key, value)?,
                "_ior" => material.index_of_refraction = text::parse_float(c, key, value)?,
                "_att" => material.attenuation = text::parse_float(c, key, value)?,
                "_flux" => material.flux = text::parse_float(c, key, value)?,
                "_plastic" => material.is_plastic = text::parse_bool(c, key, value)?,
                "_ldr" => material.is_low_dynamic_range = text::parse_bool(c, key, value)?,
                _ => {
                    return Err(VoxError::UnknownAttributeKey {
                        chunk: c,
                        key: key.to_owned(),
                        value: value.to_owned(),
                    })
                }
            }
        }
        Ok(material)
    }

    /// Property dictionary in write order.
    #[must_use]
    pub fn to_dict(&self) -> Dict {
        Dict::new()
            .with("_type", self.kind.as_str())
            .with("_weight", text::format_float(self.weight))
            .with("_plastic", text::format_bool(self.is_plastic))
            .with("_rough", text::format_float(self.roughness))
            .with("_spec", text::format_float(self.specularity))
            .with("_ior", text::format_float(self.index_of_refraction))
            .with("_att", text::format_float(self.attenuation))
            .with("_flux", text::format_float(self.flux))
            .with("_ldr", text::format_bool(self.is_low_dynamic_range))
    }

    /// Serializes a `MATL` chunk.
    #[must_use]
    pub fn encode(&self) -> Chunk {
        let dict = self.to_dict();
        let mut out = ByteWriter::with_capacity(4 + dict.encoded_len());
        out.write_i32(i32::from(self.id));
        dict.encode(&mut out);
        Chunk::new(ChunkId::MATERIAL, out.into_inner())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pads `materials` to all 256 slots with defaults, ordered by id.
///
/// Slots already present keep their record; the first record wins when a
/// slot appears twice.
#[must_use]
pub fn fill_slots(materials: &[Material]) -> Vec<Material> {
    let mut slots: Vec<Option<Material>> = vec![None; MATERIAL_SLOTS];
    for material in materials {
        let slot = &mut slots[usize::from(material.id)];
        if slot.is_none() {
            *slot = Some(*material);
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| slot.unwrap_or_else(|| Material::default_for(id as u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(id: i32, dict: &Dict) -> Chunk {
        let mut out = ByteWriter::new();
        out.write_i32(id);
        dict.encode(&mut out);
        Chunk::new(ChunkId::MATERIAL, out.into_inner())
    }

    #[test]
    fn test_default_record_text() {
        let dict = Material::default_for(7).to_dict();
        let pairs: Vec<_> = dict.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("_type", "_diffuse"),
                ("_weight", "1"),
                ("_plastic", "0"),
                ("_rough", "0.1"),
                ("_spec", "0.5"),
                ("_ior", "0.3"),
                ("_att", "0"),
                ("_flux", "0"),
                ("_ldr", "0"),
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        let material = Material {
            id: 200,
            kind: MaterialKind::Glass,
            weight: 0.25,
            roughness: 0.07,
            is_plastic: true,
            ..Material::DEFAULT
        };
        assert_eq!(Material::decode(&material.encode()).unwrap(), material);
    }

    #[test]
    fn test_partial_dictionary_keeps_defaults() {
        let chunk = chunk_with(3, &Dict::new().with("_type", "_emit").with("_flux", "2"));
        let material = Material::decode(&chunk).unwrap();
        assert_eq!(material.kind, MaterialKind::Emit);
        assert_eq!(material.flux, 2.0);
        assert_eq!(material.roughness, 0.1);
        assert_eq!(material.id, 3);
    }

    #[test]
    fn test_rejects_unknown_key_type_and_id() {
        let chunk = chunk_with(1, &Dict::new().with("_alpha", "0.5"));
        assert!(matches!(
            Material::decode(&chunk),
            Err(VoxError::UnknownAttributeKey { chunk: ChunkId::MATERIAL, .. })
        ));

        let chunk = chunk_with(1, &Dict::new().with("_type", "_cloud"));
        assert!(matches!(
            Material::decode(&chunk),
            Err(VoxError::InvalidAttributeValue { reason: "unknown material type", .. })
        ));

        let chunk = chunk_with(256, &Dict::new());
        assert!(matches!(
            Material::decode(&chunk),
            Err(VoxError::InvalidAttributeValue { .. })
        ));
    }

    #[test]
    fn test_fill_slots() {
        let custom = Material { id: 5, kind: MaterialKind::Metal, ..Material::DEFAULT };
        let slots = fill_slots(&[custom]);
        assert_eq!(slots.len(), MATERIAL_SLOTS);
        assert_eq!(slots[5], custom);
        assert_eq!(slots[6], Material::default_for(6));
        assert!(slots.iter().enumerate().all(|(i, m)| usize::from(m.id) == i));
    }
}
