//! # Attribute Text Forms
//!
//! Dictionary values are text. These helpers convert between that text and
//! typed values, and fail with [`VoxError::InvalidAttributeValue`] naming
//! the chunk and key.
//!
//! ```text
//! float   "0.25"       shortest round-trip text, no trailing zeros
//! int     "-12"
//! bool    "0" | "1"
//! rgb     "255 128 0"
//! ints    "1 2 3"      space-separated, fixed count
//! ```

use std::str::FromStr;

use crate::chunk::ChunkId;
use crate::error::{VoxError, VoxResult};

fn invalid(chunk: ChunkId, key: &str, value: &str, reason: &'static str) -> VoxError {
    VoxError::InvalidAttributeValue {
        chunk,
        key: key.to_owned(),
        value: value.to_owned(),
        reason,
    }
}

/// Formats a float in its shortest round-trippable decimal form.
///
/// `1.0` becomes `"1"`, `0.25` stays `"0.25"`, negative zero becomes `"0"`.
#[must_use]
pub fn format_float(value: f32) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    value.to_string()
}

/// Formats a boolean as `"0"` or `"1"`.
#[inline]
#[must_use]
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Formats a color triple as `"r g b"`.
#[must_use]
pub fn format_rgb(rgb: [u8; 3]) -> String {
    format!("{} {} {}", rgb[0], rgb[1], rgb[2])
}

/// Formats integers separated by single spaces.
#[must_use]
pub fn format_ints(values: &[i32]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&value.to_string());
    }
    out
}

/// Parses a finite float.
pub fn parse_float(chunk: ChunkId, key: &str, value: &str) -> VoxResult<f32> {
    let parsed = value
        .parse::<f32>()
        .map_err(|_| invalid(chunk, key, value, "expected a number"))?;
    if !parsed.is_finite() {
        return Err(invalid(chunk, key, value, "number must be finite"));
    }
    Ok(parsed)
}

/// Parses an integer of any width.
pub fn parse_int<T: FromStr>(chunk: ChunkId, key: &str, value: &str) -> VoxResult<T> {
    value
        .parse::<T>()
        .map_err(|_| invalid(chunk, key, value, "expected an integer in range"))
}

/// Parses `"0"` or `"1"`.
pub fn parse_bool(chunk: ChunkId, key: &str, value: &str) -> VoxResult<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(invalid(chunk, key, value, "expected 0 or 1")),
    }
}

/// Parses exactly `N` space-separated integers.
pub fn parse_ints<const N: usize>(chunk: ChunkId, key: &str, value: &str) -> VoxResult<[i32; N]> {
    let mut out = [0i32; N];
    let mut parts = value.split(' ');
    for slot in &mut out {
        let part = parts
            .next()
            .ok_or_else(|| invalid(chunk, key, value, "too few components"))?;
        *slot = part
            .parse::<i32>()
            .map_err(|_| invalid(chunk, key, value, "expected integer components"))?;
    }
    if parts.next().is_some() {
        return Err(invalid(chunk, key, value, "too many components"));
    }
    Ok(out)
}

/// Parses an `"r g b"` triple of bytes.
pub fn parse_rgb(chunk: ChunkId, key: &str, value: &str) -> VoxResult<[u8; 3]> {
    let ints = parse_ints::<3>(chunk, key, value)?;
    let mut rgb = [0u8; 3];
    for (out, component) in rgb.iter_mut().zip(ints) {
        *out = u8::try_from(component)
            .map_err(|_| invalid(chunk, key, value, "color channel outside 0..=255"))?;
    }
    Ok(rgb)
}
