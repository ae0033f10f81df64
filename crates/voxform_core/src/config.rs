//! # Codec Configuration
//!
//! Loaded once, usually from a TOML file:
//!
//! ```text
//! render_key_order = "strict"   # or "relaxed"
//! single_model = true
//! write_strategy = "buffered"   # or "patch"
//! max_file_size = 67108864
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VoxError, VoxResult};

/// Default upper bound on accepted input (64 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// How render object key sequences are checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrder {
    /// Exact key order and count per `_type`.
    #[default]
    Strict,
    /// Same key set and count, any order.
    Relaxed,
}

/// How the `MAIN` children length is produced on write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Build the whole file in memory, then write it.
    #[default]
    Buffered,
    /// Stream chunks after a placeholder header and patch the length.
    Patch,
}

/// Codec settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Render object key checking.
    pub render_key_order: KeyOrder,
    /// Reject files with more than one shape node when flattening.
    pub single_model: bool,
    /// Output strategy for file writes.
    pub write_strategy: WriteStrategy,
    /// Largest accepted input in bytes.
    pub max_file_size: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            render_key_order: KeyOrder::Strict,
            single_model: true,
            write_strategy: WriteStrategy::Buffered,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl CodecConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> VoxResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| VoxError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> VoxResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            VoxError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded codec config");
        Ok(config)
    }

    /// Renders the settings as TOML.
    pub fn to_toml_string(&self) -> VoxResult<String> {
        toml::to_string(self).map_err(|e| VoxError::InvalidConfig(e.to_string()))
    }

    /// Rejects settings no file could satisfy.
    pub fn validate(&self) -> VoxResult<()> {
        if self.max_file_size < 8 {
            return Err(VoxError::InvalidConfig(format!(
                "max_file_size {} is smaller than a file header",
                self.max_file_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(CodecConfig::from_toml_str("").unwrap(), CodecConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = CodecConfig::from_toml_str(
            "render_key_order = \"relaxed\"\nwrite_strategy = \"patch\"\n",
        )
        .unwrap();
        assert_eq!(config.render_key_order, KeyOrder::Relaxed);
        assert_eq!(config.write_strategy, WriteStrategy::Patch);
        assert!(config.single_model);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_rejects_unknown_fields_and_values() {
        assert!(matches!(
            CodecConfig::from_toml_str("verbose = true"),
            Err(VoxError::InvalidConfig(_))
        ));
        assert!(CodecConfig::from_toml_str("render_key_order = \"loose\"").is_err());
        assert!(CodecConfig::from_toml_str("max_file_size = 4").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CodecConfig {
            render_key_order: KeyOrder::Relaxed,
            single_model: false,
            write_strategy: WriteStrategy::Patch,
            max_file_size: 1024,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(CodecConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("voxform_config_does_not_exist.toml");
        assert!(matches!(CodecConfig::load(&path), Err(VoxError::InvalidConfig(_))));
    }
}
