//! # Model Cache
//!
//! Read-through cache of parsed files keyed by path. The cache is owned by
//! whoever creates it; the codec itself keeps no state between calls.
//!
//! Entries never expire on their own. Call [`ModelCache::invalidate`] after
//! a file changes on disk, or [`ModelCache::reload`] to replace it eagerly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::VoxCodec;
use crate::error::VoxResult;
use crate::model::ParsedModel;

/// Parsed models by path.
///
/// Safe to share between threads; readers of cached entries never block
/// each other.
pub struct ModelCache {
    codec: VoxCodec,
    entries: RwLock<HashMap<PathBuf, Arc<ParsedModel>>>,
}

impl ModelCache {
    /// Creates an empty cache that loads through `codec`.
    #[must_use]
    pub fn new(codec: VoxCodec) -> Self {
        Self { codec, entries: RwLock::new(HashMap::new()) }
    }

    /// Codec used for loads.
    #[inline]
    #[must_use]
    pub const fn codec(&self) -> &VoxCodec {
        &self.codec
    }

    /// Cached entry for `path`, without loading.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Arc<ParsedModel>> {
        self.entries.read().get(path.as_ref()).cloned()
    }

    /// Cached entry for `path`, loading it on first use.
    ///
    /// Failed loads are not cached.
    ///
    /// # Errors
    ///
    /// Whatever [`VoxCodec::read_path`] returns.
    pub fn get_or_load(&self, path: impl AsRef<Path>) -> VoxResult<Arc<ParsedModel>> {
        let path = path.as_ref();
        if let Some(hit) = self.get(path) {
            return Ok(hit);
        }

        // Parse without holding the lock; if another thread won the race,
        // its entry is kept.
        let loaded = Arc::new(self.codec.read_path(path)?);
        let mut entries = self.entries.write();
        let entry = Arc::clone(entries.entry(path.to_path_buf()).or_insert(loaded));
        tracing::debug!(path = %path.display(), cached = entries.len(), "cached model");
        Ok(entry)
    }

    /// Loads `path` again and replaces any cached entry.
    ///
    /// On error the old entry stays in place.
    ///
    /// # Errors
    ///
    /// Whatever [`VoxCodec::read_path`] returns.
    pub fn reload(&self, path: impl AsRef<Path>) -> VoxResult<Arc<ParsedModel>> {
        let path = path.as_ref();
        let loaded = Arc::new(self.codec.read_path(path)?);
        if self.entries.write().insert(path.to_path_buf(), Arc::clone(&loaded)).is_some() {
            tracing::warn!(path = %path.display(), "replaced stale cached model");
        }
        Ok(loaded)
    }

    /// Drops the entry for `path`. Returns true if there was one.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        self.entries.write().remove(path.as_ref()).is_some()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(VoxCodec::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxError;

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = ModelCache::default();
        let path = std::env::temp_dir().join("voxform_cache_missing_file.vox");
        assert!(matches!(cache.get_or_load(&path), Err(VoxError::Io { .. })));
        assert!(cache.is_empty());
        assert!(cache.get(&path).is_none());
        assert!(!cache.invalidate(&path));
    }
}
