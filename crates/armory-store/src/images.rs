//! Icons stored as files under one root directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use armory_core::{EquipmentRecord, IdentityKey};
use armory_vision::{ImageResolver, VisionError, decode};
use image::DynamicImage;
use tracing::debug;

/// Characters that cannot appear in file names on common filesystems.
const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace reserved file-name characters with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect()
}

/// Conventional icon file name for a key: `<sanitised name>_<RARITY>.png`.
pub fn icon_file_name(key: &IdentityKey) -> String {
    format!("{}_{}.png", sanitize_name(&key.name), key.rarity)
}

/// Resolves icons from a directory.
///
/// A record's own `image_ref` (relative to the root) is tried first, then the
/// conventional file name.
#[derive(Debug, Clone)]
pub struct ImageDir {
    root: PathBuf,
    refs: HashMap<IdentityKey, String>,
}

impl ImageDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            refs: HashMap::new(),
        }
    }

    /// Remember the `image_ref` of each keyed record. The first reference
    /// seen for a key is kept.
    pub fn with_references<'a>(
        mut self,
        records: impl IntoIterator<Item = &'a EquipmentRecord>,
    ) -> Self {
        for record in records {
            if let (Some(key), Some(r)) = (record.key(), record.image_ref.as_deref()) {
                let r = r.trim();
                if !r.is_empty() {
                    self.refs.entry(key).or_insert_with(|| r.to_string());
                }
            }
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths tried for `key`, in order.
    pub fn candidates(&self, key: &IdentityKey) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let Some(r) = self.refs.get(key) {
            paths.push(self.root.join(r));
        }
        let conventional = self.root.join(icon_file_name(key));
        if !paths.contains(&conventional) {
            paths.push(conventional);
        }
        paths
    }
}

impl ImageResolver for ImageDir {
    fn resolve(&self, key: &IdentityKey) -> Result<Option<DynamicImage>, VisionError> {
        for path in self.candidates(key) {
            if !path.is_file() {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|source| VisionError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(key = %key, path = %path.display(), "resolved icon");
            return decode(&bytes).map(Some);
        }
        Ok(None)
    }
}
