//! Lookup of icon pixels by identity key.

use std::collections::HashMap;
use std::io::Cursor;

use armory_core::IdentityKey;
use image::{DynamicImage, ImageReader};

use crate::error::VisionError;

/// Resolves `(name, rarity)` to a decoded icon.
///
/// `Ok(None)` means no image exists for the key. `Err` means one exists but
/// could not be read or decoded.
pub trait ImageResolver {
    fn resolve(&self, key: &IdentityKey) -> Result<Option<DynamicImage>, VisionError>;
}

/// Pre-decoded icons held in memory.
impl ImageResolver for HashMap<IdentityKey, DynamicImage> {
    fn resolve(&self, key: &IdentityKey) -> Result<Option<DynamicImage>, VisionError> {
        Ok(self.get(key).cloned())
    }
}

/// Decode an encoded icon, guessing the format from its magic bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, VisionError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    Ok(reader.decode()?)
}
