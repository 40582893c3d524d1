use std::path::PathBuf;

use armory_core::Rarity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("fingerprint has {actual} words, bank expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("reference bank for {0} is empty")]
    EmptyBank(Rarity),
}
