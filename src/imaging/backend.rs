//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the pipeline needs
//! from a pixel library: load and save. Everything in between
//! (trim, resize, canvas work) happens on in-memory [`DynamicImage`] values so
//! the master image is decoded once per run.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{Format, SaveParams};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// Width and height of an image or a requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// A decoded original together with the format it was stored in.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: DynamicImage,
    pub format: Format,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Decode an image from disk.
    fn load(&self, path: &Path) -> Result<SourceImage, BackendError>;

    /// Encode and write an image.
    fn save(&self, image: &DynamicImage, params: &SaveParams) -> Result<(), BackendError>;
}
