//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline (which decides which files to produce) and
//! the [`backend`](super::backend) (which decodes and encodes pixels). This
//! separation allows swapping backends (e.g. for testing with a mock) without
//! changing the generation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100). Built from the host's
//!   `jpg_quality` setting, which is a *compression* amount.
//! - [`Format`]: The raster formats the pipeline reads and writes.
//! - [`SaveParams`]: Output path, format, quality and alpha fill for one write.
//! - [`ThumbnailParams`]: Target box and fit policy for one derived size.

use image::{ImageFormat, Rgba};
use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    /// Encoder quality from a compression amount: `100 - compression`.
    pub fn from_compression(compression: u8) -> Self {
        Self::new(100 - u32::from(compression.min(100)))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Raster formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl Format {
    /// Format implied by a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::WebP => ImageFormat::WebP,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

/// Parameters for writing one image to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveParams {
    pub output: PathBuf,
    pub format: Format,
    pub quality: Quality,
    /// Color that transparent pixels are flattened onto when the format has no
    /// alpha channel. White when unset.
    pub background: Option<Rgba<u8>>,
}

/// Parameters for producing one derived size from the trimmed master.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailParams {
    /// Requested box; the rendered image always has exactly these dimensions.
    pub width: u32,
    pub height: u32,
    /// Fit inside the box (`true`) or crop to fill it (`false`).
    pub preserve_aspect_ratio: bool,
    pub upscale: bool,
    /// Fill for canvas area the resize does not cover. Transparent when unset.
    pub background: Option<Rgba<u8>>,
}
