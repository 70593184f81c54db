//! Derived file naming.
//!
//! Every derived size lives next to the original:
//!
//! - `chair.jpg` at 300x300 → `chair-300x300.jpg`
//! - `chair.png` at 300x300 with JPEG conversion → `chair-300x300.png.jpg`
//! - WebP sibling of either → `chair-300x300.webp`
//!
//! Keeping the original extension in converted names stops `chair.png` and
//! `chair.jpg` from producing the same thumbnail file.

use crate::imaging::Dimensions;
use crate::imaging::params::Format;
use std::path::{Path, PathBuf};

/// Whether a source at `source` is re-encoded as JPEG under `jpg_convert`.
///
/// Sources already named `.jpg`/`.jpeg` are never converted.
pub fn converts_to_jpeg(source: &Path, jpg_convert: bool) -> bool {
    jpg_convert && !has_jpeg_extension(source)
}

fn has_jpeg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
}

/// Format the derived files are written in.
pub fn output_format(source: &Path, source_format: Format, jpg_convert: bool) -> Format {
    if converts_to_jpeg(source, jpg_convert) {
        Format::Jpeg
    } else {
        source_format
    }
}

/// Path of the derived file for `size`: `<stem>-<w>x<h>.<ext>[.jpg]`.
pub fn thumbnail_path(source: &Path, size: Dimensions, jpg_convert: bool) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{}-{}x{}", stem, size.width, size.height);
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    if converts_to_jpeg(source, jpg_convert) {
        name.push_str(".jpg");
    }
    source.with_file_name(name)
}

/// Path of the WebP sibling of a derived file.
///
/// Drops the final extension, and a preserved original image extension
/// behind it, then appends `.webp`.
pub fn webp_sibling(path: &Path) -> PathBuf {
    let mut base = path.with_extension("");
    if Format::from_path(&base).is_some() {
        base = base.with_extension("");
    }
    // Append rather than `with_extension`: a dotted stem must survive.
    let mut name = base.into_os_string();
    name.push(".webp");
    PathBuf::from(name)
}
