//! High-level image operations.
//!
//! These functions combine calculations with pixel work and backend writes.
//! Rendering works on a borrowed master and returns a fresh image, so the
//! master is never mutated by a size.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{centered_crop_region, centered_offset, fill_without_upscale, fit_within};
use super::params::{SaveParams, ThumbnailParams};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Render one derived size from the trimmed master.
///
/// With `preserve_aspect_ratio` the master is scaled to fit the box; otherwise
/// the centered region matching the box's aspect ratio is cropped and scaled
/// to fill it. Without `upscale` neither path grows past the source pixels.
/// The result is always exactly `width x height`.
pub fn render_thumbnail(master: &DynamicImage, params: &ThumbnailParams) -> DynamicImage {
    let source = Dimensions::of(master);
    let target = Dimensions::new(params.width, params.height);

    let resized = if params.preserve_aspect_ratio {
        let fit = fit_within(source, target, params.upscale);
        scale_to(master, fit)
    } else {
        let region = centered_crop_region(source, target);
        let cropped = master.crop_imm(region.x, region.y, region.width, region.height);
        let size = if params.upscale {
            target
        } else {
            fill_without_upscale(region, target)
        };
        scale_to(&cropped, size)
    };

    normalize_canvas(resized, target, params.background)
}

fn scale_to(image: &DynamicImage, size: Dimensions) -> DynamicImage {
    if Dimensions::of(image) == size {
        return image.clone();
    }
    image.resize_exact(size.width, size.height, FilterType::Lanczos3)
}

/// Center `image` on a canvas of exactly `target`, padding with `background`
/// (transparent when unset). Oversized images are clipped at the edges.
pub fn normalize_canvas(
    image: DynamicImage,
    target: Dimensions,
    background: Option<Rgba<u8>>,
) -> DynamicImage {
    let current = Dimensions::of(&image);
    if current == target {
        return image;
    }
    let fill = background.unwrap_or(Rgba([255, 255, 255, 0]));
    let mut canvas = RgbaImage::from_pixel(target.width, target.height, fill);
    let (x, y) = centered_offset(target, current);
    imageops::overlay(&mut canvas, &image.to_rgba8(), x, y);
    DynamicImage::ImageRgba8(canvas)
}

/// Delete a file if it exists. A missing file is not an error.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Replace whatever is at `params.output` with `image`.
pub fn write_image(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    params: &SaveParams,
) -> Result<()> {
    remove_existing(&params.output)?;
    backend.save(image, params)
}
