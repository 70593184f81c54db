//! Border trimming.
//!
//! Removes a uniform-color frame around the subject, then optionally adds a
//! fixed "feather" border back so the subject does not touch the edges of
//! every thumbnail.
//!
//! The primary trim compares each pixel to the top-left pixel. A pixel is
//! background when its RGBA distance to that color, scaled to 0–100, is at
//! most the tolerance. An image that is all background collapses to a single
//! pixel, which is treated as a failed (degenerate) trim: the extended driver
//! retries on the untouched original with its exact-color primitive, the basic
//! driver keeps the degenerate result.
//!
//! Trimming is best-effort. Errors are logged and the image is kept in the
//! state it had reached.

use super::calculations::{Region, centered_offset};
use super::driver::Driver;
use super::Dimensions;
use image::{DynamicImage, Rgba, RgbaImage, imageops};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Largest possible RGBA Euclidean distance: `sqrt(4 * 255²)`.
const MAX_DISTANCE: f64 = 510.0;

#[derive(Error, Debug)]
pub enum TrimError {
    #[error("image has no pixels")]
    EmptyImage,
    #[error("feather of {feather}px overflows a {width}x{height} canvas")]
    CanvasOverflow { width: u32, height: u32, feather: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimOptions {
    pub enabled: bool,
    /// 0–100 color distance still treated as border.
    pub tolerance: u8,
    /// Total pixels added to each dimension after a successful trim.
    pub feather: u32,
    pub background: Option<Rgba<u8>>,
}

/// Which path the trim took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimPath {
    Disabled,
    Trimmed,
    /// Primary trim was degenerate; the exact-color retry was used.
    Fallback,
    /// Primary trim was degenerate and no retry was available.
    Degenerate,
    /// An error stopped the trim; the image is as it was when it happened.
    Failed,
}

/// Final dimensions of the master image, recorded whatever path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimResult {
    pub dimensions: Dimensions,
    pub path: TrimPath,
}

/// Trim `image` according to `opts`.
pub fn trim(image: DynamicImage, opts: &TrimOptions, driver: Driver) -> (DynamicImage, TrimResult) {
    if !opts.enabled {
        let dimensions = Dimensions::of(&image);
        return (
            image,
            TrimResult {
                dimensions,
                path: TrimPath::Disabled,
            },
        );
    }

    let (mut current, mut path) = match trim_to_content(&image, opts.tolerance) {
        Ok(trimmed) => (trimmed, TrimPath::Trimmed),
        Err(e) => {
            debug!(error = %e, "trim failed, keeping image");
            let dimensions = Dimensions::of(&image);
            return (
                image,
                TrimResult {
                    dimensions,
                    path: TrimPath::Failed,
                },
            );
        }
    };

    if is_degenerate(Dimensions::of(&current)) {
        if driver.has_alternate_trim() {
            debug!(tolerance = opts.tolerance, "trim collapsed the image, retrying with exact color");
            current = trim_exact(&image);
            path = TrimPath::Fallback;
        } else {
            debug!(driver = %driver, "trim collapsed the image, no retry available");
            path = TrimPath::Degenerate;
        }
    }
    drop(image);

    if opts.feather > 0 && !is_degenerate(Dimensions::of(&current)) {
        match add_feather(&current, opts.feather, opts.background) {
            Ok(feathered) => current = feathered,
            // Feather is optional; keep the trimmed image.
            Err(e) => debug!(error = %e, "feather skipped"),
        }
    }

    let dimensions = Dimensions::of(&current);
    (current, TrimResult { dimensions, path })
}

/// A trim is degenerate when either side is a single pixel (or less).
pub fn is_degenerate(dims: Dimensions) -> bool {
    dims.width.max(1) == 1 || dims.height.max(1) == 1
}

/// Distance between two colors on a 0–100 scale.
pub fn color_distance(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    let sum: f64 = a
        .0
        .iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    sum.sqrt() / MAX_DISTANCE * 100.0
}

/// Bounding box of the pixels farther than `tolerance` from `reference`.
///
/// `None` when every pixel is background.
pub fn content_bounds(pixels: &RgbaImage, reference: Rgba<u8>, tolerance: u8) -> Option<Region> {
    let tolerance = f64::from(tolerance);
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in pixels.enumerate_pixels() {
        if color_distance(*pixel, reference) <= tolerance {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    bounds.map(|(x0, y0, x1, y1)| Region {
        x: x0,
        y: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
    })
}

/// Primary trim: border color is the top-left pixel.
fn trim_to_content(image: &DynamicImage, tolerance: u8) -> Result<DynamicImage, TrimError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(TrimError::EmptyImage);
    }
    let pixels = image.to_rgba8();
    let reference = *pixels.get_pixel(0, 0);
    let region = content_bounds(&pixels, reference, tolerance).unwrap_or(Region {
        x: 0,
        y: 0,
        width: 1,
        height: 1,
    });
    Ok(image.crop_imm(region.x, region.y, region.width, region.height))
}

/// Exact-color trim against the most common corner color.
///
/// A fully uniform image is returned unchanged.
pub fn trim_exact(image: &DynamicImage) -> DynamicImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let pixels = image.to_rgba8();
    let reference = dominant_corner(&pixels);
    match content_bounds(&pixels, reference, 0) {
        Some(region) => image.crop_imm(region.x, region.y, region.width, region.height),
        None => image.clone(),
    }
}

/// Most frequent corner color. Ties go to the earliest corner, starting
/// top-left and going clockwise.
fn dominant_corner(pixels: &RgbaImage) -> Rgba<u8> {
    let (w, h) = (pixels.width() - 1, pixels.height() - 1);
    let corners = [
        *pixels.get_pixel(0, 0),
        *pixels.get_pixel(w, 0),
        *pixels.get_pixel(w, h),
        *pixels.get_pixel(0, h),
    ];
    let mut counts: HashMap<[u8; 4], usize> = HashMap::new();
    for c in &corners {
        *counts.entry(c.0).or_default() += 1;
    }
    let best = corners.iter().map(|c| counts[&c.0]).max().unwrap_or(1);
    corners
        .into_iter()
        .find(|c| counts[&c.0] == best)
        .unwrap_or(corners[0])
}

/// Grow the canvas by `feather` in each dimension, centering the image.
pub fn add_feather(
    image: &DynamicImage,
    feather: u32,
    background: Option<Rgba<u8>>,
) -> Result<DynamicImage, TrimError> {
    let inner = Dimensions::of(image);
    let overflow = || TrimError::CanvasOverflow {
        width: inner.width,
        height: inner.height,
        feather,
    };
    let outer = Dimensions::new(
        inner.width.checked_add(feather).ok_or_else(overflow)?,
        inner.height.checked_add(feather).ok_or_else(overflow)?,
    );

    let fill = background.unwrap_or(Rgba([255, 255, 255, 0]));
    let mut canvas = RgbaImage::from_pixel(outer.width, outer.height, fill);
    let (x, y) = centered_offset(outer, inner);
    imageops::overlay(&mut canvas, &image.to_rgba8(), x, y);
    Ok(DynamicImage::ImageRgba8(canvas))
}
