//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Largest size with the source aspect ratio that fits inside `target`.
///
/// Without `upscale` the result never exceeds the source. Neither side
/// collapses below one pixel.
///
/// # Examples
/// ```
/// # use smart_thumbs::imaging::{Dimensions, calculations::fit_within};
/// // 1000x500 into a 300x300 box → 300x150
/// let fit = fit_within(Dimensions::new(1000, 500), Dimensions::new(300, 300), false);
/// assert_eq!(fit, Dimensions::new(300, 150));
/// ```
pub fn fit_within(source: Dimensions, target: Dimensions, upscale: bool) -> Dimensions {
    let scale_w = target.width as f64 / source.width as f64;
    let scale_h = target.height as f64 / source.height as f64;
    let mut scale = scale_w.min(scale_h);
    if !upscale {
        scale = scale.min(1.0);
    }
    Dimensions {
        width: ((source.width as f64 * scale).round() as u32).max(1),
        height: ((source.height as f64 * scale).round() as u32).max(1),
    }
}

/// A rectangle inside an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centered region of `source` with the aspect ratio of `target`.
///
/// This is the part of the source a center-anchored crop-to-fill keeps.
pub fn centered_crop_region(source: Dimensions, target: Dimensions) -> Region {
    let src_aspect = source.width as f64 / source.height as f64;
    let tgt_aspect = target.width as f64 / target.height as f64;

    let (width, height) = if src_aspect > tgt_aspect {
        let w = ((source.height as f64 * tgt_aspect).round() as u32).clamp(1, source.width);
        (w, source.height)
    } else {
        let h = ((source.width as f64 / tgt_aspect).round() as u32).clamp(1, source.height);
        (source.width, h)
    };

    Region {
        x: (source.width - width) / 2,
        y: (source.height - height) / 2,
        width,
        height,
    }
}

/// Output size of a crop-to-fill that is not allowed to upscale.
///
/// The crop region is scaled down to the target when larger, and kept at its
/// own size when smaller (the canvas step pads the remainder).
pub fn fill_without_upscale(region: Region, target: Dimensions) -> Dimensions {
    let scale = (target.width as f64 / region.width as f64).min(1.0);
    Dimensions {
        width: ((region.width as f64 * scale).round() as u32).clamp(1, target.width),
        height: ((region.height as f64 * scale).round() as u32).clamp(1, target.height),
    }
}

/// Offset that centers `inner` on `outer`. Negative when `inner` is larger.
pub fn centered_offset(outer: Dimensions, inner: Dimensions) -> (i64, i64) {
    (
        (i64::from(outer.width) - i64::from(inner.width)) / 2,
        (i64::from(outer.height) - i64::from(inner.height)) / 2,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height)
    }

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_landscape_into_square() {
        assert_eq!(fit_within(dims(1000, 500), dims(150, 150), false), dims(150, 75));
        assert_eq!(fit_within(dims(1000, 500), dims(300, 300), false), dims(300, 150));
    }

    #[test]
    fn fit_portrait_into_square() {
        assert_eq!(fit_within(dims(600, 1200), dims(300, 300), false), dims(150, 300));
    }

    #[test]
    fn fit_small_source_without_upscale_keeps_size() {
        assert_eq!(fit_within(dims(100, 50), dims(300, 300), false), dims(100, 50));
    }

    #[test]
    fn fit_small_source_with_upscale_grows() {
        assert_eq!(fit_within(dims(100, 50), dims(300, 300), true), dims(300, 150));
    }

    #[test]
    fn fit_extreme_aspect_never_collapses_to_zero() {
        assert_eq!(fit_within(dims(10000, 1), dims(100, 100), false), dims(100, 1));
    }

    // =========================================================================
    // centered_crop_region tests
    // =========================================================================

    #[test]
    fn crop_region_landscape_to_square() {
        let region = centered_crop_region(dims(1000, 500), dims(300, 300));
        assert_eq!(
            region,
            Region {
                x: 250,
                y: 0,
                width: 500,
                height: 500
            }
        );
    }

    #[test]
    fn crop_region_portrait_to_landscape() {
        let region = centered_crop_region(dims(400, 800), dims(200, 100));
        assert_eq!(
            region,
            Region {
                x: 0,
                y: 300,
                width: 400,
                height: 200
            }
        );
    }

    #[test]
    fn crop_region_same_aspect_is_whole_image() {
        let region = centered_crop_region(dims(800, 600), dims(400, 300));
        assert_eq!(region.width, 800);
        assert_eq!(region.height, 600);
        assert_eq!((region.x, region.y), (0, 0));
    }

    // =========================================================================
    // fill_without_upscale tests
    // =========================================================================

    #[test]
    fn fill_without_upscale_scales_down_large_region() {
        let region = centered_crop_region(dims(1000, 500), dims(300, 300));
        assert_eq!(fill_without_upscale(region, dims(300, 300)), dims(300, 300));
    }

    #[test]
    fn fill_without_upscale_keeps_small_region() {
        let region = centered_crop_region(dims(120, 60), dims(300, 300));
        assert_eq!(fill_without_upscale(region, dims(300, 300)), dims(60, 60));
    }

    // =========================================================================
    // centered_offset tests
    // =========================================================================

    #[test]
    fn offset_centers_smaller_inner() {
        assert_eq!(centered_offset(dims(150, 150), dims(150, 75)), (0, 37));
    }

    #[test]
    fn offset_is_negative_for_larger_inner() {
        assert_eq!(centered_offset(dims(100, 100), dims(120, 100)), (-10, 0));
    }
}
