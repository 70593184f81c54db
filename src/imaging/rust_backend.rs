//! Pure Rust image processing backend on top of the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `ImageReader` with content sniffing |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` (alpha flattened first) |
//! | Encode → PNG | `PngEncoder` |
//! | Encode → GIF | `GifEncoder` (single frame) |
//! | Encode → WebP | `WebPEncoder::new_lossless` |

use super::backend::{BackendError, ImageBackend, SourceImage};
use super::params::{Format, SaveParams};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, Frame, ImageReader, RgbImage, Rgba};
use std::io::BufWriter;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the real format from content.
fn load_image(path: &Path) -> Result<SourceImage, BackendError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader
        .format()
        .and_then(Format::from_image_format)
        .ok_or_else(|| BackendError::UnsupportedFormat(path.display().to_string()))?;
    let pixels = reader.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })?;
    Ok(SourceImage { pixels, format })
}

/// Composite transparent pixels onto `background` (white when unset).
pub(crate) fn flatten_alpha(img: &DynamicImage, background: Option<Rgba<u8>>) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }
    let bg = background.unwrap_or(Rgba([255, 255, 255, 255]));
    let rgba = img.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let alpha = u32::from(p[3]);
        let blend = |c: u8, b: u8| {
            ((u32::from(c) * alpha + u32::from(b) * (255 - alpha) + 127) / 255) as u8
        };
        image::Rgb([blend(p[0], bg[0]), blend(p[1], bg[1]), blend(p[2], bg[2])])
    });
    DynamicImage::ImageRgb8(flat)
}

/// Encode `img` in the requested format and write it to `params.output`.
fn save_image(img: &DynamicImage, params: &SaveParams) -> Result<(), BackendError> {
    let file = std::fs::File::create(&params.output)?;
    let writer = BufWriter::new(file);

    let result = match params.format {
        Format::Jpeg => {
            // The JPEG encoder divides by quality; zero is not a valid setting.
            let quality = params.quality.value().max(1);
            flatten_alpha(img, params.background)
                .write_with_encoder(JpegEncoder::new_with_quality(writer, quality))
        }
        Format::Png => img.write_with_encoder(PngEncoder::new(writer)),
        Format::Gif => GifEncoder::new(writer).encode_frame(Frame::new(img.to_rgba8())),
        Format::WebP => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(writer)),
    };

    result.map_err(|e| {
        BackendError::ProcessingFailed(format!(
            "{:?} encode of {} failed: {}",
            params.format,
            params.output.display(),
            e
        ))
    })
}

impl ImageBackend for RustBackend {
    fn load(&self, path: &Path) -> Result<SourceImage, BackendError> {
        load_image(path)
    }

    fn save(&self, image: &DynamicImage, params: &SaveParams) -> Result<(), BackendError> {
        save_image(image, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::create_test_png;
    use image::{GenericImageView, RgbaImage};

    fn params(output: &Path, format: Format) -> SaveParams {
        SaveParams {
            output: output.to_path_buf(),
            format,
            quality: Quality::new(85),
            background: None,
        }
    }

    #[test]
    fn load_reports_sniffed_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        // PNG bytes behind a .jpg name: content wins.
        let path = tmp.path().join("mislabeled.jpg");
        create_test_png(&path, 64, 32);

        let loaded = RustBackend::new().load(&path).unwrap();
        assert_eq!(loaded.format, Format::Png);
        assert_eq!(loaded.pixels.dimensions(), (64, 32));
    }

    #[test]
    fn load_nonexistent_file_is_io_error() {
        let result = RustBackend::new().load(Path::new("/nonexistent/image.png"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn save_each_format_roundtrips_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            40,
            30,
            Rgba([10, 200, 30, 128]),
        ));
        let backend = RustBackend::new();

        for format in [Format::Jpeg, Format::Png, Format::Gif, Format::WebP] {
            let output = tmp.path().join(format!("out.{}", format.extension()));
            backend.save(&img, &params(&output, format)).unwrap();
            assert_eq!(image::image_dimensions(&output).unwrap(), (40, 30));
        }
    }

    #[test]
    fn save_jpeg_with_zero_quality_still_encodes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("q0.jpg");
        let mut p = params(&output, Format::Jpeg);
        p.quality = Quality::new(0);

        RustBackend::new()
            .save(&DynamicImage::new_rgb8(16, 16), &p)
            .unwrap();
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn save_into_missing_directory_errors() {
        let result = RustBackend::new().save(
            &DynamicImage::new_rgb8(8, 8),
            &params(Path::new("/nonexistent/dir/out.png"), Format::Png),
        );
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn flatten_alpha_uses_background() {
        let transparent =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));

        let white = flatten_alpha(&transparent, None).to_rgb8();
        assert_eq!(white.get_pixel(0, 0).0, [255, 255, 255]);

        let red = flatten_alpha(&transparent, Some(Rgba([255, 0, 0, 255]))).to_rgb8();
        assert_eq!(red.get_pixel(1, 1).0, [255, 0, 0]);
    }

    #[test]
    fn flatten_alpha_keeps_opaque_pixels() {
        let opaque =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([12, 34, 56, 255])));
        let flat = flatten_alpha(&opaque, Some(Rgba([255, 0, 0, 255]))).to_rgb8();
        assert_eq!(flat.get_pixel(0, 0).0, [12, 34, 56]);
    }
}
