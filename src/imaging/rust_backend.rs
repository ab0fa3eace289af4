//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate, format from extension, then sniffed |
//! | Cover crop | `image::DynamicImage::resize_to_fill` with `Lanczos3` |
//! | Circular mask | [`apply_circle_mask`] |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (adaptive filter) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{DeriveParams, Encoding};
use crate::config::PngCompression;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbaImage};
use std::fs::File;
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

/// Load and decode an image from disk.
///
/// The format is taken from the file extension first. If that decode fails
/// (a PNG saved as `.jpg`, say), the real format is sniffed from the magic
/// bytes and decoding is attempted exactly once more.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let first = match ImageReader::open(path)?.decode() {
        Ok(img) => return Ok(img),
        Err(e) => e,
    };
    log::debug!(
        "Decoding {} by extension failed ({first}), sniffing format",
        path.display()
    );

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let sniffed = reader.format();
    reader.decode().map_err(|second| {
        let sniffed = sniffed
            .map(|f| format!("{f:?}"))
            .unwrap_or_else(|| "unrecognised".to_string());
        BackendError::Decode(format!(
            "{}: {first}; sniffed format {sniffed} also failed: {second}",
            path.display()
        ))
    })
}

/// Clear the alpha of every pixel outside the inscribed circle.
pub fn apply_circle_mask(img: &mut RgbaImage) {
    let (w, h) = img.dimensions();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;
    let r = w.min(h) as f32 / 2.0;
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        if (dx * dx + dy * dy).sqrt() > r {
            pixel.0[3] = 0;
        }
    }
}

fn save_png(
    img: &DynamicImage,
    path: &Path,
    compression: PngCompression,
) -> Result<(), BackendError> {
    let writer = BufWriter::new(File::create(path)?);
    let compression = match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    };
    let encoder = PngEncoder::new_with_quality(writer, compression, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {}", e)))
}

/// Encode and save as AVIF using rav1e (speed=6 for reasonable throughput).
fn save_avif(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let writer = BufWriter::new(File::create(path)?);
    let encoder =
        image::codecs::avif::AvifEncoder::new_with_speed_quality(writer, 6, quality as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let img = load_image(path)?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }

    fn derive(&self, params: &DeriveParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;

        // Fill-resize then center-crop to a square
        let mut filled = img
            .resize_to_fill(params.edge, params.edge, FilterType::Lanczos3)
            .to_rgba8();
        if params.circular {
            apply_circle_mask(&mut filled);
        }
        let out = DynamicImage::ImageRgba8(filled);

        match params.encoding {
            Encoding::Png(compression) => save_png(&out, &params.output, compression),
            Encoding::Avif(quality) => save_avif(&out, &params.output, quality.value()),
        }
    }
}
