//! QR code images for the résumé URL.
//!
//! Two PNGs encode the same URL: `qr-modal.png` for the on-screen dialog and
//! `qr-print.png` for the printed page. Both are written as **1-bit palette
//! PNGs**: two colours, flat module blocks, no anti-aliasing. Modules are
//! scaled by the largest integer factor that fits the target size
//! (nearest-neighbour) and the result is centred on the background colour,
//! so the quiet zone is at least [`QUIET_ZONE`] modules wide.
//!
//! QR generation never fails a build. [`generate_qr_images`] logs a warning
//! and returns `None`; the document then simply has no QR section.

use crate::config::{QrConfig, parse_hex_color};
use crate::types::{Asset, IMAGES_DIR, image_asset_path};
use qrcode::{Color, QrCode};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

/// Quiet zone width in modules.
pub const QUIET_ZONE: usize = 2;

pub const MODAL_FILENAME: &str = "qr-modal.png";
pub const PRINT_FILENAME: &str = "qr-print.png";

#[derive(Error, Debug)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("QR code needs {modules} modules but the image is only {size}px")]
    TooDense { modules: usize, size: u32 },
    #[error("Invalid QR colour: {0}")]
    InvalidColor(String),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two QR images, as referenced from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrImages {
    pub url: String,
    pub modal: Asset,
    pub print: Asset,
}

/// Square grid of modules including the quiet zone. `true` is dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGrid {
    pub width: usize,
    pub cells: Vec<bool>,
}

impl ModuleGrid {
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }
}

/// Encode `url` and surround it with the quiet zone.
pub fn encode_modules(url: &str) -> Result<ModuleGrid, QrError> {
    let code = QrCode::new(url.as_bytes())?;
    let inner = code.width();
    let colors = code.to_colors();
    let width = inner + 2 * QUIET_ZONE;

    let mut cells = vec![false; width * width];
    for y in 0..inner {
        for x in 0..inner {
            cells[(y + QUIET_ZONE) * width + x + QUIET_ZONE] = colors[y * inner + x] == Color::Dark;
        }
    }
    Ok(ModuleGrid { width, cells })
}

/// Nearest-neighbour raster of `grid` at exactly `size`×`size` pixels.
///
/// Returns one `bool` per pixel, row-major.
pub fn rasterize(grid: &ModuleGrid, size: u32) -> Result<Vec<bool>, QrError> {
    let size_px = size as usize;
    let scale = size_px / grid.width;
    if scale == 0 {
        return Err(QrError::TooDense {
            modules: grid.width,
            size,
        });
    }
    let offset = (size_px - grid.width * scale) / 2;

    let mut pixels = vec![false; size_px * size_px];
    for y in 0..grid.width * scale {
        for x in 0..grid.width * scale {
            if grid.is_dark(x / scale, y / scale) {
                pixels[(y + offset) * size_px + x + offset] = true;
            }
        }
    }
    Ok(pixels)
}

/// Pack pixels into MSB-first 1-bit rows.
fn pack_rows(pixels: &[bool], size: u32) -> Vec<u8> {
    let size = size as usize;
    let stride = size.div_ceil(8);
    let mut packed = vec![0u8; stride * size];
    for y in 0..size {
        for x in 0..size {
            if pixels[y * size + x] {
                packed[y * stride + x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
    packed
}

/// Write a 1-bit indexed PNG. Palette index 0 is the background.
fn write_palette_png(
    path: &Path,
    pixels: &[bool],
    size: u32,
    foreground: [u8; 3],
    background: [u8; 3],
) -> Result<(), QrError> {
    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(writer, size, size);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::One);
    encoder.set_palette(vec![
        background[0],
        background[1],
        background[2],
        foreground[0],
        foreground[1],
        foreground[2],
    ]);
    encoder.set_compression(png::Compression::Best);
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&pack_rows(pixels, size))?;
    Ok(())
}

/// Generate both QR images or report why not.
pub fn try_generate_qr_images(
    url: &str,
    output_root: &Path,
    config: &QrConfig,
) -> Result<QrImages, QrError> {
    let foreground = parse_hex_color(&config.foreground)
        .ok_or_else(|| QrError::InvalidColor(config.foreground.clone()))?;
    let background = parse_hex_color(&config.background)
        .ok_or_else(|| QrError::InvalidColor(config.background.clone()))?;

    let grid = encode_modules(url)?;
    let image_dir = output_root.join(IMAGES_DIR);
    std::fs::create_dir_all(&image_dir)?;

    let write = |file_name: &str, size: u32| -> Result<Asset, QrError> {
        let pixels = rasterize(&grid, size)?;
        write_palette_png(&image_dir.join(file_name), &pixels, size, foreground, background)?;
        Ok(Asset::from_written(
            output_root,
            image_asset_path(file_name),
            size,
            size,
        )?)
    };
    let modal = write(MODAL_FILENAME, config.modal_size)?;
    let print = write(PRINT_FILENAME, config.print_size)?;

    Ok(QrImages {
        url: url.to_string(),
        modal,
        print,
    })
}

/// Generate both QR images; on failure log a warning and return `None`.
pub fn generate_qr_images(url: &str, output_root: &Path, config: &QrConfig) -> Option<QrImages> {
    match try_generate_qr_images(url, output_root, config) {
        Ok(images) => {
            log::info!("Generated QR codes for {url}");
            Some(images)
        }
        Err(e) => {
            log::warn!("Skipping QR code for {url}: {e}");
            None
        }
    }
}
