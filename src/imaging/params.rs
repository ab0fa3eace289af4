//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which derivatives to create) and the
//! [`backend`](super::backend) (which does the pixel work). This separation
//! allows swapping in a mock backend without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`SizeKey`]: The four fixed derivative sizes.
//! - [`Encoding`]: Modern (AVIF) or fallback (PNG) output encoding.
//! - [`DeriveParams`]: Full specification for one derivative file.

use crate::config::PngCompression;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Fixed derivative sizes. All derivatives are square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeKey {
    Desktop,
    Mobile,
    Thumbnail,
    Original,
}

impl SizeKey {
    pub const ALL: [SizeKey; 4] = [
        SizeKey::Desktop,
        SizeKey::Mobile,
        SizeKey::Thumbnail,
        SizeKey::Original,
    ];

    /// The derivative the document shows by default.
    pub const PRIMARY: SizeKey = SizeKey::Desktop;

    /// Edge length in pixels.
    pub fn edge(self) -> u32 {
        match self {
            SizeKey::Desktop => 150,
            SizeKey::Mobile => 120,
            SizeKey::Thumbnail => 64,
            SizeKey::Original => 600,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SizeKey::Desktop => "desktop",
            SizeKey::Mobile => "mobile",
            SizeKey::Thumbnail => "thumbnail",
            SizeKey::Original => "original",
        }
    }
}

impl fmt::Display for SizeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output encoding of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Lossy AVIF, the modern format.
    Avif(Quality),
    /// Lossless PNG, the fallback every browser and PDF renderer handles.
    Png(PngCompression),
}

impl Encoding {
    pub fn extension(self) -> &'static str {
        match self {
            Encoding::Avif(_) => "avif",
            Encoding::Png(_) => "png",
        }
    }
}

/// Parameters for one derivative: cover-crop to a square, mask, encode.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub edge: u32,
    pub encoding: Encoding,
    /// Apply the circular alpha mask after cropping.
    pub circular: bool,
}
