//! Build configuration.
//!
//! Handles loading, validating, and merging `resume.toml`. Every key is
//! optional: the stock defaults cover a conventional project layout, and a
//! user file only needs the values it wants to change.
//!
//! ## Project Layout (defaults)
//!
//! ```text
//! ./
//! ├── resume.toml            # This file (optional)
//! ├── resume.json            # Profile document
//! ├── template.html          # Handlebars template
//! ├── assets/profile.jpg     # Source photo (optional)
//! └── static/                # Copied verbatim into the output (optional)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [paths]
//! data = "resume.json"
//! template = "template.html"
//! photo = "assets/profile.jpg"
//! static_dir = "static"
//! output = "dist"
//!
//! [site]
//! # version = "2.1.0"      # Falls back to RESUME_VERSION, then the tool version
//! dev_port = 3000           # Port used for LAN / localhost QR targets
//!
//! [images]
//! png_compression = "best"  # "fast", "default" or "best" (PNG is lossless either way)
//! modern_quality = 70       # AVIF quality
//!
//! [qr]
//! foreground = "#000000"
//! background = "#ffffff"
//! modal_size = 120
//! print_size = 80
//!
//! [pdf]
//! timeout_secs = 60         # Deadline for the whole PDF phase
//! settle_timeout_ms = 3000  # Max wait for the page readiness marker
//! image_wait_ms = 5000      # Max wait for an <img> to appear
//! paper = "letter"          # "letter" or "a4"
//! # chrome_path = "/usr/bin/chromium"
//! sandbox = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the project root.
pub const CONFIG_FILENAME: &str = "resume.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Resume build configuration loaded from `resume.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResumeConfig {
    /// Input and output locations, relative to the project root.
    pub paths: PathsConfig,
    /// Site-level metadata.
    pub site: SiteConfig,
    /// Photo derivative encoding.
    pub images: ImagesConfig,
    /// QR code appearance.
    pub qr: QrConfig,
    /// Headless-browser PDF export.
    pub pdf: PdfConfig,
}

impl ResumeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.modern_quality == 0 || self.images.modern_quality > 100 {
            return Err(ConfigError::Validation(
                "images.modern_quality must be 1-100".into(),
            ));
        }
        if self.qr.modal_size < 21 || self.qr.print_size < 21 {
            return Err(ConfigError::Validation(
                "qr sizes must be at least 21px (one pixel per module)".into(),
            ));
        }
        parse_hex_color(&self.qr.foreground)
            .ok_or_else(|| ConfigError::Validation("qr.foreground must be #rrggbb".into()))?;
        parse_hex_color(&self.qr.background)
            .ok_or_else(|| ConfigError::Validation("qr.background must be #rrggbb".into()))?;
        if self.pdf.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "pdf.timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Profile document (JSON).
    pub data: PathBuf,
    /// Handlebars HTML template.
    pub template: PathBuf,
    /// Source photograph for the derivative set.
    pub photo: PathBuf,
    /// Directory copied verbatim into the output root, if it exists.
    pub static_dir: PathBuf,
    /// Build output directory.
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: "resume.json".into(),
            template: "template.html".into(),
            photo: "assets/profile.jpg".into(),
            static_dir: "static".into(),
            output: "dist".into(),
        }
    }
}

impl PathsConfig {
    /// Resolve every relative path against `root`.
    pub fn resolve(&self, root: &Path) -> PathsConfig {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        PathsConfig {
            data: join(&self.data),
            template: join(&self.template),
            photo: join(&self.photo),
            static_dir: join(&self.static_dir),
            output: join(&self.output),
        }
    }
}

/// Site-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Version shown in the build-info span. Overridden by `RESUME_VERSION`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Port of the local preview server, used for LAN/localhost QR targets.
    pub dev_port: u16,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            version: None,
            dev_port: 3000,
        }
    }
}

/// PNG encoder effort. Output is lossless at every level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

/// Photo derivative encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Effort spent compressing the fallback (PNG) derivatives.
    pub png_compression: PngCompression,
    /// AVIF encoding quality (1 = worst, 100 = best).
    pub modern_quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            png_compression: PngCompression::Best,
            modern_quality: 70,
        }
    }
}

/// QR code appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QrConfig {
    /// Module colour.
    pub foreground: String,
    /// Quiet-zone and light-module colour.
    pub background: String,
    /// Edge length of the on-screen (modal) QR image.
    pub modal_size: u32,
    /// Edge length of the printed QR image.
    pub print_size: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            foreground: "#000000".to_string(),
            background: "#ffffff".to_string(),
            modal_size: 120,
            print_size: 80,
        }
    }
}

/// Paper sizes supported by the print engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paper {
    Letter,
    A4,
}

impl Paper {
    /// Paper dimensions in inches, `(width, height)`.
    pub fn inches(self) -> (f64, f64) {
        match self {
            Paper::Letter => (8.5, 11.0),
            Paper::A4 => (8.27, 11.69),
        }
    }
}

/// Headless-browser PDF export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdfConfig {
    /// Deadline for the whole PDF phase (all three variants).
    pub timeout_secs: u64,
    /// Bounded wait for the readiness marker before exporting anyway.
    pub settle_timeout_ms: u64,
    /// Bounded wait for an `<img>` element after navigation.
    pub image_wait_ms: u64,
    /// Physical page size for every variant.
    pub paper: Paper,
    /// Explicit Chromium binary; auto-detected when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    /// Run Chromium with its sandbox (disable inside some containers).
    pub sandbox: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            settle_timeout_ms: 3000,
            image_wait_ms: 5000,
            paper: Paper::Letter,
            chrome_path: None,
            sandbox: true,
        }
    }
}

/// Parse a `#rrggbb` colour into its RGB components.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ResumeConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` when the file is absent.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ResumeConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ResumeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<ResumeConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `resume.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# resume-press configuration
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Inputs and outputs (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
data = "resume.json"
template = "template.html"
photo = "assets/profile.jpg"
static_dir = "static"
output = "dist"

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Version shown in the build-info span. RESUME_VERSION takes precedence.
# version = "1.0.0"

# Port of the local preview server; used for LAN and localhost QR targets.
dev_port = 3000

# ---------------------------------------------------------------------------
# Photo derivatives
# ---------------------------------------------------------------------------
[images]
# PNG derivatives are lossless; this only trades encode time for file size.
# "fast", "default" or "best"
png_compression = "best"

# AVIF encoding quality (1 = worst, 100 = best).
modern_quality = 70

# ---------------------------------------------------------------------------
# QR codes (always PNG: flat blocks, no lossy artifacts)
# ---------------------------------------------------------------------------
[qr]
foreground = "#000000"
background = "#ffffff"
modal_size = 120
print_size = 80

# ---------------------------------------------------------------------------
# PDF export
# ---------------------------------------------------------------------------
[pdf]
# Deadline in seconds for all three PDF variants together.
timeout_secs = 60

# Maximum wait for fonts and images to settle before exporting anyway.
settle_timeout_ms = 3000

# Maximum wait for an <img> element to appear after navigation.
image_wait_ms = 5000

# "letter" or "a4"
paper = "letter"

# Explicit Chromium binary; auto-detected when omitted.
# chrome_path = "/usr/bin/chromium"

# Disable inside containers that cannot run Chromium's sandbox.
sandbox = true
"##
}
