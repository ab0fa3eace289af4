//! Shared types used across build stages.
//!
//! [`Asset`] is what the image deriver and the QR generator hand to the
//! renderer: a file written under the output root, described by the path the
//! HTML should reference.

use serde::Serialize;
use std::path::Path;

/// A generated file, referenced from the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Path relative to the output root, always `/`-separated.
    pub path: String,
    pub width: u32,
    pub height: u32,
    /// Encoded size on disk.
    pub bytes: u64,
}

impl Asset {
    /// Describe a file that has already been written.
    ///
    /// `relative` is joined under `output_root` to stat the file.
    pub fn from_written(
        output_root: &Path,
        relative: String,
        width: u32,
        height: u32,
    ) -> std::io::Result<Self> {
        let bytes = std::fs::metadata(output_root.join(&relative))?.len();
        Ok(Self {
            path: relative,
            width,
            height,
            bytes,
        })
    }
}

/// Directory, relative to the output root, that holds derived images and QR codes.
pub const IMAGES_DIR: &str = "assets/images";

/// `assets/images/<file_name>`.
pub fn image_asset_path(file_name: &str) -> String {
    format!("{IMAGES_DIR}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn asset_path_is_slash_separated() {
        assert_eq!(image_asset_path("qr-modal.png"), "assets/images/qr-modal.png");
    }

    #[test]
    fn from_written_reads_size() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(IMAGES_DIR)).unwrap();
        let rel = image_asset_path("x.png");
        std::fs::write(tmp.path().join(&rel), b"12345").unwrap();

        let asset = Asset::from_written(tmp.path(), rel, 10, 10).unwrap();
        assert_eq!(asset.bytes, 5);
        assert_eq!(asset.path, "assets/images/x.png");
    }

    #[test]
    fn from_written_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(Asset::from_written(tmp.path(), "nope.png".into(), 1, 1).is_err());
    }
}
