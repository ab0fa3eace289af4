//! Shared test utilities for the resume-press test suite.
//!
//! Provides fixture setup, synthetic source photos and small profile
//! documents so individual modules don't each hand-roll them.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! write_test_jpeg(&tmp.path().join("assets/profile.jpg"), 320, 240);
//! let profile = crate::profile::load_profile(&tmp.path().join("resume.json")).unwrap();
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::context::{BuildContext, BuildMode, EnvSnapshot};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/resume/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/resume");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Synthetic inputs
// =========================================================================

/// Write a gradient JPEG of the given size, creating parent directories.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Write a PNG image under a misleading `.jpg` name.
pub fn write_png_named_jpg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// A small but complete profile document.
pub fn minimal_profile_json() -> String {
    r#"{
        "basics": {
            "name": "Ada Lovelace",
            "label": "Analytical Engineer",
            "email": "ada@example.com",
            "summary": "Wrote the **first** published algorithm."
        },
        "work": [
            {
                "name": "Analytical Engine Project",
                "position": "Programmer",
                "startDate": "1842-01",
                "highlights": ["Note G"]
            }
        ],
        "education": [{"institution": "Private tutoring", "area": "Mathematics"}],
        "skills": [
            {"name": "Mathematics", "keywords": ["Algorithms", "Notation"]}
        ]
    }"#
    .to_string()
}

// =========================================================================
// Build context
// =========================================================================

/// A deterministic context: fixed timestamp, commit and URL.
pub fn test_context(mode: BuildMode) -> BuildContext {
    let env = EnvSnapshot::from_pairs([("COMMIT_REF", "abcdef1234567890")]);
    let mut ctx = BuildContext::resolve(&env, mode, None, 3000);
    ctx.timestamp = "2024-01-01T00:00:00+00:00".to_string();
    ctx
}

/// Sorted relative paths of every file under `root`.
pub fn relative_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
