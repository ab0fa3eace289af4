//! HTML document generation.
//!
//! Produces `<output>/index.html` and the assets it references:
//!
//! 1. Copy the static asset directory verbatim (if it exists)
//! 2. Derive the profile photo set (production only)
//! 3. Generate the QR images for the resolved URL (production only)
//! 4. Render the template once with everything above
//! 5. Write `index.html`
//!
//! Steps 2 and 3 are optional assets: a missing or undecodable photo falls
//! back to the placeholder graphic, and a QR failure drops the QR section.
//! Both are logged as warnings. Draft builds skip them entirely.
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html
//! ├── style.css                  # from static/, if present
//! └── assets/images/
//!     ├── profile-desktop.avif   # 150×150
//!     ├── profile-desktop.png
//!     ├── profile-mobile.*       # 120×120
//!     ├── profile-thumbnail.*    # 64×64
//!     ├── profile-original.*     # 600×600
//!     ├── qr-modal.png           # 120×120
//!     └── qr-print.png           # 80×80
//! ```

use crate::config::QrConfig;
use crate::context::BuildContext;
use crate::imaging::{
    DeriveOptions, ImageBackend, ImageDerivativeSet, RustBackend, derive_images_with,
};
use crate::profile::ProfileDocument;
use crate::qr::{QrImages, generate_qr_images};
use crate::template::{self, RenderAssets, TemplateError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const INDEX_FILENAME: &str = "index.html";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to copy static assets: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Template rendered an empty document")]
    EmptyDocument,
}

/// Inputs of one document generation besides the profile and context.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    pub photo: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub images: DeriveOptions,
    pub qr: QrConfig,
}

/// What was written.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub index_path: PathBuf,
    pub bytes: usize,
    pub static_files: usize,
    /// `None` when the placeholder was used.
    pub images: Option<ImageDerivativeSet>,
    pub qr: Option<QrImages>,
}

/// Generate the document with the production image backend.
pub fn generate_document(
    profile: &ProfileDocument,
    template_path: &Path,
    context: &BuildContext,
    options: &GenerateOptions,
) -> Result<GeneratedDocument, GenerateError> {
    generate_document_with(&RustBackend::new(), profile, template_path, context, options)
}

pub fn generate_document_with(
    backend: &impl ImageBackend,
    profile: &ProfileDocument,
    template_path: &Path,
    context: &BuildContext,
    options: &GenerateOptions,
) -> Result<GeneratedDocument, GenerateError> {
    let template_source = template::load_template(template_path)?;
    let output_dir = &options.output_dir;
    fs::create_dir_all(output_dir)?;

    let static_files = match &options.static_dir {
        Some(dir) if dir.is_dir() => copy_static_assets(dir, output_dir)?,
        _ => 0,
    };

    let (images, qr) = if context.is_draft() {
        log::info!("Draft build: skipping photo derivatives and QR codes");
        (None, None)
    } else {
        (
            derive_photo(backend, options),
            generate_qr_images(&context.url, output_dir, &options.qr),
        )
    };

    let html = template::render(
        profile,
        &template_source,
        context,
        RenderAssets {
            photo: images.as_ref(),
            qr: qr.as_ref(),
        },
    )?;
    if html.trim().is_empty() {
        return Err(GenerateError::EmptyDocument);
    }

    let index_path = output_dir.join(INDEX_FILENAME);
    fs::write(&index_path, &html)?;
    log::info!("Generated {}", index_path.display());

    Ok(GeneratedDocument {
        index_path,
        bytes: html.len(),
        static_files,
        images,
        qr,
    })
}

fn derive_photo(
    backend: &impl ImageBackend,
    options: &GenerateOptions,
) -> Option<ImageDerivativeSet> {
    match derive_images_with(backend, &options.photo, &options.output_dir, &options.images) {
        Ok(set) => Some(set),
        Err(e) => {
            log::warn!("{e}; using placeholder photo");
            None
        }
    }
}

/// Copy every file under `src` into `dst`, keeping the relative layout.
///
/// Returns the number of files copied.
pub fn copy_static_assets(src: &Path, dst: &Path) -> Result<usize, GenerateError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    log::debug!("Copied {copied} static files from {}", src.display());
    Ok(copied)
}

// ============================================================================
// Tests
// ============================================================================
