//! High-level image operations.
//!
//! [`derive_images`] turns one profile photo into the fixed
//! [`ImageDerivativeSet`]: every [`SizeKey`] as a PNG fallback and, outside
//! draft mode, an AVIF. It plans [`DeriveParams`], consults the
//! [derivative cache](crate::cache) and calls the backend for misses.

use super::backend::{BackendError, ImageBackend};
use super::params::{DeriveParams, Encoding, Quality, SizeKey};
use super::rust_backend::RustBackend;
use crate::cache::{self, CacheManifest, CacheStats};
use crate::config::{ImagesConfig, PngCompression};
use crate::types::{Asset, IMAGES_DIR, image_asset_path};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Profile photo source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Could not decode profile photo {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for ImagingError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Decode(msg) => ImagingError::Decode(msg),
            BackendError::Io(e) => ImagingError::Io(e),
            other => ImagingError::Backend(other),
        }
    }
}

/// How derivatives are encoded for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeriveOptions {
    /// Skip the AVIF encoding.
    pub draft: bool,
    pub use_cache: bool,
    pub modern_quality: Quality,
    pub png_compression: PngCompression,
}

impl DeriveOptions {
    pub fn from_config(config: &ImagesConfig, draft: bool, use_cache: bool) -> Self {
        Self {
            draft,
            use_cache,
            modern_quality: Quality::new(config.modern_quality),
            png_compression: config.png_compression,
        }
    }

    fn encodings(&self) -> Vec<Encoding> {
        let mut encodings = vec![Encoding::Png(self.png_compression)];
        if !self.draft {
            encodings.push(Encoding::Avif(self.modern_quality));
        }
        encodings
    }
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self::from_config(&ImagesConfig::default(), false, true)
    }
}

/// One size key in both encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derivative {
    pub png: Asset,
    /// Absent in draft mode.
    pub avif: Option<Asset>,
}

/// Every derivative of the profile photo, keyed by size.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDerivativeSet {
    #[serde(flatten)]
    pub derivatives: BTreeMap<SizeKey, Derivative>,
    #[serde(skip)]
    pub source_dimensions: (u32, u32),
    #[serde(skip)]
    pub cache: CacheStats,
}

impl ImageDerivativeSet {
    pub fn get(&self, key: SizeKey) -> Option<&Derivative> {
        self.derivatives.get(&key)
    }

    /// The derivative the document shows by default.
    pub fn primary(&self) -> Option<&Derivative> {
        self.get(SizeKey::PRIMARY)
    }

    /// Relative paths of every file in the set.
    pub fn files(&self) -> Vec<&str> {
        self.derivatives
            .values()
            .flat_map(|d| std::iter::once(&d.png).chain(d.avif.as_ref()))
            .map(|a| a.path.as_str())
            .collect()
    }
}

/// File name of one derivative, e.g. `profile-desktop.avif`.
pub fn derivative_file_name(key: SizeKey, encoding: Encoding) -> String {
    format!("profile-{}.{}", key.name(), encoding.extension())
}

/// Plan every derivative without executing anything.
pub fn plan_derivatives(
    source: &Path,
    image_dir: &Path,
    options: &DeriveOptions,
) -> Vec<(SizeKey, DeriveParams)> {
    SizeKey::ALL
        .iter()
        .flat_map(|&key| {
            options.encodings().into_iter().map(move |encoding| {
                (
                    key,
                    DeriveParams {
                        source: source.to_path_buf(),
                        output: image_dir.join(derivative_file_name(key, encoding)),
                        edge: key.edge(),
                        encoding,
                        circular: true,
                    },
                )
            })
        })
        .collect()
}

/// Derive the profile photo set with the production backend.
///
/// Files land in `<output_root>/assets/images/`.
pub fn derive_images(
    source: &Path,
    output_root: &Path,
    options: &DeriveOptions,
) -> Result<ImageDerivativeSet, ImagingError> {
    derive_images_with(&RustBackend::new(), source, output_root, options)
}

pub fn derive_images_with(
    backend: &impl ImageBackend,
    source: &Path,
    output_root: &Path,
    options: &DeriveOptions,
) -> Result<ImageDerivativeSet, ImagingError> {
    if !source.is_file() {
        return Err(ImagingError::SourceNotFound(source.to_path_buf()));
    }
    let dims = backend.identify(source)?;

    let image_dir = output_root.join(IMAGES_DIR);
    std::fs::create_dir_all(&image_dir)?;

    let mut manifest = if options.use_cache {
        CacheManifest::load(&image_dir)
    } else {
        CacheManifest::empty()
    };
    let source_hash = cache::hash_file(source)?;
    let mut stats = CacheStats::default();
    let mut derivatives: BTreeMap<SizeKey, Derivative> = BTreeMap::new();
    let mut written = Vec::new();

    for (key, params) in plan_derivatives(source, &image_dir, options) {
        let file_name = derivative_file_name(key, params.encoding);
        let params_hash =
            cache::hash_derive_params(key, params.edge, params.encoding, params.circular);

        if options.use_cache
            && manifest.is_fresh(&file_name, &source_hash, &params_hash, &image_dir)
        {
            stats.hit();
        } else {
            backend.derive(&params)?;
            stats.miss();
        }
        manifest.insert(file_name.clone(), source_hash.clone(), params_hash);

        let asset = Asset::from_written(
            output_root,
            image_asset_path(&file_name),
            params.edge,
            params.edge,
        )?;
        let entry = derivatives.entry(key).or_insert_with(|| Derivative {
            png: asset.clone(),
            avif: None,
        });
        match params.encoding {
            Encoding::Png(_) => entry.png = asset,
            Encoding::Avif(_) => entry.avif = Some(asset),
        }
        written.push(file_name);
    }

    if options.draft {
        remove_stale_modern(&image_dir)?;
    }
    manifest.retain_files(&written);
    manifest.save(&image_dir)?;

    log::info!(
        "Derived {} profile images from {} ({stats})",
        written.len(),
        source.display()
    );

    Ok(ImageDerivativeSet {
        derivatives,
        source_dimensions: (dims.width, dims.height),
        cache: stats,
    })
}

/// Remove AVIF derivatives left by an earlier non-draft run.
fn remove_stale_modern(image_dir: &Path) -> std::io::Result<()> {
    for key in SizeKey::ALL {
        let path = image_dir.join(derivative_file_name(key, Encoding::Avif(Quality::default())));
        if path.exists() {
            log::debug!("Removing stale {}", path.display());
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{relative_files, write_test_jpeg};
    use tempfile::TempDir;

    fn options(draft: bool) -> DeriveOptions {
        DeriveOptions {
            draft,
            use_cache: true,
            modern_quality: Quality::new(60),
            png_compression: PngCompression::Fast,
        }
    }

    fn source(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("profile.jpg");
        std::fs::write(&path, b"not decoded by the mock").unwrap();
        path
    }

    // =========================================================================
    // Planning
    // =========================================================================

    #[test]
    fn plan_covers_every_key_in_both_encodings() {
        let plan = plan_derivatives(Path::new("/p.jpg"), Path::new("/out"), &options(false));
        assert_eq!(plan.len(), 8);
        let names: Vec<String> = plan
            .iter()
            .map(|(_, p)| p.output.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"profile-desktop.png".to_string()));
        assert!(names.contains(&"profile-original.avif".to_string()));
        assert!(plan.iter().all(|(_, p)| p.circular));
        assert!(plan.iter().all(|(k, p)| p.edge == k.edge()));
    }

    #[test]
    fn plan_draft_is_png_only() {
        let plan = plan_derivatives(Path::new("/p.jpg"), Path::new("/out"), &options(true));
        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|(_, p)| p.encoding.extension() == "png"));
    }

    // =========================================================================
    // Derivation with the mock backend
    // =========================================================================

    #[test]
    fn missing_source_is_reported() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let err = derive_images_with(
            &backend,
            &tmp.path().join("missing.jpg"),
            tmp.path(),
            &options(false),
        )
        .unwrap_err();
        assert!(matches!(err, ImagingError::SourceNotFound(_)));
        assert!(err.to_string().contains("source not found"));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn decode_failure_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let err = derive_images_with(&MockBackend::failing(), &src, tmp.path(), &options(false))
            .unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }

    #[test]
    fn production_set_has_both_encodings() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let backend = MockBackend::new();
        let out = tmp.path().join("dist");

        let set = derive_images_with(&backend, &src, &out, &options(false)).unwrap();

        assert_eq!(backend.derive_count(), 8);
        assert_eq!(set.derivatives.len(), 4);
        for key in SizeKey::ALL {
            let d = set.get(key).unwrap();
            assert_eq!(d.png.width, key.edge());
            assert_eq!(d.png.path, format!("assets/images/profile-{key}.png"));
            assert_eq!(
                d.avif.as_ref().map(|a| a.path.as_str()),
                Some(format!("assets/images/profile-{key}.avif").as_str())
            );
            assert!(d.png.bytes > 0);
        }
        assert_eq!(set.primary().unwrap().png.width, 150);
        assert_eq!(set.source_dimensions, (800, 600));
    }

    #[test]
    fn draft_writes_no_avif() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let backend = MockBackend::new();
        let out = tmp.path().join("dist");

        let set = derive_images_with(&backend, &src, &out, &options(true)).unwrap();

        assert_eq!(backend.derive_count(), 4);
        assert!(set.derivatives.values().all(|d| d.avif.is_none()));
        assert!(!relative_files(&out).iter().any(|f| f.ends_with(".avif")));
    }

    #[test]
    fn draft_removes_avif_from_earlier_run() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let out = tmp.path().join("dist");

        derive_images_with(&MockBackend::new(), &src, &out, &options(false)).unwrap();
        assert!(out.join("assets/images/profile-desktop.avif").exists());

        derive_images_with(&MockBackend::new(), &src, &out, &options(true)).unwrap();
        assert!(!relative_files(&out).iter().any(|f| f.ends_with(".avif")));
    }

    #[test]
    fn second_run_hits_cache() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let out = tmp.path().join("dist");

        derive_images_with(&MockBackend::new(), &src, &out, &options(false)).unwrap();

        let backend = MockBackend::new();
        let set = derive_images_with(&backend, &src, &out, &options(false)).unwrap();
        assert_eq!(backend.derive_count(), 0);
        assert_eq!(set.cache, CacheStats { hits: 8, misses: 0 });
    }

    #[test]
    fn changed_source_misses_cache() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let out = tmp.path().join("dist");

        derive_images_with(&MockBackend::new(), &src, &out, &options(false)).unwrap();
        std::fs::write(&src, b"a different photo").unwrap();

        let backend = MockBackend::new();
        derive_images_with(&backend, &src, &out, &options(false)).unwrap();
        assert_eq!(backend.derive_count(), 8);
    }

    #[test]
    fn no_cache_reencodes() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let out = tmp.path().join("dist");

        derive_images_with(&MockBackend::new(), &src, &out, &options(false)).unwrap();

        let backend = MockBackend::new();
        let mut opts = options(false);
        opts.use_cache = false;
        derive_images_with(&backend, &src, &out, &opts).unwrap();
        assert_eq!(backend.derive_count(), 8);
    }

    #[test]
    fn identify_runs_before_any_derive() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let backend = MockBackend::new();
        derive_images_with(&backend, &src, tmp.path(), &options(true)).unwrap();
        assert!(matches!(backend.get_operations()[0], RecordedOp::Identify(_)));
    }

    #[test]
    fn files_lists_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let src = source(&tmp);
        let set =
            derive_images_with(&MockBackend::new(), &src, tmp.path(), &options(true)).unwrap();
        let files = set.files();
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| f.starts_with("assets/images/profile-")));
    }

    // =========================================================================
    // Real backend
    // =========================================================================

    #[test]
    fn repeated_derivation_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("profile.jpg");
        write_test_jpeg(&src, 320, 240);
        let mut opts = options(true);
        opts.use_cache = false;

        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        derive_images(&src, &a, &opts).unwrap();
        derive_images(&src, &b, &opts).unwrap();

        for key in SizeKey::ALL {
            let rel = format!("assets/images/profile-{key}.png");
            assert_eq!(
                std::fs::read(a.join(&rel)).unwrap(),
                std::fs::read(b.join(&rel)).unwrap(),
                "{rel} differs"
            );
        }
    }

    #[test]
    fn real_backend_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = derive_images(&tmp.path().join("nope.jpg"), tmp.path(), &DeriveOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("source not found"));
    }
}
