//! Derivative cache for incremental builds.
//!
//! AVIF encoding is the slowest step of a build: four derivatives through
//! rav1e take seconds, while everything else takes milliseconds. This module
//! lets the image deriver skip encoding when the source photo and encoding
//! parameters haven't changed since the last build.
//!
//! ## Cache keys
//!
//! Each derivative file name maps to a [`CacheEntry`] of two hashes:
//!
//! - **`source_hash`**: SHA-256 of the source photo contents. Content-based
//!   rather than mtime-based so it survives `git checkout` (which resets
//!   modification times). Computed once per build and shared by every
//!   derivative.
//!
//! - **`params_hash`**: SHA-256 of the encoding parameters (size key, edge,
//!   encoding, quality or compression level, mask). Changing any config value
//!   that affects the output changes the hash.
//!
//! A cache hit requires a matching entry **and** the output file still on
//! disk.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<image_dir>/.derive-cache.json`, next to
//! the derivatives it describes, so it travels with the output directory when
//! cached in CI.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` loads an empty manifest, so every derivative is re-encoded.

use crate::config::PngCompression;
use crate::imaging::params::{Encoding, SizeKey};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the image directory.
const MANIFEST_FILENAME: &str = ".derive-cache.json";

/// Bump to invalidate every existing cache when the key computation or the
/// pixel pipeline changes.
const MANIFEST_VERSION: u32 = 1;

/// Hashes recorded for one derivative file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk manifest mapping derivative file names to their cache entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the image directory. Returns an empty manifest if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(image_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(image_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            Ok(_) => {
                log::debug!("Derivative cache version changed, starting fresh");
                Self::empty()
            }
            Err(e) => {
                log::debug!("Ignoring unreadable derivative cache: {e}");
                Self::empty()
            }
        }
    }

    /// Save to the image directory.
    pub fn save(&self, image_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(image_dir), json)
    }

    /// True if `file_name` was produced from the same source and parameters
    /// and is still on disk.
    pub fn is_fresh(
        &self,
        file_name: &str,
        source_hash: &str,
        params_hash: &str,
        image_dir: &Path,
    ) -> bool {
        self.entries.get(file_name).is_some_and(|entry| {
            entry.source_hash == source_hash && entry.params_hash == params_hash
        }) && image_dir.join(file_name).exists()
    }

    /// Record the hashes a derivative was produced with.
    pub fn insert(&mut self, file_name: String, source_hash: String, params_hash: String) {
        self.entries.insert(
            file_name,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }

    /// Drop entries whose file is no longer produced (e.g. AVIF in a draft run).
    pub fn retain_files(&mut self, keep: &[String]) {
        self.entries.retain(|name, _| keep.contains(name));
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// SHA-256 hash of the parameters that shape one derivative.
pub fn hash_derive_params(key: SizeKey, edge: u32, encoding: Encoding, circular: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"derive\0");
    hasher.update(key.name().as_bytes());
    hasher.update(b"\0");
    hasher.update(edge.to_le_bytes());
    match encoding {
        Encoding::Avif(quality) => {
            hasher.update(b"avif\0");
            hasher.update(quality.value().to_le_bytes());
        }
        Encoding::Png(compression) => {
            hasher.update(b"png\0");
            hasher.update(match compression {
                PngCompression::Fast => [0u8],
                PngCompression::Default => [1u8],
                PngCompression::Best => [2u8],
            });
        }
    }
    hasher.update([circular as u8]);
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// Resolve the cache manifest path for an image directory.
pub fn manifest_path(image_dir: &Path) -> PathBuf {
    image_dir.join(MANIFEST_FILENAME)
}
