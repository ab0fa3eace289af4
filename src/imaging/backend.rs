//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the deriver needs:
//! identify a source photo, and produce one derivative file from it.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording [`MockBackend`](tests::MockBackend).

use super::params::DeriveParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Decode the source far enough to learn its dimensions.
    ///
    /// Applies the same decode policy as [`derive`](Self::derive), so a
    /// successful identify means the source is usable.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Cover-crop, optionally mask, and encode one derivative.
    fn derive(&self, params: &DeriveParams) -> Result<(), BackendError>;
}
