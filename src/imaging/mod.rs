//! Profile photo derivation, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader`, extension then sniffed format |
//! | **Cover crop** | `resize_to_fill` + Lanczos3 |
//! | **Circular mask** | alpha cleared outside the inscribed circle |
//! | **Encode** | AVIF (rav1e) + PNG fallback |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`derive_images`], planning + cache + backend calls

pub mod backend;
pub mod operations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use operations::{
    DeriveOptions, Derivative, ImageDerivativeSet, ImagingError, derive_images,
    derive_images_with,
};
pub use params::{Quality, SizeKey};
pub use rust_backend::RustBackend;
