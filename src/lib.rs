//! # resume-press
//!
//! Builds a résumé from one JSON profile document: a static HTML page plus
//! three PDF renditions of it.
//!
//! # Architecture: One Document, Three Prints
//!
//! ```text
//! resume.json ─┐
//! template.html├─ render ──→ dist/index.html ──→ headless Chromium ──→ resume.pdf
//! profile.jpg ─┤     ↑                                             ├─→ resume-print.pdf
//! environment ─┘     │                                             └─→ resume-ats.pdf
//!              photo derivatives + QR codes
//! ```
//!
//! The HTML document is the single source of truth. Every PDF is printed from
//! it, with a variant-specific stylesheet and DOM rules applied in the
//! browser just before printing.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `resume.toml` loading, validation and merging over stock defaults |
//! | [`context`] | Build context: version, commit, environment, QR target URL |
//! | [`profile`] | Profile document model and derived document info |
//! | [`imaging`] | Profile photo derivatives: square, circular, PNG + AVIF |
//! | [`cache`] | Content-addressed cache for photo derivatives |
//! | [`qr`] | 1-bit palette PNG QR codes for the résumé URL |
//! | [`template`] | Handlebars rendering with `json`, `eq` and `markdown` helpers |
//! | [`fragments`] | Pre-rendered HTML snippets (photo, QR, meta tags) via Maud |
//! | [`generate`] | Writes `index.html` and its assets |
//! | [`print`] | Variant print engine: HTML to three PDFs |
//! | [`pipeline`] | Build orchestration, degraded-build handling, `check` |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Draft vs Production
//!
//! Draft builds only render HTML: no photo derivatives, no QR codes, no
//! PDFs, and stale PDFs are removed so a draft output directory never carries
//! documents from an older production build.
//!
//! ## Optional Assets Never Fail a Build
//!
//! The photo, the QR codes and the PDFs are all optional. A missing photo
//! falls back to an inline placeholder graphic, a QR failure drops the QR
//! section, and a PDF phase that fails or overruns its deadline leaves an
//! HTML-only build. The profile document, the template and the config are
//! required; anything wrong with them is fatal.
//!
//! ## Pure-Rust Imaging
//!
//! Photo derivatives use the `image` crate (Lanczos3 resampling, AVIF via
//! `rav1e`). QR codes are encoded with `qrcode` and written with `png`
//! directly as 1-bit palette images, so modules stay crisp at any size.

pub mod cache;
pub mod config;
pub mod context;
pub mod fragments;
pub mod generate;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod print;
pub mod profile;
pub mod qr;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
