//! Pre-rendered HTML snippets handed to the template.
//!
//! Templates can build their own markup from `photo`/`qr`/`build` data, but
//! the common pieces are rendered here with maud so escaping and `srcset`
//! syntax are right by construction. Templates insert them with triple-stash:
//! `{{{fragments.photo}}}`.

use crate::context::BuildContext;
use crate::imaging::{ImageDerivativeSet, SizeKey};
use crate::profile::DocumentInfo;
use crate::qr::QrImages;
use crate::types::Asset;
use maud::{Markup, html};
use serde::Serialize;

/// Image sizes hint shared by both `<source>` elements.
const PHOTO_SIZES: &str = "(max-width: 640px) 120px, 150px";

/// The snippets exposed as `fragments.*`.
#[derive(Debug, Clone, Serialize)]
pub struct Fragments {
    pub photo: String,
    /// Empty when there is no QR code.
    pub qr: String,
    pub meta: String,
}

impl Fragments {
    pub fn render(
        photo: Option<&ImageDerivativeSet>,
        qr: Option<&QrImages>,
        ctx: &BuildContext,
        info: &DocumentInfo,
    ) -> Self {
        let alt = format!("Photo of {}", info.author);
        let photo = match photo {
            Some(set) => profile_picture(set, &alt),
            None => placeholder_photo(&alt),
        };
        Self {
            photo: photo.into_string(),
            qr: qr.map(|q| qr_figure(q).into_string()).unwrap_or_default(),
            meta: build_meta(ctx, info).into_string(),
        }
    }
}

fn srcset<'a>(assets: impl Iterator<Item = &'a Asset>) -> String {
    assets
        .map(|a| format!("{} {}w", a.path, a.width))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `<picture>` with AVIF and PNG sources and the primary PNG as `<img>`.
pub fn profile_picture(set: &ImageDerivativeSet, alt: &str) -> Markup {
    let Some(primary) = set.primary() else {
        return placeholder_photo(alt);
    };
    let responsive = [SizeKey::Mobile, SizeKey::Desktop, SizeKey::Original];
    let pngs = srcset(responsive.iter().filter_map(|k| set.get(*k)).map(|d| &d.png));
    let avifs = srcset(
        responsive
            .iter()
            .filter_map(|k| set.get(*k))
            .filter_map(|d| d.avif.as_ref()),
    );

    html! {
        picture.profile-photo {
            @if !avifs.is_empty() {
                source type="image/avif" srcset=(avifs) sizes=(PHOTO_SIZES);
            }
            source type="image/png" srcset=(pngs) sizes=(PHOTO_SIZES);
            img src=(primary.png.path) alt=(alt)
                width=(primary.png.width) height=(primary.png.height)
                decoding="async";
        }
    }
}

/// Neutral silhouette used in draft mode and when the photo is unusable.
pub fn placeholder_photo(alt: &str) -> Markup {
    html! {
        div.profile-photo.placeholder role="img" aria-label=(alt) {
            svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 150 150" width="150" height="150" {
                circle cx="75" cy="75" r="75" fill="#d9dde3" {}
                circle cx="75" cy="60" r="26" fill="#9aa3ad" {}
                path d="M30 128c8-26 26-38 45-38s37 12 45 38a75 75 0 0 1-90 0z" fill="#9aa3ad" {}
            }
        }
    }
}

/// Figure with the on-screen and print QR images.
pub fn qr_figure(qr: &QrImages) -> Markup {
    let alt = format!("QR code linking to {}", qr.url);
    html! {
        figure.qr-code {
            img.qr-modal src=(qr.modal.path) alt=(alt)
                width=(qr.modal.width) height=(qr.modal.height);
            img.qr-print src=(qr.print.path) alt=(alt)
                width=(qr.print.width) height=(qr.print.height);
            figcaption { a href=(qr.url) { (qr.url) } }
        }
    }
}

/// `<meta>` tags describing the document and the build that produced it.
pub fn build_meta(ctx: &BuildContext, info: &DocumentInfo) -> Markup {
    html! {
        meta name="author" content=(info.author);
        meta name="description" content=(info.subject);
        @if !info.keywords.is_empty() {
            meta name="keywords" content=(info.keywords_line());
        }
        meta name="generator" content={ "resume-press " (env!("CARGO_PKG_VERSION")) };
        meta name="build-version" content=(ctx.version);
        meta name="build-commit" content=(ctx.commit);
        meta name="build-timestamp" content=(ctx.timestamp);
        meta name="build-environment" content=(ctx.environment.to_string());
        meta name="build-mode" content=(ctx.mode.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildMode;
    use crate::imaging::Derivative;
    use crate::test_helpers::test_context;
    use std::collections::BTreeMap;

    fn asset(path: &str, edge: u32) -> Asset {
        Asset {
            path: path.to_string(),
            width: edge,
            height: edge,
            bytes: 100,
        }
    }

    fn derivative_set(with_avif: bool) -> ImageDerivativeSet {
        let derivatives: BTreeMap<SizeKey, Derivative> = SizeKey::ALL
            .iter()
            .map(|k| {
                let base = format!("assets/images/profile-{k}");
                (
                    *k,
                    Derivative {
                        png: asset(&format!("{base}.png"), k.edge()),
                        avif: with_avif.then(|| asset(&format!("{base}.avif"), k.edge())),
                    },
                )
            })
            .collect();
        ImageDerivativeSet {
            derivatives,
            source_dimensions: (800, 600),
            cache: Default::default(),
        }
    }

    fn info() -> DocumentInfo {
        DocumentInfo {
            title: "Ada - Résumé".into(),
            author: "Ada <Lovelace>".into(),
            subject: "Résumé".into(),
            keywords: vec!["Maths".into()],
        }
    }

    #[test]
    fn picture_lists_both_encodings() {
        let html = profile_picture(&derivative_set(true), "Ada").into_string();
        assert!(html.contains(r#"type="image/avif""#));
        assert!(html.contains("assets/images/profile-mobile.avif 120w"));
        assert!(html.contains("assets/images/profile-original.png 600w"));
        assert!(html.contains(r#"src="assets/images/profile-desktop.png""#));
        assert!(!html.contains("profile-thumbnail"));
    }

    #[test]
    fn picture_without_avif_has_png_source_only() {
        let html = profile_picture(&derivative_set(false), "Ada").into_string();
        assert!(!html.contains("image/avif"));
        assert!(html.contains("image/png"));
    }

    #[test]
    fn placeholder_is_inline_svg() {
        let html = placeholder_photo("Photo").into_string();
        assert!(html.contains("<svg"));
        assert!(html.contains("placeholder"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn qr_figure_references_both_images() {
        let qr = QrImages {
            url: "https://ada.dev".into(),
            modal: asset("assets/images/qr-modal.png", 120),
            print: asset("assets/images/qr-print.png", 80),
        };
        let html = qr_figure(&qr).into_string();
        assert!(html.contains("qr-modal.png"));
        assert!(html.contains("qr-print.png"));
        assert!(html.contains(r#"href="https://ada.dev""#));
    }

    #[test]
    fn fragments_without_qr_are_empty() {
        let ctx = test_context(BuildMode::Draft);
        let f = Fragments::render(None, None, &ctx, &info());
        assert!(f.qr.is_empty());
        assert!(f.photo.contains("placeholder"));
    }

    #[test]
    fn meta_is_escaped_and_carries_build_info() {
        let ctx = test_context(BuildMode::Production);
        let html = build_meta(&ctx, &info()).into_string();
        assert!(html.contains("Ada &lt;Lovelace&gt;"));
        assert!(html.contains(r#"name="build-commit" content="abcdef1""#));
        assert!(html.contains(r#"name="build-mode" content="production""#));
        assert!(html.contains(r#"name="build-environment" content="development""#));
    }
}
