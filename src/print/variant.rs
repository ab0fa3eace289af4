//! The three PDF variants, as data.
//!
//! Each [`VariantKind`] maps to one [`VariantSpec`]: output file name, CSS
//! appended to the page, DOM rules run before printing, and the
//! `Page.printToPDF` options. The print engine has a single code path that
//! consumes a spec; adding a variant means adding a spec, not a branch.
//!
//! | Variant | File | Background | Margins (in) | Compressed |
//! |---|---|---|---|---|
//! | `screen` | `resume.pdf` | yes | 0.5 | yes |
//! | `print` | `resume-print.pdf` | yes | 0.3 | no |
//! | `ats` | `resume-ats.pdf` | no | 0.75 | yes |

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Screen,
    Print,
    Ats,
}

impl VariantKind {
    pub const ALL: [VariantKind; 3] = [VariantKind::Screen, VariantKind::Print, VariantKind::Ats];

    pub fn name(self) -> &'static str {
        match self {
            VariantKind::Screen => "screen",
            VariantKind::Print => "print",
            VariantKind::Ats => "ats",
        }
    }

    pub fn spec(self) -> VariantSpec {
        match self {
            VariantKind::Screen => VariantSpec {
                kind: self,
                file_name: "resume.pdf",
                css: SCREEN_CSS,
                dom: DomRules {
                    remove: PAGINATION_CONTROLS,
                    reveal: COLLAPSED_CONTENT,
                },
                pdf: PdfOptions {
                    print_background: true,
                    margins: Margins::uniform(0.5),
                    compress: true,
                },
            },
            VariantKind::Print => VariantSpec {
                kind: self,
                file_name: "resume-print.pdf",
                css: PRINT_CSS,
                dom: DomRules {
                    remove: APP_CHROME,
                    reveal: COLLAPSED_CONTENT,
                },
                pdf: PdfOptions {
                    print_background: true,
                    margins: Margins::uniform(0.3),
                    compress: false,
                },
            },
            VariantKind::Ats => VariantSpec {
                kind: self,
                file_name: "resume-ats.pdf",
                css: ATS_CSS,
                dom: DomRules {
                    remove: ATS_REMOVE,
                    reveal: COLLAPSED_CONTENT,
                },
                pdf: PdfOptions {
                    print_background: false,
                    margins: Margins::uniform(0.75),
                    compress: true,
                },
            },
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub const fn uniform(inches: f64) -> Self {
        Self {
            top: inches,
            right: inches,
            bottom: inches,
            left: inches,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfOptions {
    pub print_background: bool,
    pub margins: Margins,
    /// Recompress content streams after export.
    pub compress: bool,
}

/// Selectors acted on before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRules {
    /// Elements removed from the DOM.
    pub remove: &'static [&'static str],
    /// Elements made visible: `hidden` dropped, `<details>` opened.
    pub reveal: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantSpec {
    pub kind: VariantKind,
    pub file_name: &'static str,
    pub css: &'static str,
    pub dom: DomRules,
    pub pdf: PdfOptions,
}

impl VariantSpec {
    /// JavaScript that applies the DOM rules, tags `<html>` with
    /// `data-variant` and appends the variant CSS.
    pub fn injection_script(&self) -> String {
        // serde_json output is a valid JS literal
        let remove = serde_json::to_string(self.dom.remove).unwrap_or_else(|_| "[]".into());
        let reveal = serde_json::to_string(self.dom.reveal).unwrap_or_else(|_| "[]".into());
        let css = serde_json::to_string(self.css).unwrap_or_else(|_| "\"\"".into());
        let name = self.kind.name();
        format!(
            r#"(() => {{
  const remove = {remove};
  const reveal = {reveal};
  for (const sel of remove) document.querySelectorAll(sel).forEach(el => el.remove());
  for (const sel of reveal) document.querySelectorAll(sel).forEach(el => {{
    el.removeAttribute('hidden');
    el.classList.remove('collapsed', 'is-hidden');
    if (el.tagName === 'DETAILS') el.open = true;
  }});
  document.documentElement.setAttribute('data-variant', '{name}');
  const style = document.createElement('style');
  style.setAttribute('data-variant-style', '{name}');
  style.textContent = {css};
  document.head.appendChild(style);
  return true;
}})()"#
        )
    }
}

/// Script that sets `data-render-ready="true"` on `<html>` once fonts are
/// loaded and every image has decoded (or failed).
pub const READINESS_PROBE: &str = r#"(() => {
  const root = document.documentElement;
  if (root.hasAttribute('data-render-ready')) return true;
  const images = Array.from(document.images).map(img =>
    img.complete
      ? (img.decode ? img.decode().catch(() => {}) : Promise.resolve())
      : new Promise(done => {
          img.addEventListener('load', done, { once: true });
          img.addEventListener('error', done, { once: true });
        }));
  const fonts = document.fonts ? document.fonts.ready : Promise.resolve();
  Promise.all([fonts, ...images]).then(() => root.setAttribute('data-render-ready', 'true'));
  return true;
})()"#;

/// Selector the engine polls for after installing [`READINESS_PROBE`].
pub const READY_SELECTOR: &str = r#"html[data-render-ready="true"]"#;

const PAGINATION_CONTROLS: &[&str] = &[".pagination", ".pager", "[data-pagination]", ".load-more"];

const COLLAPSED_CONTENT: &[&str] = &[
    "details",
    "[hidden]",
    ".collapsed",
    ".is-hidden",
    "[data-page]",
];

const APP_CHROME: &[&str] = &[
    ".pagination",
    ".pager",
    "[data-pagination]",
    ".load-more",
    ".theme-toggle",
    ".no-print",
    ".toolbar",
    "dialog",
    ".modal",
    "button",
];

const ATS_REMOVE: &[&str] = &[
    ".pagination",
    ".pager",
    "[data-pagination]",
    ".load-more",
    ".theme-toggle",
    ".no-print",
    ".toolbar",
    "dialog",
    ".modal",
    "button",
    ".profile-photo",
    ".qr-code",
    "picture",
    "img",
    "svg",
    "video",
    "canvas",
];

const SCREEN_CSS: &str = r#"
:root { color-scheme: light !important; }
html, body { background: #ffffff !important; color: #1a1a1a !important; }
.pagination, .pager, [data-pagination], .load-more { display: none !important; }
[data-page], .collapsed, .is-hidden { display: revert !important; }
.qr-print { display: none !important; }
"#;

const PRINT_CSS: &str = r#"
* { -webkit-print-color-adjust: exact !important; print-color-adjust: exact !important; }
:root { color-scheme: light !important; }
.theme-toggle, .no-print, .toolbar, dialog, .modal, button { display: none !important; }
[data-page], .collapsed, .is-hidden { display: revert !important; }
.qr-modal { display: none !important; }
.qr-print { display: block !important; }
section, article, .entry { break-inside: avoid; }
"#;

const ATS_CSS: &str = r#"
*, *::before, *::after {
  color: #000000 !important;
  background: #ffffff !important;
  box-shadow: none !important;
  text-shadow: none !important;
  border-color: #000000 !important;
}
html, body {
  font-family: Georgia, "Times New Roman", serif !important;
  font-size: 11pt !important;
  line-height: 1.4 !important;
}
body, main, header, aside, section, .layout, .columns, .grid, .sidebar {
  display: block !important;
  float: none !important;
  width: auto !important;
  max-width: none !important;
  columns: auto !important;
  grid-template-columns: none !important;
}
img, picture, svg, video, canvas, .profile-photo, .qr-code { display: none !important; }
a { color: #000000 !important; text-decoration: none !important; }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ats_has_no_background_others_do() {
        assert!(!VariantKind::Ats.spec().pdf.print_background);
        assert!(VariantKind::Screen.spec().pdf.print_background);
        assert!(VariantKind::Print.spec().pdf.print_background);
    }

    #[test]
    fn file_names_are_distinct() {
        let names: Vec<&str> = VariantKind::ALL.iter().map(|k| k.spec().file_name).collect();
        assert_eq!(names, vec!["resume.pdf", "resume-print.pdf", "resume-ats.pdf"]);
    }

    #[test]
    fn print_margins_are_tightest() {
        let margin = |k: VariantKind| k.spec().pdf.margins.top;
        assert!(margin(VariantKind::Print) < margin(VariantKind::Screen));
        assert!(margin(VariantKind::Screen) < margin(VariantKind::Ats));
    }

    #[test]
    fn compression_flags() {
        assert!(VariantKind::Screen.spec().pdf.compress);
        assert!(!VariantKind::Print.spec().pdf.compress);
        assert!(VariantKind::Ats.spec().pdf.compress);
    }

    #[test]
    fn ats_removes_photo_and_qr() {
        let remove = VariantKind::Ats.spec().dom.remove;
        for sel in [".profile-photo", ".qr-code", "img"] {
            assert!(remove.contains(&sel), "{sel}");
        }
        assert!(ATS_CSS.contains("serif"));
    }

    #[test]
    fn screen_keeps_photo_and_qr() {
        let remove = VariantKind::Screen.spec().dom.remove;
        assert!(!remove.contains(&".profile-photo"));
        assert!(!remove.contains(&".qr-code"));
        assert!(remove.contains(&".pagination"));
    }

    #[test]
    fn print_keeps_photo_hides_controls() {
        let spec = VariantKind::Print.spec();
        assert!(!spec.dom.remove.contains(&".profile-photo"));
        assert!(spec.dom.remove.contains(&"button"));
        assert!(spec.css.contains("print-color-adjust: exact"));
    }

    #[test]
    fn injection_script_embeds_rules() {
        let script = VariantKind::Ats.spec().injection_script();
        assert!(script.contains(r#"".profile-photo""#));
        assert!(script.contains("data-variant', 'ats'"));
        assert!(script.contains("el.open = true"));
        // CSS is embedded as an escaped string literal
        assert!(script.contains(r#"\"Times New Roman\""#));
    }
}
