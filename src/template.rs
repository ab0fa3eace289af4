//! Handlebars rendering of the résumé template.
//!
//! Rendering is a single pass over one typed context:
//!
//! | Key | Contents |
//! |---|---|
//! | `resume` | the profile document, unknown sections included |
//! | `build` | version, commit, environment, timestamp, mode, `is_draft`, url |
//! | `photo` | derivative set keyed by size, or `{ "placeholder": true }` |
//! | `qr` | QR image references; absent when there is no QR code |
//! | `meta` | title, author, subject, keywords derived from the profile |
//! | `fragments` | pre-rendered `photo`, `qr` and `meta` HTML |
//!
//! Helpers:
//!
//! - `json`: JSON-stringify a value: `{{json resume.skills}}`
//! - `eq`: strict equality, usable as a subexpression: `{{#if (eq build.mode "draft")}}`
//! - `markdown`: render a markdown string: `{{{markdown resume.basics.summary}}}`
//!
//! Strict mode is off: a missing value renders as an empty string.

use crate::context::BuildContext;
use crate::fragments::Fragments;
use crate::imaging::ImageDerivativeSet;
use crate::profile::{DocumentInfo, ProfileDocument};
use crate::qr::QrImages;
use handlebars::{Handlebars, handlebars_helper};
use pulldown_cmark::{Options, Parser, html as md_html};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TEMPLATE_NAME: &str = "resume";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template syntax error: {0}")]
    Syntax(#[from] handlebars::TemplateError),
    #[error("Template render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Derived assets available to one render.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderAssets<'a> {
    /// `None` means the placeholder graphic is used.
    pub photo: Option<&'a ImageDerivativeSet>,
    pub qr: Option<&'a QrImages>,
}

#[derive(Serialize)]
struct BuildVars<'a> {
    #[serde(flatten)]
    context: &'a BuildContext,
    is_draft: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PhotoVars<'a> {
    Derived(&'a ImageDerivativeSet),
    Placeholder { placeholder: bool },
}

#[derive(Serialize)]
struct MetaVars<'a> {
    #[serde(flatten)]
    info: &'a DocumentInfo,
    keywords_line: String,
}

#[derive(Serialize)]
struct RenderContext<'a> {
    resume: &'a ProfileDocument,
    build: BuildVars<'a>,
    photo: PhotoVars<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr: Option<&'a QrImages>,
    meta: MetaVars<'a>,
    fragments: Fragments,
}

/// Render markdown to HTML (CommonMark plus tables and strikethrough).
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(source, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

handlebars_helper!(json_helper: |v: Json| serde_json::to_string(v).unwrap_or_default());
handlebars_helper!(eq_helper: |a: Json, b: Json| a == b);
handlebars_helper!(markdown_helper: |v: Json| match v {
    Value::String(s) => render_markdown(s),
    _ => String::new(),
});

/// A registry with the résumé helpers installed and strict mode off.
pub fn registry() -> Handlebars<'static> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(false);
    hb.register_helper("json", Box::new(json_helper));
    hb.register_helper("eq", Box::new(eq_helper));
    hb.register_helper("markdown", Box::new(markdown_helper));
    hb
}

/// Read the template file.
pub fn load_template(path: &Path) -> Result<String, TemplateError> {
    if !path.is_file() {
        return Err(TemplateError::NotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Check template syntax without rendering.
pub fn check_template(source: &str) -> Result<(), TemplateError> {
    registry().register_template_string(TEMPLATE_NAME, source)?;
    Ok(())
}

/// Render the template against the profile, build context and assets.
pub fn render(
    profile: &ProfileDocument,
    template_source: &str,
    context: &BuildContext,
    assets: RenderAssets<'_>,
) -> Result<String, TemplateError> {
    let mut hb = registry();
    hb.register_template_string(TEMPLATE_NAME, template_source)?;

    let info = profile.document_info();
    let data = RenderContext {
        resume: profile,
        build: BuildVars {
            context,
            is_draft: context.is_draft(),
        },
        photo: match assets.photo {
            Some(set) => PhotoVars::Derived(set),
            None => PhotoVars::Placeholder { placeholder: true },
        },
        qr: assets.qr,
        fragments: Fragments::render(assets.photo, assets.qr, context, &info),
        meta: MetaVars {
            keywords_line: info.keywords_line(),
            info: &info,
        },
    };

    Ok(hb.render(TEMPLATE_NAME, &data)?)
}
