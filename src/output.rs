//! CLI output formatting.
//!
//! Reports are **artifact-centric**: each line names something the build
//! produced (or chose not to), with its details indented underneath.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Document → dist/index.html (14.2 KB)
//!     Static: 3 files
//!     Photo: 4 sizes from 800×600 (6 cached, 2 encoded (8 total))
//!     QR: https://ada.dev → assets/images/qr-modal.png, assets/images/qr-print.png
//!
//! PDFs
//!     ✅ screen  resume.pdf
//!     ✅ print   resume-print.pdf
//!     ❌ ats     resume-ats.pdf: PDF export failed: Browser error: ...
//!
//! Built index.html and 2 of 3 PDFs
//! ```
//!
//! ## Context
//!
//! ```text
//! Version:     1.4.0
//! Commit:      abcdef1
//! Environment: preview
//! Mode:        production
//! Timestamp:   2024-01-01T00:00:00Z
//! CI:          yes
//! QR URL:      https://deploy-preview-12--ada.netlify.app (preview-deploy)
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function returning `Vec<String>` and a
//! `print_*` wrapper that writes to stdout. Format functions do no I/O.

use crate::context::BuildContext;
use crate::imaging::ImageDerivativeSet;
use crate::pipeline::{BuildReport, CheckItem, CheckStatus};
use crate::print::{PdfPhaseOutcome, VariantKind, VariantOutcome};
use crate::qr::QrImages;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{b} B"),
    }
}

fn status_marker(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Ok => "✅",
        CheckStatus::Warning => "⚠️",
        CheckStatus::Error => "❌",
    }
}

// ============================================================================
// Images and QR
// ============================================================================

pub fn format_image_set(set: &ImageDerivativeSet) -> Vec<String> {
    let (w, h) = set.source_dimensions;
    let mut lines = vec![format!(
        "Photo: {} sizes from {w}×{h} ({})",
        set.derivatives.len(),
        set.cache
    )];
    for (key, derivative) in &set.derivatives {
        let mut files = vec![derivative.png.path.as_str()];
        if let Some(avif) = &derivative.avif {
            files.push(avif.path.as_str());
        }
        lines.push(format!(
            "{}{:<10}{}×{}  {}",
            indent(1),
            key.name(),
            derivative.png.width,
            derivative.png.height,
            files.join(", ")
        ));
    }
    lines
}

pub fn print_image_set(set: &ImageDerivativeSet) {
    for line in format_image_set(set) {
        println!("{line}");
    }
}

pub fn format_qr(qr: &QrImages) -> Vec<String> {
    vec![
        format!("QR: {}", qr.url),
        format!("{}modal  {}×{}  {}", indent(1), qr.modal.width, qr.modal.height, qr.modal.path),
        format!("{}print  {}×{}  {}", indent(1), qr.print.width, qr.print.height, qr.print.path),
    ]
}

pub fn print_qr(qr: &QrImages) {
    for line in format_qr(qr) {
        println!("{line}");
    }
}

// ============================================================================
// Build report
// ============================================================================

fn outcome_line(outcome: &VariantOutcome) -> String {
    let file = outcome.kind.spec().file_name;
    match &outcome.result {
        Ok(_) => format!("{}✅ {:<7} {file}", indent(1), outcome.kind.name()),
        Err(e) => format!("{}❌ {:<7} {file}: {e}", indent(1), outcome.kind.name()),
    }
}

fn presence_line(kind: VariantKind, exists: bool) -> String {
    let marker = if exists { "✅" } else { "⚠️" };
    let note = if exists { "" } else { " (not written)" };
    format!(
        "{}{marker} {:<7} {}{note}",
        indent(1),
        kind.name(),
        kind.spec().file_name
    )
}

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let doc = &report.document;
    let mut lines = vec![format!(
        "Document → {} ({})",
        doc.index_path.display(),
        format_bytes(doc.bytes as u64)
    )];
    lines.push(format!("{}Static: {} files", indent(1), doc.static_files));

    match &doc.images {
        Some(set) => {
            let (w, h) = set.source_dimensions;
            lines.push(format!(
                "{}Photo: {} sizes from {w}×{h} ({})",
                indent(1),
                set.derivatives.len(),
                set.cache
            ));
        }
        None => lines.push(format!("{}Photo: placeholder", indent(1))),
    }
    match &doc.qr {
        Some(qr) => lines.push(format!(
            "{}QR: {} → {}, {}",
            indent(1),
            qr.url,
            qr.modal.path,
            qr.print.path
        )),
        None => lines.push(format!("{}QR: none", indent(1))),
    }

    lines.push(String::new());
    lines.push("PDFs".to_string());
    match &report.pdf_phase {
        None => lines.push(format!("{}skipped (draft)", indent(1))),
        Some(PdfPhaseOutcome::Completed(outcomes)) => {
            lines.extend(outcomes.iter().map(outcome_line));
        }
        Some(PdfPhaseOutcome::TimedOut(deadline)) => {
            lines.push(format!(
                "{}⚠️ timed out after {}s",
                indent(1),
                deadline.as_secs()
            ));
            lines.extend(report.pdfs.iter().map(|&(k, e)| presence_line(k, e)));
        }
        Some(PdfPhaseOutcome::Failed(reason)) => {
            lines.push(format!("{}⚠️ {reason}", indent(1)));
            lines.extend(report.pdfs.iter().map(|&(k, e)| presence_line(k, e)));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Built index.html and {} of {} PDFs",
        report.pdf_count(),
        VariantKind::ALL.len()
    ));
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Context and check
// ============================================================================

pub fn format_context(ctx: &BuildContext) -> Vec<String> {
    vec![
        format!("Version:     {}", ctx.version),
        format!("Commit:      {}", ctx.commit),
        format!("Environment: {}", ctx.environment),
        format!("Mode:        {}", ctx.mode),
        format!("Timestamp:   {}", ctx.timestamp),
        format!("CI:          {}", if ctx.ci { "yes" } else { "no" }),
        format!("QR URL:      {} ({})", ctx.url, ctx.url_rule),
    ]
}

pub fn print_context(ctx: &BuildContext) {
    for line in format_context(ctx) {
        println!("{line}");
    }
}

pub fn format_check(items: &[CheckItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{} {:<9}{}",
                status_marker(item.status),
                item.name,
                item.detail
            )
        })
        .collect()
}

pub fn print_check(items: &[CheckItem]) {
    for line in format_check(items) {
        println!("{line}");
    }
}

// ============================================================================
// Tests
// ============================================================================
