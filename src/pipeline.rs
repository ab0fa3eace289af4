//! Build orchestration.
//!
//! ```text
//! start → templateAssembled → htmlGenerated → (draft: stop)
//!                                           → (production: pdfPhase → report)
//! ```
//!
//! Missing or invalid inputs (config, profile document, template) abort the
//! build. Everything after `index.html` exists is best-effort: a PDF phase
//! that fails or overruns its deadline leaves an HTML-only build, which is
//! still a success. The [`BuildReport`] says which PDFs made it to disk.

use crate::config::{CONFIG_FILENAME, ConfigError, PathsConfig, ResumeConfig, load_config};
use crate::context::{BuildContext, BuildMode, EnvSnapshot};
use crate::generate::{GenerateError, GenerateOptions, GeneratedDocument, generate_document_with};
use crate::imaging::{DeriveOptions, ImageBackend, RustBackend};
use crate::print::{
    self, CancelToken, ChromeBackend, PdfPhaseOutcome, PrintBackend, PrintError, PrintJob,
    VariantKind, run_pdf_phase,
};
use crate::profile::{ProfileError, load_profile};
use crate::template;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A project root with its resolved configuration.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    /// Config file that was read, `None` when running on stock defaults.
    pub config_file: Option<PathBuf>,
    pub config: ResumeConfig,
    /// Config paths joined onto `root`.
    pub paths: PathsConfig,
}

/// Load `resume.toml` (or `config_path`) for `root` and resolve paths.
///
/// `output` overrides `paths.output`; relative overrides are taken as-is,
/// not joined onto the root.
pub fn load_project(
    root: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<Project, ConfigError> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILENAME));
    let config = load_config(&config_path)?;
    let mut paths = config.paths.resolve(root);
    if let Some(output) = output {
        paths.output = output.to_path_buf();
    }
    Ok(Project {
        root: root.to_path_buf(),
        config_file: config_path.is_file().then_some(config_path),
        config,
        paths,
    })
}

impl Project {
    /// Resolve the build context from `env` with this project's settings.
    pub fn context(&self, env: &EnvSnapshot, mode: BuildMode) -> BuildContext {
        BuildContext::resolve(
            env,
            mode,
            self.config.site.version.as_deref(),
            self.config.site.dev_port,
        )
    }

    pub fn derive_options(&self, mode: BuildMode, use_cache: bool) -> DeriveOptions {
        DeriveOptions::from_config(&self.config.images, mode.is_draft(), use_cache)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub mode: BuildMode,
    pub use_cache: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::Production,
            use_cache: true,
        }
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub context: BuildContext,
    pub document: GeneratedDocument,
    /// `None` for draft builds.
    pub pdf_phase: Option<PdfPhaseOutcome>,
    /// Which PDFs exist on disk after the build, in variant order.
    pub pdfs: Vec<(VariantKind, bool)>,
}

impl BuildReport {
    pub fn pdf_count(&self) -> usize {
        self.pdfs.iter().filter(|(_, exists)| *exists).count()
    }
}

/// Run a full build with the real environment, image backend and Chromium.
pub fn build(project: &Project, options: BuildOptions) -> Result<BuildReport, BuildError> {
    let pdf_config = project.config.pdf.clone();
    build_with(
        project,
        options,
        &EnvSnapshot::capture(),
        &RustBackend::new(),
        move || ChromeBackend::launch(&pdf_config),
    )
}

/// [`build`] with every external dependency injected.
pub fn build_with<B, F>(
    project: &Project,
    options: BuildOptions,
    env: &EnvSnapshot,
    images: &impl ImageBackend,
    launch_printer: F,
) -> Result<BuildReport, BuildError>
where
    B: PrintBackend + 'static,
    F: FnOnce() -> Result<B, PrintError> + Send + 'static,
{
    let paths = &project.paths;
    let context = project.context(env, options.mode);
    log::info!(
        "Building {} ({} mode, {} environment)",
        paths.data.display(),
        context.mode,
        context.environment
    );

    let profile = load_profile(&paths.data)?;
    let generate_options = GenerateOptions {
        output_dir: paths.output.clone(),
        photo: paths.photo.clone(),
        static_dir: Some(paths.static_dir.clone()),
        images: project.derive_options(options.mode, options.use_cache),
        qr: project.config.qr.clone(),
    };
    let document =
        generate_document_with(images, &profile, &paths.template, &context, &generate_options)?;

    let removed = print::remove_stale_pdfs(&paths.output)?;
    if removed > 0 {
        log::debug!("Removed {removed} PDFs from an earlier build");
    }

    let pdf_phase = if context.is_draft() {
        log::info!("Draft build: skipping PDF export");
        None
    } else {
        let pdf = &project.config.pdf;
        let job = PrintJob {
            index_path: fs::canonicalize(&document.index_path)?,
            output_dir: paths.output.clone(),
            paper: pdf.paper,
            settle_timeout: Duration::from_millis(pdf.settle_timeout_ms),
            image_wait: Duration::from_millis(pdf.image_wait_ms),
            info: profile.document_info(),
            cancel: CancelToken::default(),
        };
        let outcome = run_pdf_phase(launch_printer, job, Duration::from_secs(pdf.timeout_secs));
        match &outcome {
            PdfPhaseOutcome::Completed(_) => {}
            PdfPhaseOutcome::TimedOut(deadline) => log::warn!(
                "PDF export exceeded {}s; continuing with HTML only",
                deadline.as_secs()
            ),
            PdfPhaseOutcome::Failed(reason) => {
                log::warn!("PDF export unavailable: {reason}; continuing with HTML only")
            }
        }
        Some(outcome)
    };

    Ok(BuildReport {
        pdfs: print::pdfs_on_disk(&paths.output),
        context,
        document,
        pdf_phase,
    })
}

// ============================================================================
// Check
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

/// One line of `check` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckItem {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

/// Validate the project's inputs without writing anything.
pub fn check_project(project: &Project, images: &impl ImageBackend) -> Vec<CheckItem> {
    let paths = &project.paths;
    let mut items = vec![CheckItem::new(
        "config",
        CheckStatus::Ok,
        match &project.config_file {
            Some(path) => path.display().to_string(),
            None => "stock defaults".to_string(),
        },
    )];

    items.push(match load_profile(&paths.data) {
        Ok(profile) => CheckItem::new(
            "profile",
            CheckStatus::Ok,
            format!(
                "{}: {} work, {} education, {} skills",
                profile.basics.name,
                profile.work.len(),
                profile.education.len(),
                profile.skills.len()
            ),
        ),
        Err(e) => CheckItem::new("profile", CheckStatus::Error, e.to_string()),
    });

    let template = template::load_template(&paths.template)
        .and_then(|source| template::check_template(&source));
    items.push(match template {
        Ok(()) => CheckItem::new("template", CheckStatus::Ok, paths.template.display().to_string()),
        Err(e) => CheckItem::new("template", CheckStatus::Error, e.to_string()),
    });

    items.push(if !paths.photo.is_file() {
        CheckItem::new(
            "photo",
            CheckStatus::Warning,
            format!("{} not found; placeholder will be used", paths.photo.display()),
        )
    } else {
        match images.identify(&paths.photo) {
            Ok(dims) => CheckItem::new(
                "photo",
                CheckStatus::Ok,
                format!("{}×{}", dims.width, dims.height),
            ),
            Err(e) => CheckItem::new(
                "photo",
                CheckStatus::Warning,
                format!("{e}; placeholder will be used"),
            ),
        }
    });

    items
}

// ============================================================================
// Tests
// ============================================================================
