//! Variant print engine: `index.html` to three PDFs.
//!
//! Every variant walks the same states on a fresh page:
//!
//! ```text
//! idle → pageOpened → contentSettled → styleInjected → mediaEmulated → exported → closed
//! ```
//!
//! The page is closed whatever happened before. A failure is captured per
//! variant as a [`VariantFailure`] naming the state that failed; the other
//! variants still run. Exported bytes are post-processed ([`metadata`]) and
//! written to the output directory.
//!
//! The browser sits behind [`PrintBackend`] so the state machine can be
//! tested without Chromium. [`ChromeBackend`] is the production backend.
//!
//! The whole phase runs under one deadline, see [`run_pdf_phase`]. Once it
//! passes, the job's [`CancelToken`] stops the worker before its next state
//! and no PDF is committed to the output directory afterwards.

pub mod chrome;
pub mod metadata;
pub mod variant;

pub use chrome::ChromeBackend;
pub use variant::{VariantKind, VariantSpec};

use crate::config::Paper;
use crate::profile::DocumentInfo;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrintError {
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF post-processing failed: {0}")]
    PostProcess(String),
    #[error("Cannot build a file URL for {0}")]
    FileUrl(PathBuf),
    #[error("PDF phase cancelled")]
    Cancelled,
}

/// Cancellation shared between the PDF worker and the thread waiting on it.
///
/// PDFs are committed to the output directory under the token's lock, so once
/// [`cancel`](Self::cancel) returns no further PDF can appear.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<Mutex<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), PrintError> {
        if self.is_cancelled() {
            return Err(PrintError::Cancelled);
        }
        Ok(())
    }

    /// Run `commit` unless cancelled, holding the lock while it runs.
    fn commit(&self, commit: impl FnOnce() -> std::io::Result<()>) -> Result<(), PrintError> {
        let cancelled = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *cancelled {
            return Err(PrintError::Cancelled);
        }
        commit().map_err(PrintError::from)
    }
}

/// The state a variant was entering when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    PageOpened,
    ContentSettled,
    StyleInjected,
    MediaEmulated,
    Exported,
    PostProcessed,
    Written,
}

impl fmt::Display for PrintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrintStage::PageOpened => "page open",
            PrintStage::ContentSettled => "content settle",
            PrintStage::StyleInjected => "style injection",
            PrintStage::MediaEmulated => "print media emulation",
            PrintStage::Exported => "PDF export",
            PrintStage::PostProcessed => "PDF post-processing",
            PrintStage::Written => "PDF write",
        })
    }
}

#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct VariantFailure {
    pub stage: PrintStage,
    pub source: PrintError,
}

fn failed_at(stage: PrintStage) -> impl Fn(PrintError) -> VariantFailure {
    move |source| VariantFailure { stage, source }
}

/// Result of one variant: the written path, or where it failed.
#[derive(Debug)]
pub struct VariantOutcome {
    pub kind: VariantKind,
    pub result: Result<PathBuf, VariantFailure>,
}

impl VariantOutcome {
    pub fn is_written(&self) -> bool {
        self.result.is_ok()
    }
}

/// A headless browser able to print a page.
pub trait PrintBackend {
    type Page;

    /// Open `url` in a fresh page and wait for navigation. Then wait up to
    /// `image_wait` for an `<img>`; its absence is not an error.
    fn open_page(&self, url: &str, image_wait: Duration) -> Result<Self::Page, PrintError>;

    /// Install the readiness probe and wait for its marker.
    ///
    /// `Ok(false)` means the marker did not appear within `timeout`.
    fn await_ready(&self, page: &Self::Page, timeout: Duration) -> Result<bool, PrintError>;

    fn apply_variant(&self, page: &Self::Page, spec: &VariantSpec) -> Result<(), PrintError>;

    fn emulate_print_media(&self, page: &Self::Page) -> Result<(), PrintError>;

    fn export_pdf(
        &self,
        page: &Self::Page,
        spec: &VariantSpec,
        paper: Paper,
    ) -> Result<Vec<u8>, PrintError>;

    /// Close the page. Errors are logged, not returned.
    fn close_page(&self, page: Self::Page);
}

/// Everything the engine needs to print one document.
#[derive(Debug, Clone)]
pub struct PrintJob {
    /// Absolute path of the rendered `index.html`.
    pub index_path: PathBuf,
    pub output_dir: PathBuf,
    pub paper: Paper,
    pub settle_timeout: Duration,
    pub image_wait: Duration,
    /// Embedded into every PDF.
    pub info: DocumentInfo,
    pub cancel: CancelToken,
}

impl PrintJob {
    /// `file://` URL of the index page, percent-encoded.
    ///
    /// `index_path` must be absolute.
    pub fn url(&self) -> Result<String, PrintError> {
        url::Url::from_file_path(&self.index_path)
            .map(String::from)
            .map_err(|()| PrintError::FileUrl(self.index_path.clone()))
    }
}

/// Print one variant through every state.
pub fn print_variant<B: PrintBackend>(
    backend: &B,
    job: &PrintJob,
    spec: &VariantSpec,
) -> Result<PathBuf, VariantFailure> {
    let url = job
        .cancel
        .check()
        .and_then(|()| job.url())
        .map_err(failed_at(PrintStage::PageOpened))?;
    let page = backend
        .open_page(&url, job.image_wait)
        .map_err(failed_at(PrintStage::PageOpened))?;
    let exported = render_on_page(backend, &page, job, spec);
    backend.close_page(page);
    let pdf = exported?;

    let finalized = job
        .cancel
        .check()
        .and_then(|()| {
            metadata::finalize_pdf(&pdf, &job.info, spec.pdf.compress)
                .map_err(|e| PrintError::PostProcess(e.to_string()))
        })
        .map_err(failed_at(PrintStage::PostProcessed))?;

    let path = job.output_dir.join(spec.file_name);
    let partial = job.output_dir.join(format!(".{}.part", spec.file_name));
    fs::write(&partial, finalized)
        .map_err(PrintError::from)
        .and_then(|()| job.cancel.commit(|| fs::rename(&partial, &path)))
        .map_err(|e| {
            let _ = fs::remove_file(&partial);
            failed_at(PrintStage::Written)(e)
        })?;
    Ok(path)
}

fn render_on_page<B: PrintBackend>(
    backend: &B,
    page: &B::Page,
    job: &PrintJob,
    spec: &VariantSpec,
) -> Result<Vec<u8>, VariantFailure> {
    let proceed = |stage| job.cancel.check().map_err(failed_at(stage));

    proceed(PrintStage::ContentSettled)?;
    let ready = backend
        .await_ready(page, job.settle_timeout)
        .map_err(failed_at(PrintStage::ContentSettled))?;
    if !ready {
        log::warn!(
            "{}: page not settled after {}ms, printing anyway",
            spec.kind,
            job.settle_timeout.as_millis()
        );
    }
    proceed(PrintStage::StyleInjected)?;
    backend
        .apply_variant(page, spec)
        .map_err(failed_at(PrintStage::StyleInjected))?;
    proceed(PrintStage::MediaEmulated)?;
    backend
        .emulate_print_media(page)
        .map_err(failed_at(PrintStage::MediaEmulated))?;
    proceed(PrintStage::Exported)?;
    backend
        .export_pdf(page, spec, job.paper)
        .map_err(failed_at(PrintStage::Exported))
}

/// Print every variant in order, capturing each outcome.
///
/// Stops early once the job is cancelled.
pub fn print_all<B: PrintBackend>(backend: &B, job: &PrintJob) -> Vec<VariantOutcome> {
    VariantKind::ALL
        .iter()
        .take_while(|_| !job.cancel.is_cancelled())
        .map(|&kind| {
            let result = print_variant(backend, job, &kind.spec());
            match &result {
                Ok(path) => log::info!("Wrote {} PDF: {}", kind, path.display()),
                Err(e) => log::warn!("{kind} PDF not written: {e}"),
            }
            VariantOutcome { kind, result }
        })
        .collect()
}

#[derive(Debug)]
pub enum PdfPhaseOutcome {
    /// The phase finished; individual variants may still have failed.
    Completed(Vec<VariantOutcome>),
    /// The deadline passed first. The worker is cancelled and any PDF it
    /// already wrote is removed.
    TimedOut(Duration),
    /// The browser could not be launched, or the worker died.
    Failed(String),
}

/// Run the PDF phase on a worker thread, racing it against `deadline`.
///
/// `launch` runs on the worker so a browser that hangs while starting is
/// covered by the deadline too. On timeout the worker stops at its next state
/// check and drops the backend; it never commits a PDF after this returns.
pub fn run_pdf_phase<B, F>(launch: F, job: PrintJob, deadline: Duration) -> PdfPhaseOutcome
where
    B: PrintBackend + 'static,
    F: FnOnce() -> Result<B, PrintError> + Send + 'static,
{
    let cancel = job.cancel.clone();
    let output_dir = job.output_dir.clone();
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("pdf-phase".into())
        .spawn(move || {
            let result = launch().map(|backend| print_all(&backend, &job));
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        return PdfPhaseOutcome::Failed(format!("could not start PDF worker: {e}"));
    }

    match rx.recv_timeout(deadline) {
        Ok(Ok(outcomes)) => PdfPhaseOutcome::Completed(outcomes),
        Ok(Err(e)) => PdfPhaseOutcome::Failed(e.to_string()),
        Err(RecvTimeoutError::Timeout) => {
            cancel.cancel();
            match remove_stale_pdfs(&output_dir) {
                Ok(0) => {}
                Ok(n) => log::debug!("Removed {n} PDFs written before the deadline"),
                Err(e) => log::warn!("Could not remove partial PDF output: {e}"),
            }
            PdfPhaseOutcome::TimedOut(deadline)
        }
        Err(RecvTimeoutError::Disconnected) => {
            PdfPhaseOutcome::Failed("PDF worker exited without a result".into())
        }
    }
}

/// Delete PDFs left by an earlier build. Returns how many were removed.
pub fn remove_stale_pdfs(output_dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for kind in VariantKind::ALL {
        let path = output_dir.join(kind.spec().file_name);
        if path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Which of the three PDFs exist on disk, in variant order.
pub fn pdfs_on_disk(output_dir: &Path) -> Vec<(VariantKind, bool)> {
    VariantKind::ALL
        .iter()
        .map(|&kind| (kind, output_dir.join(kind.spec().file_name).is_file()))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call and prints the minimal test PDF.
    ///
    /// Pages are numbered in open order; page `n` belongs to
    /// `VariantKind::ALL[n % 3]`.
    #[derive(Default)]
    pub struct MockPrinter {
        pub fail: Option<(VariantKind, PrintStage)>,
        pub never_ready: bool,
        /// Time each export takes.
        pub export_delay: Duration,
        pub ops: Mutex<Vec<String>>,
        pub backgrounds: Mutex<Vec<(VariantKind, bool)>>,
        opened: Mutex<usize>,
    }

    impl MockPrinter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_at(kind: VariantKind, stage: PrintStage) -> Self {
            Self {
                fail: Some((kind, stage)),
                ..Self::default()
            }
        }

        pub fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn step(&self, kind: VariantKind, stage: PrintStage, op: &str) -> Result<(), PrintError> {
            self.ops.lock().unwrap().push(format!("{op}:{kind}"));
            if self.fail == Some((kind, stage)) {
                return Err(PrintError::Browser(format!("mock failure at {stage}")));
            }
            Ok(())
        }
    }

    impl PrintBackend for MockPrinter {
        type Page = VariantKind;

        fn open_page(&self, _url: &str, _image_wait: Duration) -> Result<VariantKind, PrintError> {
            let mut opened = self.opened.lock().unwrap();
            let kind = VariantKind::ALL[*opened % 3];
            *opened += 1;
            self.step(kind, PrintStage::PageOpened, "open")?;
            Ok(kind)
        }

        fn await_ready(&self, page: &VariantKind, _timeout: Duration) -> Result<bool, PrintError> {
            self.step(*page, PrintStage::ContentSettled, "ready")?;
            Ok(!self.never_ready)
        }

        fn apply_variant(&self, page: &VariantKind, spec: &VariantSpec) -> Result<(), PrintError> {
            assert_eq!(*page, spec.kind);
            self.step(*page, PrintStage::StyleInjected, "style")
        }

        fn emulate_print_media(&self, page: &VariantKind) -> Result<(), PrintError> {
            self.step(*page, PrintStage::MediaEmulated, "media")
        }

        fn export_pdf(
            &self,
            page: &VariantKind,
            spec: &VariantSpec,
            _paper: Paper,
        ) -> Result<Vec<u8>, PrintError> {
            thread::sleep(self.export_delay);
            self.step(*page, PrintStage::Exported, "export")?;
            self.backgrounds
                .lock()
                .unwrap()
                .push((spec.kind, spec.pdf.print_background));
            Ok(metadata::tests::minimal_pdf())
        }

        fn close_page(&self, page: VariantKind) {
            self.ops.lock().unwrap().push(format!("close:{page}"));
        }
    }

    /// A backend whose launch never finishes within any sane deadline.
    pub fn hanging_launch(delay: Duration) -> Result<MockPrinter, PrintError> {
        thread::sleep(delay);
        Ok(MockPrinter::new())
    }

    pub fn job(output_dir: &Path) -> PrintJob {
        PrintJob {
            index_path: output_dir.join("index.html"),
            output_dir: output_dir.to_path_buf(),
            paper: Paper::Letter,
            settle_timeout: Duration::from_millis(10),
            image_wait: Duration::from_millis(10),
            info: DocumentInfo {
                title: "Ada Lovelace - Résumé".into(),
                author: "Ada Lovelace".into(),
                subject: "Résumé".into(),
                keywords: vec![],
            },
            cancel: CancelToken::default(),
        }
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn all_variants_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter::new();
        let outcomes = print_all(&printer, &job(tmp.path()));

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(VariantOutcome::is_written));
        assert_eq!(
            pdfs_on_disk(tmp.path()),
            vec![
                (VariantKind::Screen, true),
                (VariantKind::Print, true),
                (VariantKind::Ats, true),
            ]
        );
    }

    #[test]
    fn states_run_in_order_per_variant() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter::new();
        print_all(&printer, &job(tmp.path()));

        let ops = printer.ops();
        assert_eq!(
            &ops[..6],
            &[
                "open:screen",
                "ready:screen",
                "style:screen",
                "media:screen",
                "export:screen",
                "close:screen",
            ]
        );
        assert_eq!(ops.len(), 18);
    }

    #[test]
    fn ats_exported_without_background() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter::new();
        print_all(&printer, &job(tmp.path()));

        let backgrounds = printer.backgrounds.lock().unwrap().clone();
        assert_eq!(
            backgrounds,
            vec![
                (VariantKind::Screen, true),
                (VariantKind::Print, true),
                (VariantKind::Ats, false),
            ]
        );
    }

    #[test]
    fn failure_is_isolated_and_page_still_closed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter::failing_at(VariantKind::Print, PrintStage::StyleInjected);
        let outcomes = print_all(&printer, &job(tmp.path()));

        let print = &outcomes[1];
        let err = print.result.as_ref().unwrap_err();
        assert_eq!(err.stage, PrintStage::StyleInjected);
        assert!(err.to_string().starts_with("style injection failed"));

        assert!(outcomes[0].is_written());
        assert!(outcomes[2].is_written());
        assert!(!tmp.path().join("resume-print.pdf").exists());

        let ops = printer.ops();
        assert!(ops.contains(&"close:print".to_string()));
        assert!(!ops.contains(&"media:print".to_string()));
    }

    #[test]
    fn open_failure_skips_close() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter::failing_at(VariantKind::Screen, PrintStage::PageOpened);
        let outcomes = print_all(&printer, &job(tmp.path()));

        assert_eq!(
            outcomes[0].result.as_ref().unwrap_err().stage,
            PrintStage::PageOpened
        );
        assert!(!printer.ops().contains(&"close:screen".to_string()));
        assert!(outcomes[1].is_written());
    }

    #[test]
    fn unsettled_page_still_prints() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter {
            never_ready: true,
            ..MockPrinter::default()
        };
        let outcomes = print_all(&printer, &job(tmp.path()));
        assert!(outcomes.iter().all(VariantOutcome::is_written));
    }

    #[test]
    fn written_pdfs_carry_document_info() {
        let tmp = tempfile::TempDir::new().unwrap();
        print_all(&MockPrinter::new(), &job(tmp.path()));

        let doc = lopdf::Document::load(tmp.path().join("resume-ats.pdf")).unwrap();
        let id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(id).unwrap().as_dict().unwrap();
        assert_eq!(info.get(b"Author").unwrap().as_str().unwrap(), b"Ada Lovelace");
    }

    #[test]
    fn phase_completes_within_deadline() {
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome = run_pdf_phase(
            || Ok(MockPrinter::new()),
            job(tmp.path()),
            Duration::from_secs(30),
        );
        match outcome {
            PdfPhaseOutcome::Completed(outcomes) => assert_eq!(outcomes.len(), 3),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn hanging_phase_times_out_without_pdfs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome = run_pdf_phase(
            || hanging_launch(Duration::from_secs(5)),
            job(tmp.path()),
            Duration::from_millis(50),
        );
        assert!(matches!(outcome, PdfPhaseOutcome::TimedOut(_)));
        assert!(pdfs_on_disk(tmp.path()).iter().all(|(_, exists)| !exists));
    }

    #[test]
    fn timed_out_worker_never_writes_pdfs_later() {
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome = run_pdf_phase(
            || {
                thread::sleep(Duration::from_millis(200));
                Ok(MockPrinter::new())
            },
            job(tmp.path()),
            Duration::from_millis(50),
        );
        assert!(matches!(outcome, PdfPhaseOutcome::TimedOut(_)));

        // Well past the point where the worker would have finished
        thread::sleep(Duration::from_millis(600));
        assert!(files_in(tmp.path()).is_empty());
    }

    #[test]
    fn pdfs_written_before_the_deadline_are_removed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome = run_pdf_phase(
            || {
                Ok(MockPrinter {
                    export_delay: Duration::from_millis(100),
                    ..MockPrinter::default()
                })
            },
            job(tmp.path()),
            Duration::from_millis(150),
        );
        assert!(matches!(outcome, PdfPhaseOutcome::TimedOut(_)));
        assert!(pdfs_on_disk(tmp.path()).iter().all(|(_, exists)| !exists));

        thread::sleep(Duration::from_millis(600));
        assert!(files_in(tmp.path()).is_empty());
    }

    #[test]
    fn cancelled_job_opens_no_pages() {
        let tmp = tempfile::TempDir::new().unwrap();
        let printer = MockPrinter::new();
        let job = job(tmp.path());
        job.cancel.cancel();

        let err = print_variant(&printer, &job, &VariantKind::Screen.spec()).unwrap_err();
        assert_eq!(err.stage, PrintStage::PageOpened);
        assert!(matches!(err.source, PrintError::Cancelled));
        assert!(printer.ops().is_empty());
        assert!(print_all(&printer, &job).is_empty());
    }

    #[test]
    fn written_pdf_leaves_no_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        print_variant(&MockPrinter::new(), &job(tmp.path()), &VariantKind::Ats.spec()).unwrap();
        assert_eq!(files_in(tmp.path()), vec!["resume-ats.pdf"]);
    }

    #[test]
    fn launch_failure_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let outcome = run_pdf_phase(
            || -> Result<MockPrinter, PrintError> {
                Err(PrintError::Browser("no chromium".into()))
            },
            job(tmp.path()),
            Duration::from_secs(5),
        );
        match outcome {
            PdfPhaseOutcome::Failed(msg) => assert!(msg.contains("no chromium")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn remove_stale_pdfs_only_touches_variants() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("resume.pdf"), b"old").unwrap();
        fs::write(tmp.path().join("resume-ats.pdf"), b"old").unwrap();
        fs::write(tmp.path().join("other.pdf"), b"keep").unwrap();

        assert_eq!(remove_stale_pdfs(tmp.path()).unwrap(), 2);
        assert!(tmp.path().join("other.pdf").exists());
        assert!(pdfs_on_disk(tmp.path()).iter().all(|(_, exists)| !exists));
    }

    #[test]
    fn job_url_is_file_scheme() {
        let job = job(Path::new("/srv/dist"));
        assert_eq!(job.url().unwrap(), "file:///srv/dist/index.html");
    }

    #[test]
    fn job_url_escapes_reserved_characters() {
        let job = job(Path::new("/srv/cv #2/100%?draft"));
        assert_eq!(
            job.url().unwrap(),
            "file:///srv/cv%20%232/100%25%3Fdraft/index.html"
        );
    }

    #[test]
    fn relative_index_path_has_no_url() {
        let job = job(Path::new("dist"));
        assert!(matches!(job.url(), Err(PrintError::FileUrl(_))));
    }
}
