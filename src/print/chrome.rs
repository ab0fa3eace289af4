//! Headless Chromium backend over the DevTools protocol.

use super::variant::{READINESS_PROBE, READY_SELECTOR};
use super::{PrintBackend, PrintError, VariantSpec};
use crate::config::{Paper, PdfConfig};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

const WINDOW_SIZE: (u32, u32) = (1280, 1024);

fn browser_error(e: impl Display) -> PrintError {
    PrintError::Browser(e.to_string())
}

/// One Chromium process; each variant gets its own tab.
///
/// The process exits when the backend is dropped.
pub struct ChromeBackend {
    browser: Browser,
}

impl ChromeBackend {
    pub fn launch(config: &PdfConfig) -> Result<Self, PrintError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some(WINDOW_SIZE))
            .idle_browser_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(browser_error)?;
        let browser = Browser::new(options).map_err(browser_error)?;
        log::debug!("Launched headless Chromium");
        Ok(Self { browser })
    }
}

impl PrintBackend for ChromeBackend {
    type Page = Arc<Tab>;

    fn open_page(&self, url: &str, image_wait: Duration) -> Result<Arc<Tab>, PrintError> {
        let tab = self.browser.new_tab().map_err(browser_error)?;
        let navigated = tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ());
        if let Err(e) = navigated {
            let _ = tab.close(false);
            return Err(browser_error(e));
        }
        if tab
            .wait_for_element_with_custom_timeout("img", image_wait)
            .is_err()
        {
            log::debug!("No <img> within {}ms, continuing", image_wait.as_millis());
        }
        Ok(tab)
    }

    fn await_ready(&self, page: &Arc<Tab>, timeout: Duration) -> Result<bool, PrintError> {
        page.evaluate(READINESS_PROBE, false).map_err(browser_error)?;
        Ok(page
            .wait_for_element_with_custom_timeout(READY_SELECTOR, timeout)
            .is_ok())
    }

    fn apply_variant(&self, page: &Arc<Tab>, spec: &VariantSpec) -> Result<(), PrintError> {
        page.evaluate(&spec.injection_script(), false)
            .map_err(browser_error)?;
        Ok(())
    }

    fn emulate_print_media(&self, page: &Arc<Tab>) -> Result<(), PrintError> {
        page.call_method(Emulation::SetEmulatedMedia {
            media: Some("print".to_string()),
            features: None,
        })
        .map_err(browser_error)?;
        Ok(())
    }

    fn export_pdf(
        &self,
        page: &Arc<Tab>,
        spec: &VariantSpec,
        paper: Paper,
    ) -> Result<Vec<u8>, PrintError> {
        let (width, height) = paper.inches();
        let margins = spec.pdf.margins;
        page.print_to_pdf(Some(PrintToPdfOptions {
            landscape: Some(false),
            display_header_footer: Some(false),
            print_background: Some(spec.pdf.print_background),
            paper_width: Some(width),
            paper_height: Some(height),
            margin_top: Some(margins.top),
            margin_bottom: Some(margins.bottom),
            margin_left: Some(margins.left),
            margin_right: Some(margins.right),
            prefer_css_page_size: Some(false),
            ..Default::default()
        }))
        .map_err(browser_error)
    }

    fn close_page(&self, page: Arc<Tab>) {
        if let Err(e) = page.close(false) {
            log::debug!("Closing tab failed: {e}");
        }
    }
}
