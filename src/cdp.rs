//! Chrome DevTools Protocol driver implementation

use crate::driver::{BrowserDriver, BrowserSession, ClipRegion, DiagramPage, PaperSize, ViewportSize};
use crate::viewer::dispatch_expression;
use crate::{ConverterConfig, Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Launches headless Chrome through the `headless_chrome` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpDriver;

impl CdpDriver {
    pub fn new() -> Self {
        CdpDriver
    }
}

/// A running Chrome process
pub struct CdpSession {
    browser: Browser,
    timeout: Duration,
}

/// One Chrome tab
pub struct CdpPage {
    tab: Arc<Tab>,
}

impl BrowserDriver for CdpDriver {
    type Session = CdpSession;

    fn launch(&self, config: &ConverterConfig) -> Result<CdpSession> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.browser_path.clone())
            .window_size(Some((config.window.width, config.window.height)))
            // Chrome is shut down after this long without protocol events.
            .idle_browser_timeout(timeout.max(Duration::from_secs(30)))
            .build()
            .map_err(|e| Error::LaunchError(format!("Failed to build launch options: {}", e)))?;

        match &config.browser_path {
            Some(path) => info!("Launching browser {}", path.display()),
            None => info!("Launching default browser"),
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::LaunchError(format!("Failed to launch browser: {}", e)))?;

        Ok(CdpSession { browser, timeout })
    }
}

impl BrowserSession for CdpSession {
    type Page = CdpPage;

    fn new_page(&mut self) -> Result<CdpPage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::LaunchError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.timeout);
        Ok(CdpPage { tab })
    }

    fn close(self) -> Result<()> {
        // Dropping the browser terminates the child process.
        drop(self.browser);
        Ok(())
    }
}

impl DiagramPage for CdpPage {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    fn post_message(&mut self, message: &str) -> Result<String> {
        let eval = self
            .tab
            .evaluate(&dispatch_expression(message), true)
            .map_err(|e| Error::ViewerError(format!("Evaluation failed: {}", e)))?;

        // The bridge always answers with a JSON string.
        match eval.value {
            Some(serde_json::Value::String(reply)) => Ok(reply),
            Some(other) => Err(Error::ProtocolError(format!("expected a JSON string reply, got {}", other))),
            None => Err(Error::ProtocolError(
                "no value returned from the page bridge (is the skeleton loaded?)".into(),
            )),
        }
    }

    fn set_viewport(&mut self, viewport: ViewportSize) -> Result<()> {
        self.tab
            .call_method(Emulation::SetDeviceMetricsOverride {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: viewport.device_scale_factor,
                mobile: false,
                scale: None,
                screen_width: None,
                screen_height: None,
                position_x: None,
                position_y: None,
                dont_set_visible_size: None,
                screen_orientation: None,
                viewport: None,
                display_feature: None,
                device_posture: None,
            })
            .map_err(|e| Error::CaptureError(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    fn capture_png(&mut self, clip: ClipRegion) -> Result<Vec<u8>> {
        let clip = Page::Viewport {
            x: clip.x,
            y: clip.y,
            width: clip.width,
            height: clip.height,
            scale: 1.0,
        };
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::CaptureError(format!("Screenshot failed: {}", e)))
    }

    fn print_pdf(&mut self, paper: PaperSize) -> Result<Vec<u8>> {
        self.tab
            .print_to_pdf(Some(pdf_options(paper)))
            .map_err(|e| Error::CaptureError(format!("PDF printing failed: {}", e)))
    }
}

/// Borderless page of exactly `paper`; content below it (the footer)
/// continues on further pages.
fn pdf_options(paper: PaperSize) -> PrintToPdfOptions {
    PrintToPdfOptions {
        print_background: Some(true),
        paper_width: Some(paper.width_inches()),
        paper_height: Some(paper.height_inches()),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}
