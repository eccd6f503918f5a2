//! Browser driver abstraction
//!
//! The conversion pipeline never talks to a browser directly. A
//! [`BrowserDriver`] launches a [`BrowserSession`], the session hands out
//! [`DiagramPage`]s, and a page exposes exactly the primitives the printer
//! needs: navigation, the in-page message channel, viewport resizing and the
//! two capture operations.

use crate::{ConverterConfig, Result};
use log::{debug, warn};

/// Viewport applied before capturing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

/// Region of the page captured by a screenshot, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// PDF page size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,
}

impl PaperSize {
    /// CSS pixels per inch, used to convert to the printer's paper units
    pub const PIXELS_PER_INCH: f64 = 96.0;

    pub fn width_inches(&self) -> f64 {
        self.width / Self::PIXELS_PER_INCH
    }

    pub fn height_inches(&self) -> f64 {
        self.height / Self::PIXELS_PER_INCH
    }
}

/// A single browser page the printer renders into
pub trait DiagramPage {
    /// Navigate to `url` and wait until the document is loaded
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Send a JSON message to the in-page bridge and return its JSON reply
    fn post_message(&mut self, message: &str) -> Result<String>;

    /// Resize the page's viewport
    fn set_viewport(&mut self, viewport: ViewportSize) -> Result<()>;

    /// Capture `clip` as PNG bytes
    fn capture_png(&mut self, clip: ClipRegion) -> Result<Vec<u8>>;

    /// Print the page as a single-page PDF of the given size
    fn print_pdf(&mut self, paper: PaperSize) -> Result<Vec<u8>>;
}

/// A running browser process
pub trait BrowserSession {
    type Page: DiagramPage;

    /// Open a new page
    fn new_page(&mut self) -> Result<Self::Page>;

    /// Shut the browser down
    fn close(self) -> Result<()>;
}

/// Launches browser sessions
pub trait BrowserDriver {
    type Session: BrowserSession;

    /// Launch a browser, honoring `config.browser_path` when set
    fn launch(&self, config: &ConverterConfig) -> Result<Self::Session>;
}

/// Owns a launched session and closes it exactly once
///
/// [`SessionGuard::close`] surfaces the close error. A guard that is dropped
/// without being closed (early return, `?`, panic unwind) closes the session
/// itself and logs a failure instead.
pub struct SessionGuard<S: BrowserSession> {
    session: Option<S>,
}

impl<S: BrowserSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Open a page on the guarded session
    pub fn new_page(&mut self) -> Result<S::Page> {
        match self.session.as_mut() {
            Some(session) => session.new_page(),
            None => Err(crate::Error::Other("browser session already closed".into())),
        }
    }

    /// Close the session and report the outcome
    pub fn close(mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                debug!("Closing browser session");
                session.close()
            }
            None => Ok(()),
        }
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Closing browser session after an aborted run");
            if let Err(e) = session.close() {
                warn!("Failed to close browser session: {}", e);
            }
        }
    }
}

/// Launch a session, open one page, run `f` on it and close the session.
///
/// The session is closed on every exit path. When `f` fails its error is
/// returned; a close failure is only returned when `f` succeeded.
pub fn with_page<D, F, T>(driver: &D, config: &ConverterConfig, f: F) -> Result<T>
where
    D: BrowserDriver,
    F: FnOnce(&mut <D::Session as BrowserSession>::Page) -> Result<T>,
{
    let mut guard = SessionGuard::new(driver.launch(config)?);
    let mut page = guard.new_page()?;
    let value = f(&mut page)?;
    drop(page);
    guard.close()?;
    Ok(value)
}
