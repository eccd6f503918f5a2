//! BPMN to image conversion
//!
//! Converts BPMN 2.0 diagrams into PNG, SVG and PDF files by rendering them
//! with a bundled diagram viewer inside a headless browser page, sizing the
//! viewport to the diagram and capturing the result.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome through the Chrome
//!   DevTools Protocol
//! - **Pluggable driver**: the conversion pipeline only talks to the
//!   [`driver`] traits, so other browser backends (or test fakes) can be used
//! - **One session per batch**: every job of a batch reuses a single browser
//!   page, and the browser is always closed again
//!
//! # Example
//!
//! ```no_run
//! use bpmn_to_image::{ConversionJob, DisplayOptions, TitleOption};
//!
//! # async fn run() -> bpmn_to_image::Result<()> {
//! let jobs = vec![ConversionJob::new("diagram.bpmn", ["diagram.png", "diagram.svg"])];
//! let options = DisplayOptions {
//!     title: TitleOption::Hidden,
//!     footer: false,
//!     ..Default::default()
//! };
//!
//! let report = bpmn_to_image::convert_all(jobs, options).await?;
//! println!("wrote {} files", report.written_count());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod error;
pub use error::{Error, Result};

pub mod batch;
pub mod driver;
pub mod output;
pub mod printer;
pub mod viewer;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly converter (worker-thread backed)
pub mod async_api;

pub use async_api::Converter;
pub use batch::BatchReport;
pub use output::OutputFormat;
pub use printer::PrintReport;

/// Environment variable overriding the browser executable
pub const BROWSER_ENV: &str = "BPMN_TO_IMAGE_BROWSER";

/// Browser override honored for compatibility with puppeteer-based callers
pub const LEGACY_BROWSER_ENV: &str = "PUPPETEER_EXECUTABLE_PATH";

/// Environment variable pointing at the viewer bundle script
pub const VIEWER_ENV: &str = "BPMN_TO_IMAGE_VIEWER";

/// Configuration for the converter and its browser session
///
/// The defaults keep the browser sandboxed and let the driver pick its own
/// browser binary. Nothing reads the environment unless the config comes from
/// [`ConverterConfig::from_env`], which applies the `BPMN_TO_IMAGE_BROWSER`
/// and `BPMN_TO_IMAGE_VIEWER` overrides.
///
/// # Examples
///
/// ```
/// let cfg = bpmn_to_image::ConverterConfig::default();
/// assert!(cfg.browser_path.is_none());
/// assert!(cfg.sandbox);
/// ```
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Browser executable; `None` uses the driver's bundled default
    pub browser_path: Option<PathBuf>,
    /// Viewer bundle script; `None` searches the default locations
    pub viewer_bundle: Option<PathBuf>,
    /// Timeout for each browser operation in milliseconds
    pub timeout_ms: u64,
    /// Whether to keep Chrome's sandbox enabled
    pub sandbox: bool,
    /// Initial window size before the first diagram resizes it
    pub window: Viewport,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            viewer_bundle: None,
            timeout_ms: 30000,
            sandbox: true,
            window: Viewport::default(),
        }
    }
}

impl ConverterConfig {
    /// Default configuration with the environment overrides applied
    pub fn from_env() -> Self {
        let browser_path = env_path(BROWSER_ENV).or_else(|| env_path(LEGACY_BROWSER_ENV));
        Self {
            browser_path,
            viewer_bundle: env_path(VIEWER_ENV),
            ..Default::default()
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Smallest size the rendered diagram page may have
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MinDimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for MinDimensions {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
        }
    }
}

impl FromStr for MinDimensions {
    type Err = Error;

    /// Parses `WIDTHxHEIGHT`, e.g. `400x300`
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::ConfigError(format!("expected WIDTHxHEIGHT, got '{}'", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| Error::ConfigError(format!("invalid dimension '{}' in '{}': {}", v, s, e)))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl fmt::Display for MinDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the diagram title is chosen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TitleOption {
    /// Use the input's file name without extension
    #[default]
    FromInput,
    /// Show no title at all
    Hidden,
    /// Show this text; an empty string falls back to [`TitleOption::FromInput`]
    Custom(String),
}

impl TitleOption {
    /// Resolve the title shown for `input`; `None` means no title.
    pub fn resolve(&self, input: &Path) -> Option<String> {
        match self {
            TitleOption::Hidden => None,
            TitleOption::Custom(text) if !text.is_empty() => Some(text.clone()),
            TitleOption::Custom(_) | TitleOption::FromInput => Some(
                input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
        }
    }
}

/// Display options shared by every job of a batch
///
/// These are passed through to the in-page viewer unchanged, except for the
/// title which is resolved per input.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    /// Lower bound for the rendered page size
    pub min_dimensions: MinDimensions,
    /// Whether the viewer footer is shown
    pub footer: bool,
    /// Title selection
    pub title: TitleOption,
    /// Device pixel ratio used for raster captures
    pub device_scale_factor: f64,
    /// Script run against the opened viewer (bound as `viewer`), e.g. to draw
    /// markers. HTML drawn outside the SVG layer only shows up in PNG and PDF.
    pub overlay: Option<String>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            min_dimensions: MinDimensions::default(),
            footer: true,
            title: TitleOption::FromInput,
            device_scale_factor: 1.0,
            overlay: None,
        }
    }
}

/// One input diagram and the files to produce from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    /// Output paths, produced in this order
    pub outputs: Vec<PathBuf>,
}

impl ConversionJob {
    pub fn new<I, O, P>(input: I, outputs: O) -> Self
    where
        I: Into<PathBuf>,
        O: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            input: input.into(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }
}

impl FromStr for ConversionJob {
    type Err = Error;

    /// Parses `INPUT:OUTPUT[,OUTPUT...]`
    ///
    /// A colon directly after a leading drive letter (`C:\`) is part of the
    /// input path, not the separator.
    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let sep = s
            .char_indices()
            .filter(|&(_, c)| c == ':')
            .map(|(i, _)| i)
            .find(|&i| {
                let drive_colon = i == 1
                    && bytes[0].is_ascii_alphabetic()
                    && matches!(bytes.get(2), Some(b'\\') | Some(b'/'));
                !drive_colon
            })
            .ok_or_else(|| Error::JobError(format!("'{}' is not of the form INPUT:OUTPUT[,OUTPUT...]", s)))?;

        let input = s[..sep].trim();
        if input.is_empty() {
            return Err(Error::JobError(format!("missing input in '{}'", s)));
        }

        let outputs = s[sep + 1..]
            .split(',')
            .map(str::trim)
            .map(|o| {
                if o.is_empty() {
                    Err(Error::JobError(format!("empty output path in '{}'", s)))
                } else {
                    Ok(PathBuf::from(o))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            input: PathBuf::from(input),
            outputs,
        })
    }
}

/// Convert a batch of jobs with headless Chrome.
///
/// Uses [`ConverterConfig::from_env`]; see [`Converter`] for control over the
/// configuration and driver.
#[cfg(feature = "cdp")]
pub async fn convert_all(jobs: Vec<ConversionJob>, options: DisplayOptions) -> Result<BatchReport> {
    let converter = Converter::new(cdp::CdpDriver::new(), ConverterConfig::from_env()).await?;
    let result = converter.convert_all(jobs, options).await;
    converter.shutdown().await?;
    result
}

/// Convert a single diagram into a single output file with headless Chrome.
#[cfg(feature = "cdp")]
pub async fn convert(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Result<PrintReport> {
    let converter = Converter::new(cdp::CdpDriver::new(), ConverterConfig::from_env()).await?;
    let result = converter.convert(input, output).await;
    converter.shutdown().await?;
    result
}
