//! Error types for diagram conversion

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting diagrams
///
/// Every variant is fatal for the batch it occurs in. Outputs with an
/// unrecognized extension are not errors; they are reported through
/// [`crate::printer::PrintReport::unsupported`].
#[derive(Error, Debug)]
pub enum Error {
    /// The diagram source could not be read
    #[error("Failed to read diagram {}: {source}", .path.display())]
    InputError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rendered output could not be written
    #[error("Failed to write output {}: {source}", .path.display())]
    OutputError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to launch the browser or open a page
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    /// Failed to navigate to the skeleton page
    #[error("Failed to load page: {0}")]
    LoadError(String),

    /// The in-page viewer rejected a request (bad XML, bundle failure, ...)
    #[error("Viewer error: {0}")]
    ViewerError(String),

    /// The viewer replied with something that does not match the message contract
    #[error("Malformed viewer message: {0}")]
    ProtocolError(String),

    /// Screenshot, PDF printing or viewport resize failed
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Invalid configuration or missing assets
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A conversion argument could not be parsed
    #[error("Invalid conversion: {0}")]
    JobError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ProtocolError(err.to_string())
    }
}
