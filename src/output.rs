//! Output formats, selected by the output path's extension

use std::fmt;
use std::path::Path;

/// A capture format the printer knows how to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Raster screenshot clipped to the diagram area
    Png,
    /// Vector markup exported by the viewer
    Svg,
    /// Printed document sized to the diagram area
    Pdf,
}

impl OutputFormat {
    /// Pick the format for `path` from its extension (case-insensitive).
    ///
    /// Returns `None` for paths without an extension or with one the printer
    /// cannot produce.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("png") {
            Some(OutputFormat::Png)
        } else if ext.eq_ignore_ascii_case("svg") {
            Some(OutputFormat::Svg)
        } else if ext.eq_ignore_ascii_case("pdf") {
            Some(OutputFormat::Pdf)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
