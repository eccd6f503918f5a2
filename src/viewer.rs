//! In-page viewer contract
//!
//! The skeleton page loaded into the browser exposes a single bridge,
//! `window.__bpmnToImage.dispatch(request)`. Every interaction with the viewer
//! bundle is a typed [`ViewerRequest`] serialized to JSON and sent through
//! [`DiagramPage::post_message`]; the page answers with a [`ViewerReply`]
//! envelope. Nothing else in the crate looks up globals inside the page.
//!
//! This module also owns the on-disk side of the contract: locating the viewer
//! bundle and staging it next to the skeleton document.

use crate::driver::{ClipRegion, DiagramPage, PaperSize, ViewportSize};
use crate::{ConverterConfig, Error, MinDimensions, Result, VIEWER_ENV};
use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Skeleton document the diagram is rendered into
pub const SKELETON_HTML: &str = include_str!("../assets/skeleton.html");

/// File name of the skeleton inside the staging directory
pub const SKELETON_FILE: &str = "skeleton.html";

/// File name the viewer bundle is searched for and staged as
pub const VIEWER_BUNDLE_FILE: &str = "bpmn-viewer.production.min.js";

/// In-page function that receives serialized [`ViewerRequest`]s
pub const DISPATCH_FUNCTION: &str = "window.__bpmnToImage.dispatch";

/// Options for opening a diagram, passed through to the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOptions {
    pub min_dimensions: MinDimensions,
    /// Title text; `None` is sent as `false` and hides the title
    #[serde(with = "title_flag")]
    pub title: Option<String>,
    pub footer: bool,
}

/// A request sent into the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "camelCase")]
pub enum ViewerRequest {
    /// Load and execute a script, relative to the skeleton page
    LoadScript { src: String },
    /// Render diagram XML and measure it
    OpenDiagram { xml: String, options: OpenOptions },
    /// Run a script with the open viewer in scope
    Annotate { script: String },
    /// Re-apply layout to the current viewport
    Resize,
    /// Export the current rendering as SVG markup
    ToSvg,
}

impl ViewerRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            ViewerRequest::LoadScript { .. } => "loadScript",
            ViewerRequest::OpenDiagram { .. } => "openDiagram",
            ViewerRequest::Annotate { .. } => "annotate",
            ViewerRequest::Resize => "resize",
            ViewerRequest::ToSvg => "toSvg",
        }
    }
}

/// Reply envelope: `{"ok": <response>}` or `{"error": "<message>"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewerReply {
    Ok(ViewerResponse),
    Error(String),
}

/// Successful reply payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewerResponse {
    Viewport(DesiredViewport),
    Markup { markup: String },
    Ack,
}

/// Size the viewer needs to show the whole diagram
///
/// `diagram_height` covers the diagram and its title; `height` may be larger
/// (footer) and is only used to size the browser viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredViewport {
    pub width: f64,
    pub height: f64,
    pub diagram_height: f64,
}

impl DesiredViewport {
    /// Reject sizes the browser cannot be resized to
    pub fn validate(self) -> Result<Self> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(self.width) && ok(self.height) && ok(self.diagram_height) {
            Ok(self)
        } else {
            Err(Error::ViewerError(format!(
                "viewer reported an unusable size {}x{} (diagram height {})",
                self.width, self.height, self.diagram_height
            )))
        }
    }

    /// Browser viewport for this size, rounded to whole pixels
    pub fn viewport_size(&self, device_scale_factor: f64) -> ViewportSize {
        ViewportSize {
            width: self.width.round() as u32,
            height: self.height.round() as u32,
            device_scale_factor,
        }
    }

    /// Screenshot region: the diagram area from the top-left corner
    pub fn clip(&self) -> ClipRegion {
        ClipRegion {
            x: 0.0,
            y: 0.0,
            width: self.width,
            height: self.diagram_height,
        }
    }

    /// PDF page covering the same region as [`DesiredViewport::clip`]
    pub fn pdf_page(&self) -> PaperSize {
        PaperSize {
            width: self.width,
            height: self.diagram_height,
        }
    }
}

/// Send one request through the page bridge and unwrap the reply envelope
pub fn send<P: DiagramPage + ?Sized>(page: &mut P, request: &ViewerRequest) -> Result<ViewerResponse> {
    let message = serde_json::to_string(request)?;
    debug!("viewer request: {}", request.operation());
    let reply = page.post_message(&message)?;
    match serde_json::from_str::<ViewerReply>(&reply)? {
        ViewerReply::Ok(response) => Ok(response),
        ViewerReply::Error(message) => Err(Error::ViewerError(format!(
            "{} failed: {}",
            request.operation(),
            message
        ))),
    }
}

fn unexpected(request: &str, expected: &str, got: &ViewerResponse) -> Error {
    Error::ProtocolError(format!("expected {} in reply to {}, got {:?}", expected, request, got))
}

/// Load the viewer bundle (or any script) into the page
pub fn load_script<P: DiagramPage + ?Sized>(page: &mut P, src: &str) -> Result<()> {
    match send(page, &ViewerRequest::LoadScript { src: src.to_string() })? {
        ViewerResponse::Ack => Ok(()),
        other => Err(unexpected("loadScript", "an empty reply", &other)),
    }
}

/// Render `xml` and return the validated size it needs
pub fn open_diagram<P: DiagramPage + ?Sized>(
    page: &mut P,
    xml: &str,
    options: OpenOptions,
) -> Result<DesiredViewport> {
    let request = ViewerRequest::OpenDiagram {
        xml: xml.to_string(),
        options,
    };
    match send(page, &request)? {
        ViewerResponse::Viewport(viewport) => viewport.validate(),
        other => Err(unexpected("openDiagram", "a viewport", &other)),
    }
}

/// Run overlay `script` against the diagram opened last
pub fn annotate<P: DiagramPage + ?Sized>(page: &mut P, script: &str) -> Result<()> {
    let request = ViewerRequest::Annotate {
        script: script.to_string(),
    };
    match send(page, &request)? {
        ViewerResponse::Ack => Ok(()),
        other => Err(unexpected("annotate", "an empty reply", &other)),
    }
}

pub fn resize<P: DiagramPage + ?Sized>(page: &mut P) -> Result<()> {
    match send(page, &ViewerRequest::Resize)? {
        ViewerResponse::Ack => Ok(()),
        other => Err(unexpected("resize", "an empty reply", &other)),
    }
}

pub fn to_svg<P: DiagramPage + ?Sized>(page: &mut P) -> Result<String> {
    match send(page, &ViewerRequest::ToSvg)? {
        ViewerResponse::Markup { markup } => Ok(markup),
        other => Err(unexpected("toSvg", "markup", &other)),
    }
}

/// Wrap a serialized request into the expression evaluated in the page
pub fn dispatch_expression(message: &str) -> String {
    format!("{}({})", DISPATCH_FUNCTION, message)
}

mod title_flag {
    use super::*;

    pub fn serialize<S: Serializer>(title: &Option<String>, s: S) -> std::result::Result<S::Ok, S::Error> {
        match title {
            Some(text) => s.serialize_str(text),
            None => s.serialize_bool(false),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Text(String),
        Shown(bool),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
        match Flag::deserialize(d)? {
            Flag::Text(text) => Ok(Some(text)),
            Flag::Shown(false) => Ok(None),
            Flag::Shown(true) => Err(serde::de::Error::custom("title must be a string or false")),
        }
    }
}

/// Locates the viewer bundle script on disk
pub struct ViewerAssets;

impl ViewerAssets {
    /// Find the viewer bundle.
    ///
    /// Order: `config.viewer_bundle` (which must exist), the bundle beside
    /// the running executable, then `assets/` in the working directory. The
    /// `BPMN_TO_IMAGE_VIEWER` override reaches this through
    /// [`ConverterConfig::from_env`].
    pub fn locate(config: &ConverterConfig) -> Result<PathBuf> {
        Self::locate_in(config, &Self::search_paths())
    }

    /// Default locations, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join(VIEWER_BUNDLE_FILE));
            }
        }
        candidates.push(Path::new("assets").join(VIEWER_BUNDLE_FILE));
        candidates
    }

    fn locate_in(config: &ConverterConfig, candidates: &[PathBuf]) -> Result<PathBuf> {
        if let Some(path) = &config.viewer_bundle {
            return Self::existing(path);
        }

        candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "viewer bundle {} not found; pass --viewer or set {}",
                    VIEWER_BUNDLE_FILE, VIEWER_ENV
                ))
            })
    }

    fn existing(path: &Path) -> Result<PathBuf> {
        if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::ConfigError(format!(
                "viewer bundle {} does not exist",
                path.display()
            )))
        }
    }
}

/// Skeleton page and viewer bundle copied into a private temporary directory
///
/// The directory is removed when the value is dropped.
pub struct StagedAssets {
    dir: tempfile::TempDir,
    skeleton: PathBuf,
    bundle: PathBuf,
}

impl StagedAssets {
    /// Stage the skeleton page together with the bundle at `bundle`
    pub fn stage(bundle: &Path) -> Result<Self> {
        let staging_error = |e: std::io::Error| Error::ConfigError(format!("failed to stage viewer assets: {}", e));

        let dir = tempfile::Builder::new()
            .prefix("bpmn-to-image-")
            .tempdir()
            .map_err(staging_error)?;

        let skeleton = dir.path().join(SKELETON_FILE);
        std::fs::write(&skeleton, SKELETON_HTML).map_err(staging_error)?;

        let staged_bundle = dir.path().join(VIEWER_BUNDLE_FILE);
        std::fs::copy(bundle, &staged_bundle).map_err(|e| {
            Error::ConfigError(format!("failed to copy viewer bundle {}: {}", bundle.display(), e))
        })?;

        info!("Staged viewer assets in {}", dir.path().display());
        Ok(Self {
            dir,
            skeleton,
            bundle: staged_bundle,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// `file://` URL of the skeleton page
    pub fn skeleton_url(&self) -> Result<String> {
        url::Url::from_file_path(&self.skeleton)
            .map(|u| u.to_string())
            .map_err(|()| {
                Error::ConfigError(format!(
                    "cannot build a file URL for {}",
                    self.skeleton.display()
                ))
            })
    }

    /// Bundle location relative to the skeleton page, with `/` separators
    pub fn viewer_script(&self) -> Result<String> {
        let base = self.skeleton.parent().unwrap_or_else(|| self.dir.path());
        let relative = self.bundle.strip_prefix(base).map_err(|_| {
            Error::ConfigError(format!(
                "viewer bundle {} is outside the page directory",
                self.bundle.display()
            ))
        })?;
        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"))
    }
}
