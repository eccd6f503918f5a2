//! Recording fake browser driver shared by the integration tests
#![allow(dead_code)]

use bpmn_to_image::driver::{BrowserDriver, BrowserSession, ClipRegion, DiagramPage, PaperSize, ViewportSize};
use bpmn_to_image::viewer::{DesiredViewport, ViewerReply, ViewerRequest, ViewerResponse};
use bpmn_to_image::{ConverterConfig, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const VIEWPORT: DesiredViewport = DesiredViewport {
    width: 518.3,
    height: 402.0,
    diagram_height: 371.6,
};

pub const SVG_MARKUP: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="518" height="371"></svg>"#;

pub const MINIMAL_BPMN: &str = include_str!("../fixtures/minimal.bpmn");

/// Marker that makes the fake viewer reject a diagram
pub const BROKEN_XML: &str = "<not-bpmn/>";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Launch,
    NewPage,
    Navigate(String),
    Viewer(ViewerRequest),
    SetViewport(ViewportSize),
    Png(ClipRegion),
    Pdf(PaperSize),
    Close,
}

/// Fake driver that records every call in launch order
#[derive(Clone, Default)]
pub struct FakeDriver {
    events: Arc<Mutex<Vec<Event>>>,
    pub fail_launch: bool,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| f(e)).count()
    }

    pub fn launches(&self) -> usize {
        self.count(|e| *e == Event::Launch)
    }

    pub fn closes(&self) -> usize {
        self.count(|e| *e == Event::Close)
    }

    /// Viewer requests in the order they were sent
    pub fn viewer_requests(&self) -> Vec<ViewerRequest> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Viewer(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct FakeSession {
    driver: FakeDriver,
}

pub struct FakePage {
    driver: FakeDriver,
}

impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    fn launch(&self, _config: &ConverterConfig) -> Result<FakeSession> {
        if self.fail_launch {
            return Err(Error::LaunchError("no browser here".into()));
        }
        self.record(Event::Launch);
        Ok(FakeSession { driver: self.clone() })
    }
}

impl BrowserSession for FakeSession {
    type Page = FakePage;

    fn new_page(&mut self) -> Result<FakePage> {
        self.driver.record(Event::NewPage);
        Ok(FakePage {
            driver: self.driver.clone(),
        })
    }

    fn close(self) -> Result<()> {
        self.driver.record(Event::Close);
        Ok(())
    }
}

impl DiagramPage for FakePage {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.driver.record(Event::Navigate(url.to_string()));
        Ok(())
    }

    fn post_message(&mut self, message: &str) -> Result<String> {
        let request: ViewerRequest = serde_json::from_str(message)?;
        let reply = match &request {
            ViewerRequest::OpenDiagram { xml, .. } if xml.contains(BROKEN_XML) => {
                ViewerReply::Error("failed to parse document as <bpmn:Definitions>".into())
            }
            ViewerRequest::OpenDiagram { .. } => ViewerReply::Ok(ViewerResponse::Viewport(VIEWPORT)),
            ViewerRequest::ToSvg => ViewerReply::Ok(ViewerResponse::Markup {
                markup: SVG_MARKUP.to_string(),
            }),
            ViewerRequest::LoadScript { .. } | ViewerRequest::Annotate { .. } | ViewerRequest::Resize => {
                ViewerReply::Ok(ViewerResponse::Ack)
            }
        };
        self.driver.record(Event::Viewer(request));
        Ok(serde_json::to_string(&reply)?)
    }

    fn set_viewport(&mut self, viewport: ViewportSize) -> Result<()> {
        self.driver.record(Event::SetViewport(viewport));
        Ok(())
    }

    fn capture_png(&mut self, clip: ClipRegion) -> Result<Vec<u8>> {
        self.driver.record(Event::Png(clip));
        Ok(b"\x89PNG\r\n\x1a\n-fake-raster".to_vec())
    }

    fn print_pdf(&mut self, paper: PaperSize) -> Result<Vec<u8>> {
        self.driver.record(Event::Pdf(paper));
        Ok(b"%PDF-1.7\n%fake".to_vec())
    }
}

/// Scratch directory holding a viewer bundle and diagrams
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub config: ConverterConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("bpmn-viewer.production.min.js");
        std::fs::write(&bundle, "window.BpmnJS = function BpmnJS() {};").unwrap();
        let config = ConverterConfig {
            viewer_bundle: Some(bundle),
            ..Default::default()
        };
        Self { dir, config }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a diagram file and return its path
    pub fn diagram(&self, name: &str, xml: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, xml).unwrap();
        path
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

pub fn non_empty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
