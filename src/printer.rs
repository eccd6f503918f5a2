//! Diagram printer: renders one diagram and writes every requested output
//!
//! The printer owns the page's navigation and viewport for the duration of a
//! job. Nothing about the page state is assumed to survive between jobs; each
//! job navigates to the skeleton afresh.

use crate::driver::DiagramPage;
use crate::output::OutputFormat;
use crate::viewer::{self, OpenOptions, StagedAssets};
use crate::{ConversionJob, DisplayOptions, Error, Result};
use log::{debug, error, info};
use std::path::{Path, PathBuf};

/// An output file that was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub bytes: usize,
}

/// What one job produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintReport {
    pub input: PathBuf,
    pub written: Vec<WrittenOutput>,
    /// Outputs skipped because their extension is not a known format
    pub unsupported: Vec<PathBuf>,
    /// Width and diagram height shared by the PNG clip and the PDF page
    pub size: Option<(f64, f64)>,
}

/// Render `job.input` on `page` and produce `job.outputs` in order.
///
/// Reading the input, any viewer failure and any capture failure abort the
/// job. An output with an unknown extension is logged, recorded in
/// [`PrintReport::unsupported`] and skipped.
pub fn print_diagram<P: DiagramPage + ?Sized>(
    page: &mut P,
    assets: &StagedAssets,
    job: &ConversionJob,
    options: &DisplayOptions,
) -> Result<PrintReport> {
    let xml = std::fs::read_to_string(&job.input).map_err(|source| Error::InputError {
        path: job.input.clone(),
        source,
    })?;

    let title = options.title.resolve(&job.input);
    debug!("Printing {} (title: {:?})", job.input.display(), title);

    let url = assets.skeleton_url()?;
    page.navigate(&url)?;

    viewer::load_script(page, &assets.viewer_script()?)?;

    let desired = viewer::open_diagram(
        page,
        &xml,
        OpenOptions {
            min_dimensions: options.min_dimensions,
            title,
            footer: options.footer,
        },
    )?;
    debug!(
        "Viewer wants {}x{} (diagram height {})",
        desired.width, desired.height, desired.diagram_height
    );

    if let Some(script) = &options.overlay {
        viewer::annotate(page, script)?;
    }

    page.set_viewport(desired.viewport_size(options.device_scale_factor))?;
    viewer::resize(page)?;

    let mut report = PrintReport {
        input: job.input.clone(),
        size: Some((desired.width, desired.diagram_height)),
        ..Default::default()
    };

    for output in &job.outputs {
        let Some(format) = OutputFormat::from_path(output) else {
            error!("Unknown output file format: {}", output.display());
            report.unsupported.push(output.clone());
            continue;
        };

        let data = match format {
            OutputFormat::Pdf => page.print_pdf(desired.pdf_page())?,
            OutputFormat::Png => page.capture_png(desired.clip())?,
            OutputFormat::Svg => viewer::to_svg(page)?.into_bytes(),
        };

        write_output(output, &data)?;
        info!("Wrote {} ({} bytes)", output.display(), data.len());
        report.written.push(WrittenOutput {
            path: output.clone(),
            format,
            bytes: data.len(),
        });
    }

    Ok(report)
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).map_err(|source| Error::OutputError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ClipRegion, PaperSize, ViewportSize};
    use crate::viewer::{DesiredViewport, ViewerReply, ViewerRequest, ViewerResponse};
    use crate::TitleOption;

    const VIEWPORT: DesiredViewport = DesiredViewport {
        width: 612.4,
        height: 480.0,
        diagram_height: 450.0,
    };

    #[derive(Default)]
    struct ScriptedPage {
        calls: Vec<String>,
        requests: Vec<ViewerRequest>,
        clips: Vec<ClipRegion>,
        papers: Vec<PaperSize>,
        viewports: Vec<ViewportSize>,
        reject_open: bool,
        reject_annotate: bool,
    }

    impl DiagramPage for ScriptedPage {
        fn navigate(&mut self, url: &str) -> Result<()> {
            self.calls.push(format!("navigate {}", url));
            Ok(())
        }

        fn post_message(&mut self, message: &str) -> Result<String> {
            let request: ViewerRequest = serde_json::from_str(message)?;
            self.calls.push(request.operation().to_string());
            let reply = match &request {
                ViewerRequest::OpenDiagram { .. } if self.reject_open => {
                    ViewerReply::Error("unparsable XML".into())
                }
                ViewerRequest::OpenDiagram { .. } => ViewerReply::Ok(ViewerResponse::Viewport(VIEWPORT)),
                ViewerRequest::Annotate { .. } if self.reject_annotate => {
                    ViewerReply::Error("renderActivities is not defined".into())
                }
                ViewerRequest::ToSvg => ViewerReply::Ok(ViewerResponse::Markup {
                    markup: "<svg xmlns=\"http://www.w3.org/2000/svg\"/>".into(),
                }),
                _ => ViewerReply::Ok(ViewerResponse::Ack),
            };
            self.requests.push(request);
            Ok(serde_json::to_string(&reply)?)
        }

        fn set_viewport(&mut self, viewport: ViewportSize) -> Result<()> {
            self.calls.push("set_viewport".into());
            self.viewports.push(viewport);
            Ok(())
        }

        fn capture_png(&mut self, clip: ClipRegion) -> Result<Vec<u8>> {
            self.calls.push("capture_png".into());
            self.clips.push(clip);
            Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
        }

        fn print_pdf(&mut self, paper: PaperSize) -> Result<Vec<u8>> {
            self.calls.push("print_pdf".into());
            self.papers.push(paper);
            Ok(b"%PDF-1.4 fake".to_vec())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        assets: StagedAssets,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("viewer.js");
        std::fs::write(&bundle, "// viewer").unwrap();
        std::fs::write(dir.path().join("order.bpmn"), "<definitions/>").unwrap();
        let assets = StagedAssets::stage(&bundle).unwrap();
        Fixture { dir, assets }
    }

    #[test]
    fn runs_the_render_sequence_in_order() {
        let fx = fixture();
        let job = ConversionJob::new(
            fx.dir.path().join("order.bpmn"),
            [fx.dir.path().join("order.png"), fx.dir.path().join("order.svg")],
        );
        let mut page = ScriptedPage::default();

        let report = print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap();

        let ops: Vec<&str> = page
            .calls
            .iter()
            .map(|c| if c.starts_with("navigate ") { "navigate" } else { c.as_str() })
            .collect();
        assert_eq!(
            ops,
            vec!["navigate", "loadScript", "openDiagram", "set_viewport", "resize", "capture_png", "toSvg"]
        );
        assert_eq!(report.written.len(), 2);
        assert!(report.unsupported.is_empty());
        assert_eq!(page.viewports[0].width, 612);
        assert_eq!(page.viewports[0].height, 480);

        let svg = std::fs::read_to_string(fx.dir.path().join("order.svg")).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn open_options_carry_the_resolved_title() {
        let fx = fixture();
        let job = ConversionJob::new(fx.dir.path().join("order.bpmn"), Vec::<PathBuf>::new());

        let mut page = ScriptedPage::default();
        print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap();
        let hidden = DisplayOptions {
            title: TitleOption::Hidden,
            footer: false,
            ..Default::default()
        };
        print_diagram(&mut page, &fx.assets, &job, &hidden).unwrap();

        let titles: Vec<(Option<String>, bool)> = page
            .requests
            .iter()
            .filter_map(|r| match r {
                ViewerRequest::OpenDiagram { xml, options } => {
                    assert_eq!(xml, "<definitions/>");
                    Some((options.title.clone(), options.footer))
                }
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec![(Some("order".into()), true), (None, false)]);
    }

    #[test]
    fn png_and_pdf_share_the_diagram_region() {
        let fx = fixture();
        let job = ConversionJob::new(
            fx.dir.path().join("order.bpmn"),
            [fx.dir.path().join("a.pdf"), fx.dir.path().join("a.png")],
        );
        let mut page = ScriptedPage::default();
        let report = print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap();

        let clip = page.clips[0];
        let paper = page.papers[0];
        assert_eq!((clip.width, clip.height), (paper.width, paper.height));
        assert_eq!(clip.height, VIEWPORT.diagram_height);
        assert_eq!(report.size, Some((VIEWPORT.width, VIEWPORT.diagram_height)));
    }

    #[test]
    fn unknown_extension_is_skipped_not_fatal() {
        let fx = fixture();
        let job = ConversionJob::new(
            fx.dir.path().join("order.bpmn"),
            [fx.dir.path().join("out.xyz"), fx.dir.path().join("out.png")],
        );
        let mut page = ScriptedPage::default();
        let report = print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap();

        assert_eq!(report.unsupported, vec![fx.dir.path().join("out.xyz")]);
        assert!(!fx.dir.path().join("out.xyz").exists());
        assert!(fx.dir.path().join("out.png").exists());
    }

    #[test]
    fn unknown_extension_logs_an_error() {
        testing_logger::setup();
        let fx = fixture();
        let unknown = fx.dir.path().join("out.gif");
        let job = ConversionJob::new(fx.dir.path().join("order.bpmn"), [unknown.clone()]);
        let mut page = ScriptedPage::default();
        print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap();

        let expected = format!("Unknown output file format: {}", unknown.display());
        testing_logger::validate(|captured_logs| {
            let errors: Vec<_> = captured_logs
                .iter()
                .filter(|l| l.level == log::Level::Error)
                .collect();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].body, expected);
        });
    }

    #[test]
    fn overlay_runs_after_open_and_before_resize() {
        let fx = fixture();
        let job = ConversionJob::new(fx.dir.path().join("order.bpmn"), [fx.dir.path().join("o.png")]);
        let options = DisplayOptions {
            overlay: Some("renderActivities(viewer, [], []);".into()),
            ..Default::default()
        };
        let mut page = ScriptedPage::default();
        print_diagram(&mut page, &fx.assets, &job, &options).unwrap();

        let ops: Vec<&str> = page.calls.iter().skip(1).map(String::as_str).collect();
        assert_eq!(
            ops,
            vec!["loadScript", "openDiagram", "annotate", "set_viewport", "resize", "capture_png"]
        );
        assert!(page.requests.contains(&ViewerRequest::Annotate {
            script: "renderActivities(viewer, [], []);".into()
        }));
    }

    #[test]
    fn no_overlay_sends_no_annotate() {
        let fx = fixture();
        let job = ConversionJob::new(fx.dir.path().join("order.bpmn"), [fx.dir.path().join("o.svg")]);
        let mut page = ScriptedPage::default();
        print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap();
        assert!(!page.calls.iter().any(|c| c == "annotate"));
    }

    #[test]
    fn failing_overlay_is_fatal() {
        let fx = fixture();
        let job = ConversionJob::new(fx.dir.path().join("order.bpmn"), [fx.dir.path().join("o.png")]);
        let options = DisplayOptions {
            overlay: Some("renderActivities(viewer);".into()),
            ..Default::default()
        };
        let mut page = ScriptedPage {
            reject_annotate: true,
            ..Default::default()
        };
        let err = print_diagram(&mut page, &fx.assets, &job, &options).unwrap_err();
        assert!(matches!(err, Error::ViewerError(ref m) if m.contains("annotate failed")));
        assert!(!fx.dir.path().join("o.png").exists());
    }

    #[test]
    fn missing_input_fails_before_touching_the_page() {
        let fx = fixture();
        let job = ConversionJob::new(fx.dir.path().join("missing.bpmn"), [fx.dir.path().join("x.png")]);
        let mut page = ScriptedPage::default();
        let err = print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InputError { .. }));
        assert!(page.calls.is_empty());
    }

    #[test]
    fn viewer_errors_are_fatal() {
        let fx = fixture();
        let job = ConversionJob::new(fx.dir.path().join("order.bpmn"), [fx.dir.path().join("x.png")]);
        let mut page = ScriptedPage {
            reject_open: true,
            ..Default::default()
        };
        let err = print_diagram(&mut page, &fx.assets, &job, &DisplayOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ViewerError(ref m) if m.contains("unparsable XML")));
        assert!(!fx.dir.path().join("x.png").exists());
    }
}
